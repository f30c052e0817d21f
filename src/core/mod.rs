//! Core correction pipeline modules

pub mod closure;
pub mod correct;
pub mod epochs;
pub mod mst;
pub mod preread;
pub mod tile;

// Re-export main types
pub use closure::{ClosureEngine, ClosureOutcome, NoLoopEngine};
pub use correct::{correct_ifgs, run, CorrectStep, PipelineState, StepRegistry};
pub use epochs::get_epochs;
pub use mst::{default_mst, mst_matrix, MstEdges, MstMatrix};
pub use preread::{build_metadata, load_artifact, stage_ifgs, PrereadArtifact};
pub use tile::get_tiles;
