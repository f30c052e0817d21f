//! corrstack: correction pipeline and per-pixel MST reduction for
//! interferogram stacks
//!
//! The crate drives a user-ordered sequence of correction steps over a
//! stack of interferograms sharing a common epoch network, coordinates
//! per-interferogram metadata across a fixed pool of workers, filters
//! the stack with phase-closure residuals, and reduces the per-pixel
//! connectivity graph to a minimum spanning tree. Raster formats,
//! regression models and filter internals live behind collaborator
//! traits supplied by the embedder.

pub mod comm;
pub mod config;
pub mod core;
pub mod io;
pub mod types;

// Re-export main types and functions for easier access
pub use config::{Config, IfgPaths};
pub use crate::core::{
    correct_ifgs, default_mst, mst_matrix, run, ClosureEngine, ClosureOutcome, CorrectStep,
    MstEdges, MstMatrix, PipelineState, PrereadArtifact, StepRegistry,
};
pub use io::{IfgLoader, MemoryLoader};
pub use types::{
    CorrectError, CorrectResult, EpochDate, EpochList, GeoTransform, Ifg, PhaseImage, PrereadIfg,
    Tile,
};
