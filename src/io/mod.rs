//! Data-provider seams. Raster formats are handled by external
//! collaborators; the pipeline only depends on the [`IfgLoader`] trait.

pub mod memory;

pub use memory::MemoryLoader;

use std::path::Path;

use crate::types::{CorrectResult, Ifg};

/// Loads and persists interferograms by working path. Implementations
/// wrap whatever raster backend the deployment uses; the crate ships an
/// in-memory provider for embedders that already hold arrays.
pub trait IfgLoader: Send + Sync {
    fn load(&self, path: &Path) -> CorrectResult<Ifg>;

    fn save(&self, ifg: &Ifg) -> CorrectResult<()>;
}
