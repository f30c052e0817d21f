//! Pipeline configuration: interferogram descriptors, requested correction
//! step order, phase closure parameters and tiling/worker counts.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::core::correct::CorrectStep;
use crate::types::{CorrectError, CorrectResult};

/// Paths for one interferogram: the permanent sampled input and the
/// temporary working copy mutated during correction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IfgPaths {
    pub sampled_path: PathBuf,
    pub tmp_path: PathBuf,
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active interferogram descriptors, in stack order
    pub interferogram_files: Vec<IfgPaths>,
    /// Requested correction steps, executed in exactly this order
    pub correct: Vec<String>,
    /// Whether the phase closure step performs any filtering
    #[serde(default)]
    pub phase_closure: bool,
    /// Pixels breaching the unwrap threshold in more than this many
    /// loops are masked as missing
    #[serde(default)]
    pub max_unwrap_occurrences: u32,
    /// Number of tile rows / columns for spatial parallelism
    pub tile_rows: usize,
    pub tile_cols: usize,
    /// Working directory for persisted intermediate artifacts
    pub tmp_dir: PathBuf,
    /// Output directory for audit files
    pub out_dir: PathBuf,
    /// Size of the parallel worker pool
    #[serde(default = "default_workers")]
    pub num_workers: usize,
}

fn default_workers() -> usize {
    1
}

impl Config {
    /// Load a configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> CorrectResult<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            CorrectError::Config(format!(
                "cannot open config {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let config: Config = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the requested step names against the closed step set.
    /// An unknown name is a fatal configuration error; nothing runs.
    pub fn steps(&self) -> CorrectResult<Vec<CorrectStep>> {
        self.correct
            .iter()
            .map(|name| {
                name.parse::<CorrectStep>().map_err(|_| {
                    CorrectError::Config(format!(
                        "'{}' is not a supported correct step; supported steps are {:?}",
                        name,
                        CorrectStep::ALL
                    ))
                })
            })
            .collect()
    }

    pub fn validate(&self) -> CorrectResult<()> {
        if self.interferogram_files.is_empty() {
            return Err(CorrectError::Config(
                "no interferogram files configured".into(),
            ));
        }
        if self.tile_rows == 0 || self.tile_cols == 0 {
            return Err(CorrectError::Config(
                "tile_rows and tile_cols must be at least 1".into(),
            ));
        }
        if self.num_workers == 0 {
            return Err(CorrectError::Config("num_workers must be at least 1".into()));
        }
        self.steps().map(|_| ())
    }

    /// Location of the persisted preread metadata artifact
    pub fn preread_path(&self) -> PathBuf {
        self.tmp_dir.join("preread_ifgs.json")
    }

    /// Location of the closure-filtered interferogram list
    pub fn filtered_list_path(&self) -> PathBuf {
        self.out_dir.join("phase_closure_filtered_ifgs.txt")
    }
}
