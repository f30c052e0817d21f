use chrono::NaiveDate;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A single radar acquisition date, used as a node in the epoch network
pub type EpochDate = NaiveDate;

/// 2D phase raster (row x col); NaN marks missing/incoherent pixels
pub type PhaseImage = Array2<f32>;

/// Days per year used when converting epoch separations to time spans
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Geospatial transformation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self {
            top_left_x: 0.0,
            pixel_width: 1.0,
            rotation_x: 0.0,
            top_left_y: 0.0,
            rotation_y: 0.0,
            pixel_height: -1.0,
        }
    }
}

/// An interferogram: phase differences between two acquisitions (epochs)
#[derive(Debug, Clone)]
pub struct Ifg {
    /// Path identifying this interferogram within the active set
    pub path: PathBuf,
    /// First (earlier) acquisition date
    pub first: EpochDate,
    /// Second (later) acquisition date
    pub second: EpochDate,
    /// Phase values at pixel resolution; NaN denotes missing
    pub phase_data: PhaseImage,
    pub geo_transform: GeoTransform,
    /// Coordinate reference as WKT
    pub projection: String,
    /// Free-form header tags carried through from the source raster
    pub metadata: BTreeMap<String, String>,
}

impl Ifg {
    pub fn nrows(&self) -> usize {
        self.phase_data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.phase_data.ncols()
    }

    /// Span between the two acquisitions, in years
    pub fn time_span(&self) -> f64 {
        (self.second - self.first).num_days() as f64 / DAYS_PER_YEAR
    }

    /// Fraction of pixels that are missing (non-finite)
    pub fn nan_fraction(&self) -> f64 {
        let total = self.phase_data.len();
        if total == 0 {
            return 0.0;
        }
        let nans = self.phase_data.iter().filter(|v| !v.is_finite()).count();
        nans as f64 / total as f64
    }

    /// Rewrite a sentinel phase value (typically 0.0) to NaN in place
    pub fn convert_to_nans(&mut self, sentinel: f32) {
        self.phase_data
            .mapv_inplace(|v| if v == sentinel { f32::NAN } else { v });
    }
}

/// Lightweight per-interferogram summary built once during metadata
/// collection and shared across all workers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrereadIfg {
    /// Permanent sampled input path
    pub path: PathBuf,
    /// Temporary working path mutated by correction steps
    pub tmp_path: PathBuf,
    pub nan_fraction: f64,
    pub first: EpochDate,
    pub second: EpochDate,
    pub time_span: f64,
    pub nrows: usize,
    pub ncols: usize,
    pub metadata: BTreeMap<String, String>,
}

/// Unique epochs over the active interferogram set, with per-epoch
/// repeat counts and time spans in years since the first epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochList {
    /// Sorted unique acquisition dates
    pub dates: Vec<EpochDate>,
    /// Number of interferograms referencing each date
    pub repeat: Vec<usize>,
    /// Years elapsed since the earliest date
    pub spans: Vec<f64>,
}

impl EpochList {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// A rectangular sub-region of the common raster extent, the unit of
/// spatial parallelism for per-pixel numeric steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub index: usize,
    /// Inclusive top-left (row, col)
    pub top_left: (usize, usize),
    /// Exclusive bottom-right (row, col)
    pub bottom_right: (usize, usize),
}

impl Tile {
    pub fn nrows(&self) -> usize {
        self.bottom_right.0 - self.top_left.0
    }

    pub fn ncols(&self) -> usize {
        self.bottom_right.1 - self.top_left.1
    }
}

/// Error types for the correction pipeline
#[derive(Debug, thiserror::Error)]
pub enum CorrectError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Metadata merge conflict for key: {key}")]
    MergeConflict { key: String },

    #[error(
        "Zero loops returned by the phase closure check; \
         a network with no independent loops cannot be closure-checked"
    )]
    ZeroClosureLoops,

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Correction step failed: {0}")]
    External(#[from] anyhow::Error),
}

/// Result type for pipeline operations
pub type CorrectResult<T> = Result<T, CorrectError>;
