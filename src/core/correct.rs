//! Pipeline orchestration: drives the user-ordered sequence of
//! correction steps over the active interferogram set.
//!
//! The step set is closed; requested step names are validated before
//! anything executes. Steps communicate through an explicit shared
//! [`PipelineState`] and run strictly sequentially, in exactly the
//! declared order. A failing step stops the run and its error
//! propagates unchanged.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::comm::Procs;
use crate::config::{Config, IfgPaths};
use crate::core::closure::{self, ClosureEngine};
use crate::core::epochs::get_epochs;
use crate::core::mst::{self, MstMatrix};
use crate::core::preread::{build_metadata, stage_ifgs};
use crate::core::tile::get_tiles;
use crate::io::IfgLoader;
use crate::types::{CorrectResult, EpochList, PrereadIfg, Tile};

/// The closed set of correction steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorrectStep {
    OrbFit,
    RefPhase,
    PhaseClosure,
    DemError,
    Mst,
    ApsCorrect,
    MaxVar,
}

impl CorrectStep {
    pub const ALL: [CorrectStep; 7] = [
        CorrectStep::OrbFit,
        CorrectStep::RefPhase,
        CorrectStep::PhaseClosure,
        CorrectStep::DemError,
        CorrectStep::Mst,
        CorrectStep::ApsCorrect,
        CorrectStep::MaxVar,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CorrectStep::OrbFit => "orbfit",
            CorrectStep::RefPhase => "refphase",
            CorrectStep::PhaseClosure => "phase_closure",
            CorrectStep::DemError => "demerror",
            CorrectStep::Mst => "mst",
            CorrectStep::ApsCorrect => "apscorrect",
            CorrectStep::MaxVar => "maxvar",
        }
    }
}

impl fmt::Display for CorrectStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CorrectStep {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CorrectStep::ALL
            .iter()
            .find(|step| step.name() == s)
            .copied()
            .ok_or(())
    }
}

/// Shared pipeline state: the message board between correction steps.
/// Typed fields cover what the orchestrator itself maintains; the
/// `params` map carries collaborator-defined values.
#[derive(Debug, Default)]
pub struct PipelineState {
    /// Active interferogram descriptors, shrunk only by closure filtering
    pub ifg_files: Vec<IfgPaths>,
    /// Spatial tiles, computed once and read-only thereafter
    pub tiles: Vec<Tile>,
    /// Canonical metadata mapping keyed by working path
    pub preread: BTreeMap<PathBuf, PrereadIfg>,
    /// Epoch list over the active set
    pub epochs: Option<EpochList>,
    /// Reference pixel (row, col) chosen before any step runs
    pub ref_pixel: Option<(usize, usize)>,
    /// Per-pixel reduced network, produced by the `mst` step
    pub mst_trees: Option<MstMatrix>,
    /// Free-form values exchanged between collaborator steps
    pub params: BTreeMap<String, serde_json::Value>,
}

impl PipelineState {
    pub fn new(ifg_files: Vec<IfgPaths>) -> Self {
        Self {
            ifg_files,
            ..Default::default()
        }
    }
}

/// A collaborator step entry point: reads and writes shared state
pub type StepFn = Box<dyn Fn(&mut PipelineState) -> CorrectResult<()> + Send + Sync>;

/// Reference pixel estimator entry point
pub type RefPixelFn = Box<dyn Fn(&PipelineState) -> CorrectResult<(usize, usize)> + Send + Sync>;

/// Collaborator entry points for the externally implemented steps.
/// `mst` and `phase_closure` are built in; the rest are black boxes
/// supplied by the embedder.
pub struct StepRegistry {
    pub orbfit: StepFn,
    pub refphase: StepFn,
    pub demerror: StepFn,
    pub apscorrect: StepFn,
    pub maxvar: StepFn,
    pub ref_pixel: RefPixelFn,
    pub closure: Box<dyn ClosureEngine>,
}

fn noop() -> StepFn {
    Box::new(|_state: &mut PipelineState| Ok(()))
}

impl Default for StepRegistry {
    /// No-op collaborators, a centre-of-raster reference pixel and a
    /// closure engine reporting zero loops. Embedders replace the
    /// entries they need with real implementations.
    fn default() -> Self {
        Self {
            orbfit: noop(),
            refphase: noop(),
            demerror: noop(),
            apscorrect: noop(),
            maxvar: noop(),
            ref_pixel: Box::new(|state: &PipelineState| {
                let summary = state.preread.values().next().ok_or_else(|| {
                    crate::types::CorrectError::Data(
                        "cannot pick a reference pixel without metadata".into(),
                    )
                })?;
                Ok((summary.nrows / 2, summary.ncols / 2))
            }),
            closure: Box::new(closure::NoLoopEngine),
        }
    }
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, step: CorrectStep) -> &StepFn {
        match step {
            CorrectStep::OrbFit => &self.orbfit,
            CorrectStep::RefPhase => &self.refphase,
            CorrectStep::DemError => &self.demerror,
            CorrectStep::ApsCorrect => &self.apscorrect,
            CorrectStep::MaxVar => &self.maxvar,
            // built-in steps are dispatched by the orchestrator
            CorrectStep::PhaseClosure | CorrectStep::Mst => {
                unreachable!("built-in step dispatched as collaborator")
            }
        }
    }
}

/// Top level entry: stage working copies, then run the correct sequence
pub fn run(
    config: &Config,
    registry: &StepRegistry,
    loader: &dyn IfgLoader,
) -> CorrectResult<PipelineState> {
    let procs = Procs::new(config.num_workers);
    stage_ifgs(&procs, loader, &config.interferogram_files)?;
    correct_ifgs(config, registry, loader)
}

/// Run the correction sequence over already-staged working copies
pub fn correct_ifgs(
    config: &Config,
    registry: &StepRegistry,
    loader: &dyn IfgLoader,
) -> CorrectResult<PipelineState> {
    // fail fast: no collaborator may run on a bad step list
    let steps = config.steps()?;
    let procs = Procs::new(config.num_workers);
    let mut state = PipelineState::new(config.interferogram_files.clone());

    // house keeping: tiling, metadata, reference pixel
    let first_paths = state.ifg_files.first().ok_or_else(|| {
        crate::types::CorrectError::Config("no interferogram files configured".into())
    })?;
    let first = loader.load(&first_paths.tmp_path)?;
    let shape = (first.nrows(), first.ncols());
    drop(first);
    state.tiles = procs.run_once(|| get_tiles(shape, config.tile_rows, config.tile_cols))?;

    state.preread = build_metadata(&procs, loader, &state.ifg_files, config)?;
    state.epochs = Some(get_epochs(
        state.preread.values().map(|p| (p.first, p.second)),
    )?);

    let ref_pixel = (registry.ref_pixel)(&state)?;
    log::info!("reference pixel set to ({}, {})", ref_pixel.0, ref_pixel.1);
    state.ref_pixel = Some(ref_pixel);

    // user-declared order is the contract; no reordering
    for step in &steps {
        log::info!("running correct step '{}'", step);
        match step {
            CorrectStep::PhaseClosure => {
                closure::apply_closure_filter(
                    &mut state,
                    config,
                    registry.closure.as_ref(),
                    &procs,
                    loader,
                )?;
            }
            CorrectStep::Mst => mst::mst_calc(&mut state, loader)?,
            other => (registry.entry(*other))(&mut state)?,
        }
    }
    log::info!("finished 'correct' sequence");
    Ok(state)
}
