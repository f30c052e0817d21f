//! Phase closure filtering of the active interferogram set.
//!
//! Closure-loop residual statistics come from an external collaborator
//! behind [`ClosureEngine`]. This module applies the outcome: drops
//! interferograms that fail closure, persists the filtered list for
//! auditing, masks pixels breaching the unwrap-occurrence threshold, and
//! rebuilds the metadata mapping on the shrunk set so later steps see a
//! consistent epoch list.

use ndarray::Array2;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::comm::Procs;
use crate::config::Config;
use crate::core::correct::PipelineState;
use crate::core::epochs::get_epochs;
use crate::core::preread::build_metadata;
use crate::io::IfgLoader;
use crate::types::{CorrectError, CorrectResult};

/// Result of the closure-loop residual computation
#[derive(Debug, Clone)]
pub struct ClosureOutcome {
    /// Working paths retained by the closure check
    pub retained: Vec<PathBuf>,
    /// Closure breach count per interferogram working path
    pub breach_count: BTreeMap<PathBuf, u32>,
    /// Per-pixel count of unwrap-threshold breach occurrences
    pub occurrences: Array2<u32>,
}

/// Collaborator computing closure-loop residuals over the active
/// network. `Ok(None)` reports a network with zero independent loops,
/// which the filter treats as a fatal configuration error.
pub trait ClosureEngine: Send + Sync {
    fn check(&self, state: &PipelineState) -> CorrectResult<Option<ClosureOutcome>>;
}

/// Placeholder engine reporting zero loops. Running the phase closure
/// step against it fails, which makes a missing real engine explicit.
pub struct NoLoopEngine;

impl ClosureEngine for NoLoopEngine {
    fn check(&self, _state: &PipelineState) -> CorrectResult<Option<ClosureOutcome>> {
        Ok(None)
    }
}

/// Apply closure filtering to the active set.
///
/// Returns the filtered working paths, per-interferogram breach counts
/// and the per-pixel occurrence counts when filtering ran; `None` when
/// the phase closure flag is disabled.
#[allow(clippy::type_complexity)]
pub fn apply_closure_filter(
    state: &mut PipelineState,
    config: &Config,
    engine: &dyn ClosureEngine,
    procs: &Procs,
    loader: &dyn IfgLoader,
) -> CorrectResult<Option<(Vec<PathBuf>, BTreeMap<PathBuf, u32>, Array2<u32>)>> {
    if !config.phase_closure {
        log::info!("phase closure correction is not required");
        return Ok(None);
    }

    let outcome = engine
        .check(state)?
        .ok_or(CorrectError::ZeroClosureLoops)?;

    // the retained set is computed once and applied identically
    // everywhere; workers never recompute it independently
    let retained: BTreeSet<&PathBuf> = outcome.retained.iter().collect();
    let dropped = state.ifg_files.len() - state
        .ifg_files
        .iter()
        .filter(|p| retained.contains(&p.tmp_path))
        .count();
    state.ifg_files.retain(|p| retained.contains(&p.tmp_path));
    log::info!(
        "phase closure filtering dropped {} interferograms, {} remain",
        dropped,
        state.ifg_files.len()
    );
    if state.ifg_files.is_empty() {
        return Err(CorrectError::Data(
            "phase closure filtering removed every interferogram".into(),
        ));
    }

    procs.run_once(|| persist_filtered_list(state, config))?;
    mask_unwrap_errors(state, config, &outcome.occurrences, procs, loader)?;

    // later steps must observe a consistent epoch list and working set
    state.preread = build_metadata(procs, loader, &state.ifg_files, config)?;
    state.epochs = Some(get_epochs(
        state.preread.values().map(|p| (p.first, p.second)),
    )?);

    let filtered: Vec<PathBuf> = state.ifg_files.iter().map(|p| p.tmp_path.clone()).collect();
    Ok(Some((filtered, outcome.breach_count, outcome.occurrences)))
}

/// Write the filtered interferogram list, one source path per line,
/// performed by the coordinator only
fn persist_filtered_list(state: &PipelineState, config: &Config) -> CorrectResult<()> {
    if !config.out_dir.exists() {
        fs::create_dir_all(&config.out_dir)?;
    }
    let mut file = fs::File::create(config.filtered_list_path())?;
    for paths in &state.ifg_files {
        writeln!(file, "{}", paths.sampled_path.display())?;
    }
    Ok(())
}

/// Set pixels whose breach occurrence count exceeds the configured
/// threshold to NaN across all retained interferograms. Destructive and
/// performed once, before the metadata mapping is rebuilt.
fn mask_unwrap_errors(
    state: &PipelineState,
    config: &Config,
    occurrences: &Array2<u32>,
    procs: &Procs,
    loader: &dyn IfgLoader,
) -> CorrectResult<()> {
    let breached: Vec<(usize, usize)> = occurrences
        .indexed_iter()
        .filter(|(_, &count)| count > config.max_unwrap_occurrences)
        .map(|(idx, _)| idx)
        .collect();
    if breached.is_empty() {
        return Ok(());
    }
    log::info!(
        "masking {} pixels breaching the unwrap occurrence threshold ({})",
        breached.len(),
        config.max_unwrap_occurrences
    );

    procs.scatter(&state.ifg_files, |part| {
        for paths in part {
            let mut ifg = loader.load(&paths.tmp_path)?;
            if (ifg.nrows(), ifg.ncols()) != occurrences.dim() {
                return Err(CorrectError::Data(format!(
                    "occurrence grid {}x{} does not match raster {}x{}",
                    occurrences.nrows(),
                    occurrences.ncols(),
                    ifg.nrows(),
                    ifg.ncols()
                )));
            }
            for &(r, c) in &breached {
                ifg.phase_data[(r, c)] = f32::NAN;
            }
            loader.save(&ifg)?;
        }
        Ok(())
    })
}
