//! Tile and metadata coordination: builds the canonical per-interferogram
//! metadata mapping across the worker pool and persists it for reuse.
//!
//! Each worker summarizes only its own contiguous partition of the active
//! set; the partials are merged into one canonical mapping keyed by
//! working path, and the coordinator attaches raster header fields and
//! the epoch list before writing the artifact to the working directory.

use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::comm::Procs;
use crate::config::{Config, IfgPaths};
use crate::core::epochs::get_epochs;
use crate::io::IfgLoader;
use crate::types::{CorrectResult, EpochList, GeoTransform, PrereadIfg};

/// The persisted form of the metadata mapping: the per-interferogram
/// summaries plus side-channel header fields taken from one
/// representative raster. Consumers must treat it as a cache invalidated
/// whenever the active interferogram set changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrereadArtifact {
    pub ifgs: BTreeMap<PathBuf, PrereadIfg>,
    pub epochlist: EpochList,
    pub geo_transform: GeoTransform,
    pub projection: String,
    pub metadata: BTreeMap<String, String>,
}

/// Build the canonical metadata mapping for the active interferogram set.
///
/// Workers each open only their partition's working copies and close them
/// straight after summarizing. The merged mapping is persisted by the
/// coordinator together with header fields and the epoch list; callers
/// receive the bare per-interferogram mapping. A missing input raster or
/// a conflicting duplicate working path aborts the whole operation.
pub fn build_metadata(
    procs: &Procs,
    loader: &dyn IfgLoader,
    ifg_files: &[IfgPaths],
    config: &Config,
) -> CorrectResult<BTreeMap<PathBuf, PrereadIfg>> {
    if ifg_files.is_empty() {
        return Err(crate::types::CorrectError::Data(
            "cannot collect metadata for an empty interferogram set".into(),
        ));
    }

    let ifgs_dict = procs.gather_map(ifg_files, |part| {
        let mut partial = BTreeMap::new();
        for paths in part {
            let ifg = loader.load(&paths.tmp_path)?;
            partial.insert(
                paths.tmp_path.clone(),
                PrereadIfg {
                    path: paths.sampled_path.clone(),
                    tmp_path: paths.tmp_path.clone(),
                    nan_fraction: ifg.nan_fraction(),
                    first: ifg.first,
                    second: ifg.second,
                    time_span: ifg.time_span(),
                    nrows: ifg.nrows(),
                    ncols: ifg.ncols(),
                    metadata: ifg.metadata.clone(),
                },
            );
            drop(ifg);
        }
        Ok(partial)
    })?;

    procs.run_once(|| save_artifact(loader, &ifgs_dict, ifg_files, config))?;
    log::debug!("finished collecting metadata for {} interferograms", ifgs_dict.len());
    Ok(ifgs_dict)
}

fn save_artifact(
    loader: &dyn IfgLoader,
    ifgs_dict: &BTreeMap<PathBuf, PrereadIfg>,
    ifg_files: &[IfgPaths],
    config: &Config,
) -> CorrectResult<()> {
    if !config.tmp_dir.exists() {
        fs::create_dir_all(&config.tmp_dir)?;
    }

    // header fields come from one representative interferogram
    let representative = loader.load(&ifg_files[0].tmp_path)?;
    let epochlist = get_epochs(ifgs_dict.values().map(|p| (p.first, p.second)))?;
    log::info!(
        "found {} unique epochs in the {} interferogram network",
        epochlist.len(),
        ifgs_dict.len()
    );

    let artifact = PrereadArtifact {
        ifgs: ifgs_dict.clone(),
        epochlist,
        geo_transform: representative.geo_transform.clone(),
        projection: representative.projection.clone(),
        metadata: representative.metadata.clone(),
    };

    let file = File::create(config.preread_path())?;
    serde_json::to_writer(BufWriter::new(file), &artifact)?;
    Ok(())
}

/// Read a previously persisted metadata artifact back, so a later
/// pipeline phase can resume without recomputation
pub fn load_artifact<P: AsRef<Path>>(path: P) -> CorrectResult<PrereadArtifact> {
    let file = File::open(path.as_ref())?;
    let artifact = serde_json::from_reader(BufReader::new(file))?;
    Ok(artifact)
}

/// Copy each sampled input to its temporary working path so correction
/// steps can mutate phase data without touching the inputs
pub fn stage_ifgs(
    procs: &Procs,
    loader: &dyn IfgLoader,
    ifg_files: &[IfgPaths],
) -> CorrectResult<()> {
    log::info!("copying inputs into the working area for correction");
    procs.scatter(ifg_files, |part| {
        for paths in part {
            let mut ifg = loader.load(&paths.sampled_path)?;
            ifg.path = paths.tmp_path.clone();
            loader.save(&ifg)?;
        }
        Ok(())
    })
}
