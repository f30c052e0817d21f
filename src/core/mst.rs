//! Per-pixel Minimum Spanning Tree reduction of the interferogram
//! network.
//!
//! For every pixel independently, the interferograms with a finite phase
//! value form a multigraph over epoch nodes; a spanning tree (forest, if
//! the coherent subset is disconnected) selects one representative
//! interferogram path per epoch pair and discards redundant connections.
//! All edges are uniform weight, so selection is by connectivity only and
//! ties break in favour of the earliest-listed interferogram.

use ndarray::Array2;
use rayon::prelude::*;
use std::collections::BTreeMap;

use crate::core::epochs::get_epochs;
use crate::io::IfgLoader;
use crate::types::{CorrectError, CorrectResult, EpochDate, EpochList, Ifg, Tile};

/// Edges of one spanning tree/forest as (first, second) epoch pairs
pub type MstEdges = Vec<(EpochDate, EpochDate)>;

/// Per-pixel trees; `None` marks a pixel with zero coherent interferograms
pub type MstMatrix = Array2<Option<MstEdges>>;

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merge the sets holding `a` and `b`; false if already connected
    fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        self.parent[rb] = ra;
        true
    }
}

/// Spanning tree over the full, unfiltered interferogram network,
/// ignoring per-pixel missingness. Edges are drawn only from the input
/// set and every epoch present in the network is covered. Used as a
/// baseline redundancy-reduced network when no per-pixel reduction is
/// requested.
pub fn default_mst(ifgs: &[Ifg]) -> CorrectResult<MstEdges> {
    let epochs = get_epochs(ifgs.iter().map(|i| (i.first, i.second)))?;
    let index = epoch_index(&epochs);
    let mut uf = UnionFind::new(epochs.len());
    let mut edges = Vec::new();
    for ifg in ifgs {
        // unique dates by construction, lookups cannot miss
        if uf.union(index[&ifg.first], index[&ifg.second]) {
            edges.push((ifg.first, ifg.second));
        }
    }
    Ok(edges)
}

/// Per-pixel MST reduction over the whole raster extent.
///
/// Pixels where no interferogram is coherent yield `None`. A coherent
/// subset whose epoch graph is disconnected yields a maximal forest,
/// a degraded result not expected from a connected input network.
pub fn mst_matrix(ifgs: &[Ifg], epochs: &EpochList) -> CorrectResult<MstMatrix> {
    let shape = common_shape(ifgs)?;
    let full = Tile {
        index: 0,
        top_left: (0, 0),
        bottom_right: shape,
    };
    mst_matrix_region(ifgs, epochs, full)
}

/// Per-pixel MST reduction restricted to one tile of the extent.
/// Pixel rows are independent and processed in parallel.
pub fn mst_matrix_region(ifgs: &[Ifg], epochs: &EpochList, tile: Tile) -> CorrectResult<MstMatrix> {
    let shape = common_shape(ifgs)?;
    if tile.bottom_right.0 > shape.0 || tile.bottom_right.1 > shape.1 {
        return Err(CorrectError::Data(format!(
            "tile {:?}..{:?} exceeds the {}x{} raster extent",
            tile.top_left, tile.bottom_right, shape.0, shape.1
        )));
    }

    let index = epoch_index(epochs);
    let pairs: Vec<(usize, usize)> = ifgs
        .iter()
        .map(|ifg| {
            let a = index.get(&ifg.first);
            let b = index.get(&ifg.second);
            match (a, b) {
                (Some(&a), Some(&b)) => Ok((a, b)),
                _ => Err(CorrectError::Data(format!(
                    "interferogram {} references an epoch missing from the epoch list",
                    ifg.path.display()
                ))),
            }
        })
        .collect::<CorrectResult<_>>()?;

    let (top, left) = tile.top_left;
    let nepochs = epochs.len();
    let rows: Vec<Vec<Option<MstEdges>>> = (0..tile.nrows())
        .into_par_iter()
        .map(|r| {
            (0..tile.ncols())
                .map(|c| pixel_mst(ifgs, &pairs, nepochs, top + r, left + c))
                .collect()
        })
        .collect();

    let flat: Vec<Option<MstEdges>> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((tile.nrows(), tile.ncols()), flat)
        .map_err(|e| CorrectError::Data(format!("tile result shape mismatch: {}", e)))
}

/// Spanning forest for a single pixel, processing interferograms in
/// their original stack order
fn pixel_mst(
    ifgs: &[Ifg],
    pairs: &[(usize, usize)],
    nepochs: usize,
    row: usize,
    col: usize,
) -> Option<MstEdges> {
    let mut uf = UnionFind::new(nepochs);
    let mut edges = Vec::new();
    let mut coherent = 0usize;
    for (ifg, &(a, b)) in ifgs.iter().zip(pairs) {
        if ifg.phase_data[(row, col)].is_finite() {
            coherent += 1;
            if uf.union(a, b) {
                edges.push((ifg.first, ifg.second));
            }
        }
    }
    if coherent == 0 {
        None
    } else {
        Some(edges)
    }
}

fn epoch_index(epochs: &EpochList) -> BTreeMap<EpochDate, usize> {
    epochs
        .dates
        .iter()
        .enumerate()
        .map(|(i, d)| (*d, i))
        .collect()
}

fn common_shape(ifgs: &[Ifg]) -> CorrectResult<(usize, usize)> {
    let first = ifgs
        .first()
        .ok_or_else(|| CorrectError::Data("empty interferogram set".into()))?;
    let shape = (first.nrows(), first.ncols());
    for ifg in &ifgs[1..] {
        if (ifg.nrows(), ifg.ncols()) != shape {
            return Err(CorrectError::Data(format!(
                "interferogram {} has shape {}x{}, expected {}x{}",
                ifg.path.display(),
                ifg.nrows(),
                ifg.ncols(),
                shape.0,
                shape.1
            )));
        }
    }
    Ok(shape)
}

/// The `mst` pipeline step: reduce the active network per pixel, tile by
/// tile, and store the result in shared state for later variance steps.
pub fn mst_calc(
    state: &mut crate::core::correct::PipelineState,
    loader: &dyn IfgLoader,
) -> CorrectResult<()> {
    let ifgs: Vec<Ifg> = state
        .ifg_files
        .iter()
        .map(|p| loader.load(&p.tmp_path))
        .collect::<CorrectResult<_>>()?;
    let epochs = get_epochs(ifgs.iter().map(|i| (i.first, i.second)))?;
    let shape = common_shape(&ifgs)?;

    let mut result: MstMatrix = Array2::from_elem(shape, None);
    for tile in &state.tiles {
        let mut sub = mst_matrix_region(&ifgs, &epochs, *tile)?;
        for ((r, c), cell) in sub.indexed_iter_mut() {
            result[(tile.top_left.0 + r, tile.top_left.1 + c)] = cell.take();
        }
    }

    let reduced: usize = result.iter().filter(|c| c.is_some()).count();
    log::info!(
        "per-pixel MST reduction complete: {}/{} pixels carry a tree",
        reduced,
        result.len()
    );
    state.mst_trees = Some(result);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoTransform;
    use chrono::NaiveDate;
    use ndarray::Array2;
    use std::collections::BTreeMap as Map;
    use std::path::PathBuf;

    fn date(d: u32) -> EpochDate {
        NaiveDate::from_ymd_opt(2006, 1, 1).unwrap() + chrono::Duration::days(d as i64 * 35)
    }

    fn ifg(name: &str, first: u32, second: u32, phase: Array2<f32>) -> Ifg {
        Ifg {
            path: PathBuf::from(name),
            first: date(first),
            second: date(second),
            phase_data: phase,
            geo_transform: GeoTransform::default(),
            projection: String::new(),
            metadata: Map::new(),
        }
    }

    /// Five interferograms spanning six epochs, a connected network
    fn five_ifg_network(shape: (usize, usize)) -> Vec<Ifg> {
        vec![
            ifg("0.tif", 0, 1, Array2::from_elem(shape, 0.1)),
            ifg("1.tif", 1, 2, Array2::from_elem(shape, 0.2)),
            ifg("2.tif", 2, 3, Array2::from_elem(shape, 0.3)),
            ifg("3.tif", 3, 4, Array2::from_elem(shape, 0.4)),
            ifg("4.tif", 4, 5, Array2::from_elem(shape, 0.5)),
        ]
    }

    #[test]
    fn test_default_mst_covers_all_epochs() {
        let ifgs = five_ifg_network((1, 1));
        let res = default_mst(&ifgs).unwrap();
        // 6 epochs -> 5 edges, all drawn from the input network
        assert_eq!(res.len(), 5);
        let input_pairs: Vec<_> = ifgs.iter().map(|i| (i.first, i.second)).collect();
        for edge in &res {
            assert!(input_pairs.contains(edge));
        }
        let mut nodes: Vec<_> = res.iter().flat_map(|&(a, b)| [a, b]).collect();
        nodes.sort();
        nodes.dedup();
        assert_eq!(nodes.len(), 6);
    }

    #[test]
    fn test_default_mst_drops_redundant_edges() {
        let mut ifgs = five_ifg_network((1, 1));
        // a redundant edge closing a loop over epochs 0..2
        ifgs.push(ifg("5.tif", 0, 2, Array2::from_elem((1, 1), 0.6)));
        let res = default_mst(&ifgs).unwrap();
        assert_eq!(res.len(), 5);
        assert!(!res.contains(&(date(0), date(2))));
    }

    #[test]
    fn test_mst_matrix_fully_coherent() {
        let ifgs = five_ifg_network((2, 3));
        let epochs = get_epochs(ifgs.iter().map(|i| (i.first, i.second))).unwrap();
        let res = mst_matrix(&ifgs, &epochs).unwrap();
        assert_eq!(res.dim(), (2, 3));
        for cell in res.iter() {
            let edges = cell.as_ref().unwrap();
            assert_eq!(edges.len(), epochs.len() - 1);
        }
    }

    #[test]
    fn test_partial_nan_pixel_stack() {
        // limited coherent cells must shrink the per-pixel tree
        let num_coherent = 3;
        let mut ifgs = five_ifg_network((1, 1));
        for i in ifgs[num_coherent..].iter_mut() {
            i.phase_data.fill(f32::NAN);
        }
        let epochs = get_epochs(ifgs.iter().map(|i| (i.first, i.second))).unwrap();
        let res = mst_matrix(&ifgs, &epochs).unwrap();
        assert_eq!(res[(0, 0)].as_ref().unwrap().len(), num_coherent);

        // fill in more nans leaving only one ifg
        for i in ifgs[1..num_coherent].iter_mut() {
            i.phase_data.fill(f32::NAN);
        }
        let res = mst_matrix(&ifgs, &epochs).unwrap();
        assert_eq!(res[(0, 0)].as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_all_nan_pixel_stack_is_missing() {
        for shape in [(1, 1), (2, 2), (3, 5)] {
            let mut ifgs = five_ifg_network(shape);
            for i in ifgs.iter_mut() {
                i.phase_data.fill(f32::NAN);
            }
            let epochs = get_epochs(ifgs.iter().map(|i| (i.first, i.second))).unwrap();
            let res = mst_matrix(&ifgs, &epochs).unwrap();
            assert_eq!(res.dim(), shape);
            assert!(res.iter().all(|c| c.is_none()));
        }
    }

    #[test]
    fn test_edge_count_invariant() {
        // e reachable epochs at a pixel -> e - 1 edges
        let mut ifgs = five_ifg_network((1, 1));
        // extra redundant connections
        ifgs.push(ifg("5.tif", 0, 2, Array2::from_elem((1, 1), 0.6)));
        ifgs.push(ifg("6.tif", 1, 3, Array2::from_elem((1, 1), 0.7)));
        let epochs = get_epochs(ifgs.iter().map(|i| (i.first, i.second))).unwrap();
        let res = mst_matrix(&ifgs, &epochs).unwrap();
        assert_eq!(res[(0, 0)].as_ref().unwrap().len(), epochs.len() - 1);
    }

    #[test]
    fn test_disconnected_subset_yields_forest() {
        // coherent subset covers epochs {0,1} and {3,4}: two components
        let mut ifgs = five_ifg_network((1, 1));
        ifgs[1].phase_data.fill(f32::NAN); // 1-2
        ifgs[2].phase_data.fill(f32::NAN); // 2-3
        let epochs = get_epochs(ifgs.iter().map(|i| (i.first, i.second))).unwrap();
        let res = mst_matrix(&ifgs, &epochs).unwrap();
        let edges = res[(0, 0)].as_ref().unwrap();
        assert_eq!(edges.len(), 3); // maximal forest over 0-1, 3-4, 4-5
    }

    #[test]
    fn test_input_order_tie_break() {
        // two parallel interferograms over the same pair: earliest wins
        let ifgs = vec![
            ifg("a.tif", 0, 1, Array2::from_elem((1, 1), 0.1)),
            ifg("b.tif", 0, 1, Array2::from_elem((1, 1), 0.2)),
            ifg("c.tif", 1, 2, Array2::from_elem((1, 1), 0.3)),
        ];
        let res = default_mst(&ifgs).unwrap();
        assert_eq!(res, vec![(date(0), date(1)), (date(1), date(2))]);
    }

    #[test]
    fn test_mst_matrix_region_matches_full() {
        let mut ifgs = five_ifg_network((4, 4));
        ifgs[0].phase_data[(3, 2)] = f32::NAN;
        let epochs = get_epochs(ifgs.iter().map(|i| (i.first, i.second))).unwrap();
        let full = mst_matrix(&ifgs, &epochs).unwrap();
        let tile = Tile {
            index: 1,
            top_left: (2, 1),
            bottom_right: (4, 4),
        };
        let sub = mst_matrix_region(&ifgs, &epochs, tile).unwrap();
        for ((r, c), cell) in sub.indexed_iter() {
            assert_eq!(cell, &full[(2 + r, 1 + c)]);
        }
    }
}
