//! Fixed-size worker pool with collective partition/merge semantics.
//!
//! Work is split into deterministic contiguous partitions, one per rank,
//! processed in parallel, then merged back into a single canonical mapping.
//! The merge is order-independent because keys are globally unique; a
//! duplicate key with a conflicting value aborts the whole operation.

use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::types::{CorrectError, CorrectResult};

/// The coordinator rank, responsible for all single-writer side effects
pub const MAIN_PROCESS: usize = 0;

/// A fixed-size pool of cooperating workers identified by rank
#[derive(Debug, Clone, Copy)]
pub struct Procs {
    size: usize,
}

impl Procs {
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Deterministic contiguous partition for one rank. Every rank but the
    /// last receives a fixed-size slice; the last takes the remainder.
    pub fn array_split<'a, T>(&self, items: &'a [T], rank: usize) -> &'a [T] {
        let chunk = items.len().div_ceil(self.size);
        let start = (rank * chunk).min(items.len());
        let end = ((rank + 1) * chunk).min(items.len());
        &items[start..end]
    }

    /// Run `f` over every rank's partition in parallel and merge the
    /// partial mappings. A failure in any partition aborts all of them.
    pub fn gather_map<T, K, V, F>(&self, items: &[T], f: F) -> CorrectResult<BTreeMap<K, V>>
    where
        T: Sync,
        K: Ord + Debug + Send,
        V: PartialEq + Send,
        F: Fn(&[T]) -> CorrectResult<BTreeMap<K, V>> + Sync,
    {
        let partials: Vec<CorrectResult<BTreeMap<K, V>>> = (0..self.size)
            .into_par_iter()
            .map(|rank| f(self.array_split(items, rank)))
            .collect();

        let mut maps = Vec::with_capacity(self.size);
        for partial in partials {
            maps.push(partial?);
        }
        join_maps(maps)
    }

    /// Run a side-effecting operation over every rank's partition in
    /// parallel; any failure aborts all ranks.
    pub fn scatter<T, F>(&self, items: &[T], f: F) -> CorrectResult<()>
    where
        T: Sync,
        F: Fn(&[T]) -> CorrectResult<()> + Sync,
    {
        (0..self.size)
            .into_par_iter()
            .map(|rank| f(self.array_split(items, rank)))
            .collect::<Vec<CorrectResult<()>>>()
            .into_iter()
            .collect()
    }

    /// Execute a single-writer side effect exactly once, on the coordinator
    pub fn run_once<R, F: FnOnce() -> R>(&self, f: F) -> R {
        log::debug!("running single-writer operation on rank {}", MAIN_PROCESS);
        f()
    }
}

/// Order-independent union of per-worker partial mappings. Keys are
/// expected to be globally unique; observing the same key twice with
/// different values is a merge conflict.
pub fn join_maps<K, V>(parts: Vec<BTreeMap<K, V>>) -> CorrectResult<BTreeMap<K, V>>
where
    K: Ord + Debug,
    V: PartialEq,
{
    let mut merged = BTreeMap::new();
    for part in parts {
        for (key, value) in part {
            match merged.get(&key) {
                Some(existing) if *existing != value => {
                    return Err(CorrectError::MergeConflict {
                        key: format!("{:?}", key),
                    });
                }
                _ => {
                    merged.insert(key, value);
                }
            }
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_split_covers_all_items() {
        let items: Vec<usize> = (0..10).collect();
        for size in 1..=5 {
            let procs = Procs::new(size);
            let mut seen = Vec::new();
            for rank in 0..size {
                seen.extend_from_slice(procs.array_split(&items, rank));
            }
            assert_eq!(seen, items, "pool size {}", size);
        }
    }

    #[test]
    fn test_array_split_last_rank_takes_remainder() {
        let items: Vec<usize> = (0..7).collect();
        let procs = Procs::new(3);
        assert_eq!(procs.array_split(&items, 0), &[0, 1, 2]);
        assert_eq!(procs.array_split(&items, 1), &[3, 4, 5]);
        assert_eq!(procs.array_split(&items, 2), &[6]);
    }

    #[test]
    fn test_join_maps_is_union() {
        let mut a = BTreeMap::new();
        a.insert("x", 1);
        let mut b = BTreeMap::new();
        b.insert("y", 2);
        let merged = join_maps(vec![a, b]).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged["x"], 1);
        assert_eq!(merged["y"], 2);
    }

    #[test]
    fn test_join_maps_conflict_aborts() {
        let mut a = BTreeMap::new();
        a.insert("x", 1);
        let mut b = BTreeMap::new();
        b.insert("x", 2);
        let err = join_maps(vec![a, b]).unwrap_err();
        assert!(matches!(err, CorrectError::MergeConflict { .. }));
    }

    #[test]
    fn test_join_maps_duplicate_equal_value_is_fine() {
        let mut a = BTreeMap::new();
        a.insert("x", 1);
        let b = a.clone();
        let merged = join_maps(vec![a, b]).unwrap();
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_gather_map_merges_partitions() {
        let items: Vec<usize> = (0..8).collect();
        let procs = Procs::new(3);
        let merged = procs
            .gather_map(&items, |part| {
                Ok(part.iter().map(|&i| (i, i * i)).collect())
            })
            .unwrap();
        assert_eq!(merged.len(), 8);
        assert_eq!(merged[&5], 25);
    }

    #[test]
    fn test_gather_map_error_aborts() {
        let items: Vec<usize> = (0..8).collect();
        let procs = Procs::new(2);
        let res: CorrectResult<BTreeMap<usize, usize>> = procs.gather_map(&items, |part| {
            if part.contains(&7) {
                Err(CorrectError::Data("missing input raster".into()))
            } else {
                Ok(part.iter().map(|&i| (i, i)).collect())
            }
        });
        assert!(res.is_err());
    }
}
