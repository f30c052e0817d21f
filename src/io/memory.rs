use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::io::IfgLoader;
use crate::types::{CorrectError, CorrectResult, Ifg};

/// In-memory interferogram store keyed by path. The reference loader for
/// tests and for embedders that already hold phase arrays in memory.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    store: RwLock<HashMap<PathBuf, Ifg>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an interferogram under its own path
    pub fn insert(&self, ifg: Ifg) {
        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        store.insert(ifg.path.clone(), ifg);
    }

    pub fn contains(&self, path: &Path) -> bool {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        store.contains_key(path)
    }

    pub fn len(&self) -> usize {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IfgLoader for MemoryLoader {
    fn load(&self, path: &Path) -> CorrectResult<Ifg> {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        store.get(path).cloned().ok_or_else(|| {
            CorrectError::Data(format!("interferogram not found: {}", path.display()))
        })
    }

    fn save(&self, ifg: &Ifg) -> CorrectResult<()> {
        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        store.insert(ifg.path.clone(), ifg.clone());
        Ok(())
    }
}
