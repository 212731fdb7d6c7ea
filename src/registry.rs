//! Process-lifetime corpus memoization.
//!
//! Each (source path, format) pair gets one slot. The map lock is only held
//! to find or create the slot; the build itself runs under the slot's
//! `OnceCell`, so concurrent first requests for the same key wait for a
//! single build instead of racing. A failed build leaves the slot empty and
//! the next request retries.

use crate::index::BibleCorpus;
use crate::loader::{load_corpus, LoadError};
use crate::models::{LoaderConfig, SourceFormat};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

type Slot = Arc<OnceCell<Arc<BibleCorpus>>>;

#[derive(Debug, Default)]
pub struct CorpusRegistry {
    config: LoaderConfig,
    slots: Mutex<HashMap<(PathBuf, SourceFormat), Slot>>,
}

impl CorpusRegistry {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    fn key(path: &Path, format: SourceFormat) -> (PathBuf, SourceFormat) {
        (path.to_path_buf(), format)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(PathBuf, SourceFormat), Slot>> {
        // Slots are only ever inserted, so a poisoned map is still consistent.
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn slot(&self, path: &Path, format: SourceFormat) -> Slot {
        self.lock().entry(Self::key(path, format)).or_default().clone()
    }

    /// Load the corpus for `path` once, then share it.
    pub fn get_or_load(
        &self,
        path: &Path,
        format: SourceFormat,
    ) -> Result<Arc<BibleCorpus>, LoadError> {
        self.get_or_build(path, format, || load_corpus(path, format, &self.config))
    }

    /// Like [`get_or_load`](Self::get_or_load) with a caller-supplied builder.
    pub fn get_or_build<F>(
        &self,
        path: &Path,
        format: SourceFormat,
        build: F,
    ) -> Result<Arc<BibleCorpus>, LoadError>
    where
        F: FnOnce() -> Result<BibleCorpus, LoadError>,
    {
        let slot = self.slot(path, format);
        slot.get_or_try_init(|| build().map(Arc::new)).cloned()
    }

    /// Register an already-built corpus. Returns `false` if the key was taken.
    pub fn insert(&self, path: &Path, format: SourceFormat, corpus: BibleCorpus) -> bool {
        self.slot(path, format).set(Arc::new(corpus)).is_ok()
    }

    /// The corpus for a key, if it has been built. Never creates a slot.
    pub fn get(&self, path: &Path, format: SourceFormat) -> Option<Arc<BibleCorpus>> {
        self.lock()
            .get(&Self::key(path, format))
            .and_then(|slot| slot.get().cloned())
    }

    /// Number of corpora built so far.
    pub fn len(&self) -> usize {
        self.lock().values().filter(|slot| slot.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
