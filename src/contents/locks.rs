use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Slots are pruned once the table grows past this many entries.
const PRUNE_THRESHOLD: usize = 1024;

/// In-process per-path mutexes held across a fingerprint check and the write or
/// delete that depends on it. Other processes are not covered.
#[derive(Debug, Default)]
pub struct PathLocks {
    slots: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the mutex for `path`.
    pub fn with_path<T>(&self, path: &Path, f: impl FnOnce() -> T) -> T {
        let slot = {
            let mut map = self.slots.lock();
            if map.len() > PRUNE_THRESHOLD {
                map.retain(|_, m| Arc::strong_count(m) > 1);
            }
            map.entry(path.to_path_buf()).or_default().clone()
        };
        let _guard = slot.lock();
        f()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.lock().len()
    }
}
