//! Compile cache.
//!
//! An explicit service object: build one at startup and pass it to
//! [`Compiler::compile_file_cached`](crate::Compiler::compile_file_cached).
//! Entries are keyed by canonical path and only served while the file's
//! modification time is unchanged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;
use tracing::debug;

use crate::finalize::CompilationResult;

struct CacheEntry {
    modified: SystemTime,
    result: Arc<CompilationResult>,
    last_used: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<PathBuf, CacheEntry>,
    clock: u64,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

pub struct CompileCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl CompileCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // A panic while holding the lock cannot leave an entry half-written.
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Hit only when the stored modification time equals `modified`. A stale
    /// entry is dropped.
    pub fn get(&self, path: &Path, modified: SystemTime) -> Option<Arc<CompilationResult>> {
        let mut state = self.lock();
        let now = state.tick();

        match state.entries.get_mut(path) {
            None => {
                debug!(path = %path.display(), "compile cache miss");
                return None;
            }
            Some(entry) if entry.modified == modified => {
                entry.last_used = now;
                debug!(path = %path.display(), "compile cache hit");
                return Some(Arc::clone(&entry.result));
            }
            Some(_) => {}
        }

        debug!(path = %path.display(), "compile cache entry is stale");
        state.entries.remove(path);
        None
    }

    pub fn put(&self, path: &Path, modified: SystemTime, result: Arc<CompilationResult>) {
        let mut state = self.lock();
        let now = state.tick();
        state.entries.insert(
            path.to_path_buf(),
            CacheEntry {
                modified,
                result,
                last_used: now,
            },
        );

        while state.entries.len() > self.capacity {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    debug!(path = %key.display(), "evicting compile cache entry");
                    state.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    pub fn invalidate(&self, path: &Path) -> bool {
        self.lock().entries.remove(path).is_some()
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
