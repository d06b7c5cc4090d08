use std::collections::HashMap;
use std::sync::Mutex;
use std::time::SystemTime;

use crate::transform::transform_model::{CacheEntry, CacheKey, TransformationMap};

/// Unbounded in-memory store of normalized transformation maps.
///
/// Entries never expire on their own; the owner clears the whole cache when
/// the context changes. Only fully normalized maps are ever stored. The lock
/// guards individual operations only; a get/compute/put sequence is not
/// atomic.
#[derive(Debug, Default)]
pub struct TransformationCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl TransformationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<TransformationMap> {
        self.lock().get(key).map(|entry| entry.map.clone())
    }

    pub fn put(&self, key: CacheKey, map: TransformationMap) {
        let entry = CacheEntry {
            key: key.clone(),
            map,
            created_at: SystemTime::now(),
        };
        self.lock().insert(key, entry);
    }

    pub fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.lock().get(key).cloned()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        // A poisoned map is still structurally valid; keep serving it.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
