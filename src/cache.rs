//! LRU cache of compiled transforms

use crate::transform::Transform;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

type Entries = lru::LruCache<String, Arc<dyn Transform>>;

/// LRU cache keyed by transform file name
pub struct TransformCache {
    transforms: Mutex<Entries>,
}

impl TransformCache {
    /// Create a new cache with the given capacity (at least one entry)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            transforms: Mutex::new(lru::LruCache::new(capacity)),
        }
    }

    /// Get a compiled transform from cache
    pub fn get(&self, file_name: &str) -> Option<Arc<dyn Transform>> {
        self.entries().get(file_name).cloned()
    }

    /// Put a compiled transform in cache
    pub fn put(&self, file_name: &str, transform: Arc<dyn Transform>) {
        self.entries().put(file_name.to_string(), transform);
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.transforms.lock().unwrap_or_else(|e| e.into_inner())
    }
}
