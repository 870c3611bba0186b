//! Rendered schema documents, keyed by record identity and options.
//!
//! Each entry is stamped with the encoder registry version it was built
//! against; a lookup with a newer version misses.

use std::any::TypeId;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::builder::SchemaOptions;

const SHARDS: usize = 16;

/// Cache key: one record rendered one way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    type_id: TypeId,
    options: SchemaOptions,
}

impl CacheKey {
    pub fn new(type_id: TypeId, options: SchemaOptions) -> Self {
        Self { type_id, options }
    }
}

struct Entry {
    version: u64,
    document: Arc<Value>,
}

/// Sharded document cache.
pub struct SchemaCache {
    shards: [RwLock<HashMap<CacheKey, Entry>>; SHARDS],
}

impl SchemaCache {
    pub fn new() -> Self {
        Self {
            shards: std::array::from_fn(|_| RwLock::new(HashMap::new())),
        }
    }

    fn shard(&self, key: &CacheKey) -> &RwLock<HashMap<CacheKey, Entry>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARDS]
    }

    /// The document for `key` if it was built against `version`.
    pub fn get(&self, key: &CacheKey, version: u64) -> Option<Arc<Value>> {
        let shard = self.shard(key).read();
        let entry = shard.get(key)?;
        if entry.version == version {
            Some(Arc::clone(&entry.document))
        } else {
            tracing::debug!(
                cached = entry.version,
                current = version,
                "schema cache entry is stale"
            );
            None
        }
    }

    /// Store a document. An entry built against a newer version is kept.
    pub fn insert(&self, key: CacheKey, version: u64, document: Arc<Value>) {
        let mut shard = self.shard(&key).write();
        match shard.get(&key) {
            Some(existing) if existing.version > version => {}
            _ => {
                shard.insert(key, Entry { version, document });
            }
        }
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            shard.write().clear();
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use serde_json::json;

    struct Marker;

    #[test]
    fn version_mismatch_misses() {
        let cache = SchemaCache::new();
        let key = CacheKey::new(TypeId::of::<Marker>(), SchemaOptions::default());
        cache.insert(key, 1, Arc::new(json!({"type": "object"})));
        assert!(cache.get(&key, 1).is_some());
        assert!(cache.get(&key, 2).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn options_are_part_of_the_key() {
        let cache = SchemaCache::new();
        let id = TypeId::of::<Marker>();
        cache.insert(CacheKey::new(id, SchemaOptions::new(Dialect::Draft04)), 0, Arc::new(json!({})));
        assert!(cache
            .get(&CacheKey::new(id, SchemaOptions::new(Dialect::Draft06)), 0)
            .is_none());
    }

    #[test]
    fn newer_entry_survives_older_insert() {
        let cache = SchemaCache::new();
        let key = CacheKey::new(TypeId::of::<Marker>(), SchemaOptions::default());
        cache.insert(key, 3, Arc::new(json!({"v": 3})));
        cache.insert(key, 2, Arc::new(json!({"v": 2})));
        assert_eq!(*cache.get(&key, 3).unwrap(), json!({"v": 3}));
        cache.clear();
        assert!(cache.is_empty());
    }
}
