//! Sharded per-key async locks.
//!
//! Work on the same document id is serialized while distinct ids proceed
//! in parallel (modulo shard collisions). Keys hash onto a fixed array of
//! `tokio::sync::Mutex<()>`, so memory stays bounded no matter how many
//! ids pass through.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tokio::sync::{Mutex, MutexGuard};

const DEFAULT_SHARDS: usize = 64;

pub struct KeyedLocks {
    shards: Vec<Mutex<()>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    pub fn with_shards(count: usize) -> Self {
        let count = count.max(1);
        Self {
            shards: (0..count).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Wait for the shard guarding `key`.
    pub async fn lock(&self, key: &str) -> MutexGuard<'_, ()> {
        self.shards[self.shard(key)].lock().await
    }

    fn shard(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }
}

impl Default for KeyedLocks {
    fn default() -> Self {
        Self::new()
    }
}
