//! Interception counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentStats {
    /// Responses returned straight from the network.
    pub network: u64,
    pub stored: u64,
    pub store_failures: u64,
    /// Network failures answered from the bucket.
    pub cache_hits: u64,
    /// Network failures answered with the synthesized 503.
    pub offline: u64,
    pub pass_through: u64,
    pub buckets_deleted: u64,
    pub delete_failures: u64,
}

#[derive(Default)]
pub(crate) struct AtomicStats {
    pub network: AtomicU64,
    pub stored: AtomicU64,
    pub store_failures: AtomicU64,
    pub cache_hits: AtomicU64,
    pub offline: AtomicU64,
    pub pass_through: AtomicU64,
    pub buckets_deleted: AtomicU64,
    pub delete_failures: AtomicU64,
}

impl AtomicStats {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn to_stats(&self) -> AgentStats {
        AgentStats {
            network: self.network.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            offline: self.offline.load(Ordering::Relaxed),
            pass_through: self.pass_through.load(Ordering::Relaxed),
            buckets_deleted: self.buckets_deleted.load(Ordering::Relaxed),
            delete_failures: self.delete_failures.load(Ordering::Relaxed),
        }
    }
}
