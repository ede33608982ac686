//! Snapshot cache for the rule store.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use qagate_core::RuleSnapshot;

struct Cached {
    snapshot: Arc<RuleSnapshot>,
    expires_at: Instant,
}

struct Slot {
    cached: Option<Cached>,
    generation: u64,
}

/// Holds at most one snapshot, valid for a fixed TTL.
///
/// Every [`clear`](Self::clear) bumps a generation counter. A snapshot read
/// from the backend is only stored when no clear happened since the read
/// started, so a write racing a slow read never leaves the older rule set
/// cached.
pub struct SnapshotCache {
    slot: RwLock<Slot>,
    ttl: Duration,
}

impl SnapshotCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            slot: RwLock::new(Slot {
                cached: None,
                generation: 0,
            }),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    /// The cached snapshot, if present and not expired.
    pub fn get(&self) -> Option<Arc<RuleSnapshot>> {
        let slot = self.slot.read().unwrap_or_else(|p| p.into_inner());
        slot.cached
            .as_ref()
            .filter(|c| c.expires_at > Instant::now())
            .map(|c| c.snapshot.clone())
    }

    /// Current generation; pass it back to [`set`](Self::set).
    pub fn generation(&self) -> u64 {
        self.slot.read().unwrap_or_else(|p| p.into_inner()).generation
    }

    /// Store `snapshot` unless the cache was cleared after `generation` was read.
    pub fn set(&self, generation: u64, snapshot: Arc<RuleSnapshot>) -> bool {
        let mut slot = self.slot.write().unwrap_or_else(|p| p.into_inner());
        if slot.generation != generation {
            return false;
        }
        slot.cached = Some(Cached {
            snapshot,
            expires_at: Instant::now() + self.ttl,
        });
        true
    }

    pub fn clear(&self) {
        let mut slot = self.slot.write().unwrap_or_else(|p| p.into_inner());
        slot.cached = None;
        slot.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_returns_snapshot() {
        let cache = SnapshotCache::new(60);
        assert!(cache.get().is_none());
        let gen = cache.generation();
        assert!(cache.set(gen, Arc::new(RuleSnapshot::empty())));
        assert!(cache.get().is_some());
    }

    #[test]
    fn clear_rejects_stale_store() {
        let cache = SnapshotCache::new(60);
        let gen = cache.generation();
        cache.clear();
        assert!(!cache.set(gen, Arc::new(RuleSnapshot::empty())));
        assert!(cache.get().is_none());
    }

    #[test]
    fn zero_ttl_never_hits() {
        let cache = SnapshotCache::new(0);
        let gen = cache.generation();
        cache.set(gen, Arc::new(RuleSnapshot::empty()));
        assert!(cache.get().is_none());
    }
}
