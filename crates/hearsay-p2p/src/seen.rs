// crates/hearsay-p2p/src/seen.rs
//
// Dedup cache of gossip message ids, pruned by age.

use std::collections::HashMap;

use hearsay_core::time;

#[derive(Debug)]
pub struct SeenCache {
    ttl_ms: i64,
    seen: HashMap<String, i64>,
}

impl SeenCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl_ms: (ttl_secs as i64).saturating_mul(1000),
            seen: HashMap::new(),
        }
    }

    /// Record `msg_id`. Returns false if it was already present.
    pub fn mark(&mut self, msg_id: &str) -> bool {
        self.mark_at(msg_id, time::now_millis())
    }

    pub fn mark_at(&mut self, msg_id: &str, now_ms: i64) -> bool {
        if self.seen.contains_key(msg_id) {
            return false;
        }
        self.seen.insert(msg_id.to_string(), now_ms);
        true
    }

    pub fn contains(&self, msg_id: &str) -> bool {
        self.seen.contains_key(msg_id)
    }

    /// Drop ids older than the ttl. Returns how many were removed.
    pub fn prune(&mut self) -> usize {
        self.prune_at(time::now_millis())
    }

    pub fn prune_at(&mut self, now_ms: i64) -> usize {
        let cutoff = now_ms - self.ttl_ms;
        let before = self.seen.len();
        self.seen.retain(|_, seen_at| *seen_at >= cutoff);
        before - self.seen.len()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_is_rejected() {
        let mut cache = SeenCache::new(600);
        assert!(cache.mark_at("m1", 0));
        assert!(!cache.mark_at("m1", 10));
        assert!(cache.mark_at("m2", 10));
    }

    #[test]
    fn prune_forgets_old_ids() {
        let mut cache = SeenCache::new(600);
        cache.mark_at("old", 0);
        cache.mark_at("new", 590_000);
        assert_eq!(cache.prune_at(600_001), 1);
        assert!(!cache.contains("old"));
        assert!(cache.contains("new"));
        assert!(cache.mark_at("old", 600_002));
    }
}
