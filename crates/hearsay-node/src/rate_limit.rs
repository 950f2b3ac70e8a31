// crates/hearsay-node/src/rate_limit.rs
//
// Sliding-window limit on votes per (voter, rumor, direction).

use std::collections::HashMap;

use hearsay_core::VoteValue;

/// Votes allowed per key within one window.
pub const MAX_VOTES_PER_WINDOW: usize = 3;

/// Window length in milliseconds.
pub const WINDOW_MS: i64 = 60_000;

type Key = (String, String, &'static str);

#[derive(Debug)]
pub struct VoteRateLimiter {
    max: usize,
    window_ms: i64,
    hits: HashMap<Key, Vec<i64>>,
}

impl Default for VoteRateLimiter {
    fn default() -> Self {
        Self::new(MAX_VOTES_PER_WINDOW, WINDOW_MS)
    }
}

impl VoteRateLimiter {
    pub fn new(max: usize, window_ms: i64) -> Self {
        Self {
            max,
            window_ms,
            hits: HashMap::new(),
        }
    }

    fn key(voter_id: &str, rumor_id: &str, vote: VoteValue) -> Key {
        (voter_id.to_string(), rumor_id.to_string(), vote.direction())
    }

    /// Whether one more vote fits in the window ending at `now_ms`.
    pub fn allows(&self, voter_id: &str, rumor_id: &str, vote: VoteValue, now_ms: i64) -> bool {
        let cutoff = now_ms - self.window_ms;
        let recent = self
            .hits
            .get(&Self::key(voter_id, rumor_id, vote))
            .map(|hits| hits.iter().filter(|&&t| t > cutoff).count())
            .unwrap_or(0);
        recent < self.max
    }

    pub fn record(&mut self, voter_id: &str, rumor_id: &str, vote: VoteValue, now_ms: i64) {
        let cutoff = now_ms - self.window_ms;
        let hits = self
            .hits
            .entry(Self::key(voter_id, rumor_id, vote))
            .or_default();
        hits.retain(|&t| t > cutoff);
        hits.push(now_ms);
    }

    /// Drop expired hits and empty keys.
    pub fn prune(&mut self, now_ms: i64) {
        let cutoff = now_ms - self.window_ms;
        self.hits.retain(|_, hits| {
            hits.retain(|&t| t > cutoff);
            !hits.is_empty()
        });
    }

    pub fn tracked_keys(&self) -> usize {
        self.hits.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourth_vote_in_window_is_refused() {
        let mut limiter = VoteRateLimiter::default();
        for t in 0..3 {
            assert!(limiter.allows("v", "r", VoteValue::Up, t));
            limiter.record("v", "r", VoteValue::Up, t);
        }
        assert!(!limiter.allows("v", "r", VoteValue::Up, 10));
        // Other direction and other rumors are separate buckets.
        assert!(limiter.allows("v", "r", VoteValue::Down, 10));
        assert!(limiter.allows("v", "r2", VoteValue::Up, 10));
        // The window slides.
        assert!(limiter.allows("v", "r", VoteValue::Up, 60_001));
    }

    #[test]
    fn prune_drops_idle_keys() {
        let mut limiter = VoteRateLimiter::default();
        limiter.record("v", "r", VoteValue::Up, 0);
        limiter.record("v", "r2", VoteValue::Up, 50_000);
        limiter.prune(70_000);
        assert_eq!(limiter.tracked_keys(), 1);
    }
}
