// crates/hearsay-p2p/src/peers.rs
//
// PeerRegistry: every peer this node has heard of, with its advertised URL,
// capabilities and last-seen time. Holds no connections; liveness is tracked
// by the network layer and cross-referenced by peer id.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use hearsay_core::time;

/// Last known state of a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerRecord {
    pub peer_id: String,
    pub url: Option<String>,
    pub capabilities: BTreeSet<String>,
    /// Epoch milliseconds of the last verified message or mention.
    pub last_seen: i64,
}

#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: HashMap<String, PeerRecord>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or refresh a peer.
    ///
    /// A known URL is never replaced by `None`; capabilities are replaced only
    /// when given.
    pub fn upsert(
        &mut self,
        peer_id: &str,
        url: Option<String>,
        capabilities: Option<BTreeSet<String>>,
    ) {
        self.upsert_at(peer_id, url, capabilities, time::now_millis());
    }

    pub fn upsert_at(
        &mut self,
        peer_id: &str,
        url: Option<String>,
        capabilities: Option<BTreeSet<String>>,
        now_ms: i64,
    ) {
        let record = self
            .peers
            .entry(peer_id.to_string())
            .or_insert_with(|| PeerRecord {
                peer_id: peer_id.to_string(),
                url: None,
                capabilities: BTreeSet::new(),
                last_seen: now_ms,
            });
        if url.is_some() {
            record.url = url;
        }
        if let Some(capabilities) = capabilities {
            record.capabilities = capabilities;
        }
        record.last_seen = record.last_seen.max(now_ms);
    }

    pub fn get(&self, peer_id: &str) -> Option<&PeerRecord> {
        self.peers.get(peer_id)
    }

    /// All peers, most recently seen first.
    pub fn list(&self) -> Vec<PeerRecord> {
        let mut peers: Vec<PeerRecord> = self.peers.values().cloned().collect();
        peers.sort_by(|a, b| {
            b.last_seen
                .cmp(&a.last_seen)
                .then_with(|| a.peer_id.cmp(&b.peer_id))
        });
        peers
    }

    /// Remove peers not seen within `max_age_ms`. Returns the number removed.
    pub fn prune(&mut self, max_age_ms: i64) -> usize {
        self.prune_at(time::now_millis(), max_age_ms)
    }

    pub fn prune_at(&mut self, now_ms: i64, max_age_ms: i64) -> usize {
        let cutoff = now_ms - max_age_ms;
        let before = self.peers.len();
        self.peers.retain(|_, peer| peer.last_seen >= cutoff);
        let removed = before - self.peers.len();
        if removed > 0 {
            tracing::debug!("Pruned {} stale peers", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
