// crates/hearsay-store/src/dht.rs
//
// Local half of the DHT: a last-write-wins key/value map. Routing and
// replication live in hearsay-p2p; this map only remembers what it was told.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use hearsay_core::time;

/// A stored DHT value and the local time it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DhtEntry {
    pub value: Value,
    /// Epoch milliseconds of the local write.
    pub stored_at: i64,
}

/// Local DHT key/value map. No versioning: the latest local write wins.
#[derive(Debug, Default)]
pub struct DhtStore {
    entries: HashMap<String, DhtEntry>,
}

impl DhtStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn put_local(&mut self, key: &str, value: Value) {
        self.entries.insert(
            key.to_string(),
            DhtEntry {
                value,
                stored_at: time::now_millis(),
            },
        );
    }

    /// Local value for `key`. A stored JSON `null` reads as absent.
    pub fn get_local(&self, key: &str) -> Option<&Value> {
        self.entries
            .get(key)
            .map(|entry| &entry.value)
            .filter(|value| !value.is_null())
    }

    pub fn entry(&self, key: &str) -> Option<&DhtEntry> {
        self.entries.get(key)
    }

    /// All locally held keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
