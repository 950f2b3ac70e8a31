// crates/hearsay-p2p/src/config.rs
//
// Network tunables. Loaded as the `[network]` table of the daemon config.

use serde::{Deserialize, Serialize};

/// An inclusive range of local ports to probe for sibling nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

/// Network layer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Address the TCP listener binds to. Default: "127.0.0.1:7400".
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// URL other nodes should dial to reach this one, e.g. "tcp://host:7400".
    /// When unset, derived from the bound listener address.
    #[serde(default)]
    pub advertise_url: Option<String>,

    /// Peers dialed once, in order, at startup.
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,

    /// Host probed with `probe_ports`. Default: "127.0.0.1".
    #[serde(default = "default_probe_host")]
    pub probe_host: String,

    /// Local port range probed at startup. Disabled when unset.
    #[serde(default)]
    pub probe_ports: Option<PortRange>,

    /// Peers sampled per gossip hop. Default: 5.
    #[serde(default = "default_gossip_fanout")]
    pub gossip_fanout: usize,

    /// Hop budget of a freshly originated gossip message. Default: 6.
    #[serde(default = "default_gossip_ttl")]
    pub gossip_ttl: u32,

    /// Closest live peers a DHT put is pushed to. Default: 8.
    #[serde(default = "default_replication_factor")]
    pub replication_factor: usize,

    /// Closest live peers queried by a DHT get. Default: 5.
    #[serde(default = "default_dht_query_fanout")]
    pub dht_query_fanout: usize,

    /// DHT get timeout in milliseconds. Default: 1000.
    #[serde(default = "default_dht_timeout_ms")]
    pub dht_timeout_ms: u64,

    /// Peers not seen for this long are pruned. Default: 1800 (30 min).
    #[serde(default = "default_peer_max_age_secs")]
    pub peer_max_age_secs: u64,

    /// Lifetime of a gossip message id in the dedup cache. Default: 600.
    #[serde(default = "default_seen_ttl_secs")]
    pub seen_ttl_secs: u64,

    /// Maximum peers shared in a PEERS message. Default: 50.
    #[serde(default = "default_max_shared_peers")]
    pub max_shared_peers: usize,

    /// Maximum assertion nodes in a SYNC_RES snapshot. Default: 500.
    #[serde(default = "default_sync_snapshot_limit")]
    pub sync_snapshot_limit: usize,
}

fn default_listen_addr() -> String {
    "127.0.0.1:7400".to_string()
}

fn default_probe_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gossip_fanout() -> usize {
    5
}

fn default_gossip_ttl() -> u32 {
    6
}

fn default_replication_factor() -> usize {
    8
}

fn default_dht_query_fanout() -> usize {
    5
}

fn default_dht_timeout_ms() -> u64 {
    1000
}

fn default_peer_max_age_secs() -> u64 {
    30 * 60
}

fn default_seen_ttl_secs() -> u64 {
    10 * 60
}

fn default_max_shared_peers() -> usize {
    50
}

fn default_sync_snapshot_limit() -> usize {
    500
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            advertise_url: None,
            bootstrap_peers: Vec::new(),
            probe_host: default_probe_host(),
            probe_ports: None,
            gossip_fanout: default_gossip_fanout(),
            gossip_ttl: default_gossip_ttl(),
            replication_factor: default_replication_factor(),
            dht_query_fanout: default_dht_query_fanout(),
            dht_timeout_ms: default_dht_timeout_ms(),
            peer_max_age_secs: default_peer_max_age_secs(),
            seen_ttl_secs: default_seen_ttl_secs(),
            max_shared_peers: default_max_shared_peers(),
            sync_snapshot_limit: default_sync_snapshot_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_uses_defaults() {
        let config: NetworkConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.gossip_fanout, 5);
        assert_eq!(config.gossip_ttl, 6);
        assert_eq!(config.replication_factor, 8);
        assert_eq!(config.dht_timeout_ms, 1000);
        assert_eq!(config.peer_max_age_secs, 1800);
        assert!(config.probe_ports.is_none());
    }
}
