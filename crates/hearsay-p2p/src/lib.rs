// crates/hearsay-p2p/src/lib.rs
//
// hearsay-p2p: networking layer for the Hearsay network.
//
// Provides the signed envelope format, the fixed message set, peer discovery
// and liveness, flood gossip with TTL and dedup, and a push-replicated DHT
// routed by XOR distance. Transport is newline-delimited JSON over TCP.

pub mod config;
pub mod envelope;
pub mod message;
pub mod network;
pub mod peers;
pub mod routing;
pub mod seen;

pub use config::{NetworkConfig, PortRange};
pub use envelope::Envelope;
pub use message::Message;
pub use network::{Network, NetworkStatus};
pub use peers::{PeerRecord, PeerRegistry};
pub use seen::SeenCache;
