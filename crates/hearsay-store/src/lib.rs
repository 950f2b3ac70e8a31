// crates/hearsay-store/src/lib.rs
//
// hearsay-store: Storage layer for the Hearsay network.
//
// Provides the RocksDB-backed store used by the daemon, an in-memory store
// with identical semantics for tests and ephemeral nodes, and the local
// key/value map backing the DHT.

pub mod dht;
pub mod memory;
pub mod onboarding;
pub mod rocks;

// Re-export key types for ergonomic access from downstream crates.
pub use dht::{DhtEntry, DhtStore};
pub use memory::MemoryStore;
pub use rocks::RocksStore;
