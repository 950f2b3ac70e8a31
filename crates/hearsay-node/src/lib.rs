// crates/hearsay-node/src/lib.rs
//
// hearsay-node: the node facade of the Hearsay network.
//
// Wires the stores, the network layer and the trust engine together and
// exposes the operations a request layer maps onto: posting rumors, casting
// votes, reading the scored feed, lookups with DHT fallback, and onboarding.

pub mod node;
pub mod rate_limit;

pub use node::{Node, NodeStores};
pub use rate_limit::VoteRateLimiter;
