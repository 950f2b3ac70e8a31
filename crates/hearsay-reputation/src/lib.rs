// crates/hearsay-reputation/src/lib.rs
//
// hearsay-reputation: Trust and consensus engine for the Hearsay network.
//
// Turns raw vote data into a per-user reputation distribution (EigenTrust
// power iteration over pairwise vote agreement) and into per-rumor trust
// scores with exponential recency decay.

pub mod decay;
pub mod engine;
pub mod scoring;
pub mod trust_matrix;

pub use decay::RecencyDecay;
pub use engine::{ConsensusTick, TrustConfig, TrustEngine, TrustReport};
pub use scoring::{FeedItem, TrustState};
pub use trust_matrix::{AgreementCounts, TrustMatrix};
