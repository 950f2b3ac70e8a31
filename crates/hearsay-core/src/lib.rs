// crates/hearsay-core/src/lib.rs
//
// hearsay-core: Core types, traits, and crypto primitives for the Hearsay
// attestation network.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines the assertion graph records (rumors and votes), user records,
// the node identity, the error taxonomy, and the collaborator traits the
// network and trust engine are written against.

pub mod assertion;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod time;
pub mod traits;
pub mod user;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use hearsay_core::AssertionNode;`

// Assertion graph types
pub use assertion::{AssertionKind, AssertionNode, VoteValue, MAX_RUMOR_CHARS};

// User types
pub use user::{ManaBalance, User};

// Identity types
pub use identity::{LocalIdentity, NodeIdentity};

// Error type
pub use error::HearsayError;

// Traits
pub use traits::{AssertionStore, IdentityRegistry, ManaLedger, UserStore};
