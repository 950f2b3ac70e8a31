// crates/hearsay-core/src/traits.rs
//
// Collaborator contracts consumed by the network layer and the trust engine.
// Implemented by hearsay-store (in-memory and RocksDB backends).

use std::collections::HashMap;

use async_trait::async_trait;

use crate::assertion::{AssertionKind, AssertionNode};
use crate::error::HearsayError;
use crate::user::{ManaBalance, User};

/// Append-only store of rumor and vote nodes.
#[async_trait]
pub trait AssertionStore: Send + Sync {
    /// Store a node. Write-once: if the id already exists the stored node is
    /// returned unchanged.
    async fn create(&self, node: AssertionNode) -> Result<AssertionNode, HearsayError>;

    /// Retrieve a node by id.
    async fn get(&self, id: &str) -> Result<Option<AssertionNode>, HearsayError>;

    /// Every node held locally.
    async fn list_all(&self) -> Result<Vec<AssertionNode>, HearsayError>;

    /// Every node of the given kind.
    async fn list_by_kind(&self, kind: AssertionKind) -> Result<Vec<AssertionNode>, HearsayError>;

    /// Votes whose parent is `id`.
    async fn list_votes_for_parent(&self, id: &str) -> Result<Vec<AssertionNode>, HearsayError>;
}

/// Key-indexed user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<User>, HearsayError>;

    async fn list_all(&self) -> Result<Vec<User>, HearsayError>;

    /// Replace the reputation of every listed user. Unknown ids are ignored.
    async fn set_reputations(&self, reputations: &HashMap<String, f64>) -> Result<(), HearsayError>;

    /// Upsert a user record received from the network.
    async fn import(&self, user: User) -> Result<(), HearsayError>;
}

/// Mana bookkeeping.
#[async_trait]
pub trait ManaLedger: Send + Sync {
    /// Regenerate, then deduct `amount` if the balance covers it.
    /// Returns `false` (and changes nothing) for unknown users or short balances.
    async fn consume(&self, id: &str, amount: i64) -> Result<bool, HearsayError>;

    /// Return previously consumed mana (capped). Unknown users are ignored.
    async fn refund(&self, id: &str, amount: i64) -> Result<(), HearsayError>;

    /// Regenerated balance, or `None` for unknown users.
    async fn balance(&self, id: &str) -> Result<Option<ManaBalance>, HearsayError>;
}

/// One-time onboarding: email registration issues a token, the token is
/// exchanged for a user record exactly once.
#[async_trait]
pub trait IdentityRegistry: Send + Sync {
    async fn register_email(&self, email: &str) -> Result<String, HearsayError>;

    async fn onboard(&self, public_key: &str, token: &str) -> Result<User, HearsayError>;
}
