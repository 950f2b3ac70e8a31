// crates/hearsay-core/src/user.rs
//
// User records. Reputation is replaced wholesale by each trust recomputation;
// mana is a write budget that regenerates linearly with time.

use serde::{Deserialize, Serialize};

use crate::crypto;

/// Reputation assigned at onboarding, and the weight used for unknown voters.
pub const INITIAL_REPUTATION: f64 = 0.1;
/// Mana granted at onboarding.
pub const INITIAL_MANA: i64 = 100;
/// Mana ceiling.
pub const MAX_MANA: i64 = 100;
/// Mana regained per elapsed whole minute.
pub const MANA_REGEN_PER_MIN: i64 = 1;
/// Cost of posting a rumor.
pub const RUMOR_COST: i64 = 50;
/// Cost of casting a vote.
pub const VOTE_COST: i64 = 5;

/// A participant of the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// hex(sha256(public key)); never reused.
    pub id: String,
    #[serde(default)]
    pub public_key: Option<String>,
    /// Share of the global trust distribution, in [0, 1].
    pub reputation: f64,
    pub mana: i64,
    /// Epoch milliseconds of the last mana regeneration.
    pub last_mana_update: i64,
}

impl User {
    /// A freshly onboarded user for `public_key`.
    pub fn onboarded(public_key: &str, now_ms: i64) -> Self {
        Self {
            id: Self::id_for_public_key(public_key),
            public_key: Some(public_key.to_string()),
            reputation: INITIAL_REPUTATION,
            mana: INITIAL_MANA,
            last_mana_update: now_ms,
        }
    }

    pub fn id_for_public_key(public_key: &str) -> String {
        crypto::sha256_hex(public_key.as_bytes())
    }

    /// Apply linear regeneration up to `now_ms`.
    ///
    /// Only whole minutes count; the fractional remainder is kept by leaving
    /// `last_mana_update` untouched when less than a minute has passed.
    pub fn regenerate_mana(&mut self, now_ms: i64) {
        let elapsed_minutes = (now_ms - self.last_mana_update) / 60_000;
        if elapsed_minutes <= 0 {
            return;
        }
        let regen = elapsed_minutes * MANA_REGEN_PER_MIN;
        self.mana = (self.mana + regen).min(MAX_MANA);
        self.last_mana_update = now_ms;
    }

    /// Give back mana, never above the cap.
    pub fn credit_mana(&mut self, amount: i64) {
        self.mana = (self.mana + amount.max(0)).min(MAX_MANA);
    }

    pub fn balance(&self) -> ManaBalance {
        ManaBalance {
            id: self.id.clone(),
            mana: self.mana,
            last_mana_update: self.last_mana_update,
        }
    }

    /// DHT key under which this user is cached.
    pub fn dht_key(&self) -> String {
        dht_key(&self.id)
    }
}

/// DHT key for a user id: `user:<id>`.
pub fn dht_key(id: &str) -> String {
    format!("user:{}", id)
}

/// Result of a mana query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManaBalance {
    pub id: String,
    pub mana: i64,
    pub last_mana_update: i64,
}
