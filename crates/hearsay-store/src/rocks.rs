// crates/hearsay-store/src/rocks.rs
//
// RocksDB-backed persistent storage for assertions, users and onboarding.
//
// Key format:
//   - Primary:   `node:{id}`               -> JSON-serialized AssertionNode
//   - Secondary: `kind:{KIND}:{id}`        -> empty value (index only)
//   - Secondary: `parent:{parent}:{id}`    -> empty value (votes only)
//   - Users:     `user:{id}`               -> JSON-serialized User
//   - Tokens:    `token:{token}`           -> issue time (epoch ms, decimal)
//   - Emails:    `email:{sha256}`          -> empty value
//
// The secondary indexes allow listing rumors and the votes of a rumor
// without scanning the entire keyspace.

use std::collections::HashMap;

use async_trait::async_trait;
use rocksdb::{DBWithThreadMode, MultiThreaded, Options, WriteBatch};
use tokio::sync::Mutex;

use hearsay_core::traits::{AssertionStore, IdentityRegistry, ManaLedger, UserStore};
use hearsay_core::{time, AssertionKind, AssertionNode, HearsayError, ManaBalance, User};

use crate::onboarding;

/// RocksDB wrapper implementing every store trait.
#[derive(Debug)]
pub struct RocksStore {
    db: DBWithThreadMode<MultiThreaded>,
    /// Serializes read-modify-write sequences (mana, onboarding, create).
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open a RocksDB database at the given filesystem path.
    ///
    /// Creates the database directory if it does not exist.
    pub fn open(path: &str) -> Result<Self, HearsayError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DBWithThreadMode::<MultiThreaded>::open(&opts, path).map_err(|e| {
            HearsayError::Storage(format!("Failed to open RocksDB at {}: {}", path, e))
        })?;

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn node_key(id: &str) -> Vec<u8> {
        format!("node:{}", id).into_bytes()
    }

    fn kind_key(kind: AssertionKind, id: &str) -> Vec<u8> {
        format!("kind:{}:{}", kind.as_str(), id).into_bytes()
    }

    fn parent_key(parent: &str, id: &str) -> Vec<u8> {
        format!("parent:{}:{}", parent, id).into_bytes()
    }

    fn user_key(id: &str) -> Vec<u8> {
        format!("user:{}", id).into_bytes()
    }

    fn token_key(token: &str) -> Vec<u8> {
        format!("token:{}", token).into_bytes()
    }

    fn email_key(hash: &str) -> Vec<u8> {
        format!("email:{}", hash).into_bytes()
    }

    /// Put raw bytes into RocksDB, mapping errors to HearsayError::Storage.
    fn put_raw(&self, key: &[u8], value: &[u8]) -> Result<(), HearsayError> {
        self.db
            .put(key, value)
            .map_err(|e| HearsayError::Storage(format!("RocksDB put failed: {}", e)))
    }

    /// Get raw bytes from RocksDB, mapping errors to HearsayError::Storage.
    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, HearsayError> {
        self.db
            .get(key)
            .map_err(|e| HearsayError::Storage(format!("RocksDB get failed: {}", e)))
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), HearsayError> {
        self.db
            .write(batch)
            .map_err(|e| HearsayError::Storage(format!("RocksDB batch write failed: {}", e)))
    }

    /// Collect the key suffixes (after `prefix`) of every key under `prefix`.
    fn suffixes_under(&self, prefix: &str) -> Result<Vec<String>, HearsayError> {
        let prefix = prefix.as_bytes();
        let mut suffixes = Vec::new();

        for item in self.db.prefix_iterator(prefix) {
            let (key, _value) = item
                .map_err(|e| HearsayError::Storage(format!("RocksDB iteration error: {}", e)))?;

            // Stop when the prefix no longer matches.
            if !key.starts_with(prefix) {
                break;
            }
            if let Ok(suffix) = std::str::from_utf8(&key[prefix.len()..]) {
                suffixes.push(suffix.to_string());
            }
        }

        Ok(suffixes)
    }

    fn get_node_sync(&self, id: &str) -> Result<Option<AssertionNode>, HearsayError> {
        match self.get_raw(&Self::node_key(id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn nodes_for_ids(&self, ids: Vec<String>) -> Result<Vec<AssertionNode>, HearsayError> {
        let mut nodes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(node) = self.get_node_sync(&id)? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    fn get_user_sync(&self, id: &str) -> Result<Option<User>, HearsayError> {
        match self.get_raw(&Self::user_key(id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_user_sync(&self, user: &User) -> Result<(), HearsayError> {
        let json = serde_json::to_vec(user)?;
        self.put_raw(&Self::user_key(&user.id), &json)
    }
}

#[async_trait]
impl AssertionStore for RocksStore {
    async fn create(&self, node: AssertionNode) -> Result<AssertionNode, HearsayError> {
        let _guard = self.write_lock.lock().await;
        if let Some(existing) = self.get_node_sync(&node.id)? {
            return Ok(existing);
        }

        let mut batch = WriteBatch::default();
        batch.put(Self::node_key(&node.id), serde_json::to_vec(&node)?);
        batch.put(Self::kind_key(node.kind, &node.id), b"");
        if node.is_vote() {
            if let Some(parent) = &node.parent_id {
                batch.put(Self::parent_key(parent, &node.id), b"");
            }
        }
        self.write_batch(batch)?;
        Ok(node)
    }

    async fn get(&self, id: &str) -> Result<Option<AssertionNode>, HearsayError> {
        self.get_node_sync(id)
    }

    async fn list_all(&self) -> Result<Vec<AssertionNode>, HearsayError> {
        let ids = self.suffixes_under("node:")?;
        self.nodes_for_ids(ids)
    }

    async fn list_by_kind(&self, kind: AssertionKind) -> Result<Vec<AssertionNode>, HearsayError> {
        let ids = self.suffixes_under(&format!("kind:{}:", kind.as_str()))?;
        self.nodes_for_ids(ids)
    }

    async fn list_votes_for_parent(&self, id: &str) -> Result<Vec<AssertionNode>, HearsayError> {
        let ids = self.suffixes_under(&format!("parent:{}:", id))?;
        self.nodes_for_ids(ids)
    }
}

#[async_trait]
impl UserStore for RocksStore {
    async fn get(&self, id: &str) -> Result<Option<User>, HearsayError> {
        self.get_user_sync(id)
    }

    async fn list_all(&self) -> Result<Vec<User>, HearsayError> {
        let mut users = Vec::new();
        for id in self.suffixes_under("user:")? {
            if let Some(user) = self.get_user_sync(&id)? {
                users.push(user);
            }
        }
        Ok(users)
    }

    async fn set_reputations(&self, reputations: &HashMap<String, f64>) -> Result<(), HearsayError> {
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        for (id, reputation) in reputations {
            if let Some(mut user) = self.get_user_sync(id)? {
                user.reputation = *reputation;
                batch.put(Self::user_key(id), serde_json::to_vec(&user)?);
            }
        }
        self.write_batch(batch)
    }

    async fn import(&self, user: User) -> Result<(), HearsayError> {
        let _guard = self.write_lock.lock().await;
        self.put_user_sync(&user)
    }
}

#[async_trait]
impl ManaLedger for RocksStore {
    async fn consume(&self, id: &str, amount: i64) -> Result<bool, HearsayError> {
        let _guard = self.write_lock.lock().await;
        let Some(mut user) = self.get_user_sync(id)? else {
            return Ok(false);
        };
        user.regenerate_mana(time::now_millis());
        if user.mana < amount {
            return Ok(false);
        }
        user.mana -= amount;
        self.put_user_sync(&user)?;
        Ok(true)
    }

    async fn refund(&self, id: &str, amount: i64) -> Result<(), HearsayError> {
        let _guard = self.write_lock.lock().await;
        let Some(mut user) = self.get_user_sync(id)? else {
            return Ok(());
        };
        user.credit_mana(amount);
        self.put_user_sync(&user)
    }

    async fn balance(&self, id: &str) -> Result<Option<ManaBalance>, HearsayError> {
        let _guard = self.write_lock.lock().await;
        let Some(mut user) = self.get_user_sync(id)? else {
            return Ok(None);
        };
        user.regenerate_mana(time::now_millis());
        self.put_user_sync(&user)?;
        Ok(Some(user.balance()))
    }
}

#[async_trait]
impl IdentityRegistry for RocksStore {
    async fn register_email(&self, email: &str) -> Result<String, HearsayError> {
        onboarding::validate_email(email)?;
        let hash = onboarding::email_hash(email);

        let _guard = self.write_lock.lock().await;
        if self.get_raw(&Self::email_key(&hash))?.is_some() {
            return Err(HearsayError::Onboarding(
                "This email has already been registered".to_string(),
            ));
        }

        let token = onboarding::new_token();
        let mut batch = WriteBatch::default();
        batch.put(Self::email_key(&hash), b"");
        batch.put(
            Self::token_key(&token),
            time::now_millis().to_string().as_bytes(),
        );
        self.write_batch(batch)?;
        Ok(token)
    }

    async fn onboard(&self, public_key: &str, token: &str) -> Result<User, HearsayError> {
        onboarding::validate_onboarding(public_key, token)?;

        let _guard = self.write_lock.lock().await;
        if self.get_raw(&Self::token_key(token))?.is_none() {
            return Err(HearsayError::Onboarding(
                "Invalid or already used token".to_string(),
            ));
        }

        let user = User::onboarded(public_key, time::now_millis());
        let stored = match self.get_user_sync(&user.id)? {
            Some(existing) => existing,
            None => user,
        };

        let mut batch = WriteBatch::default();
        batch.delete(Self::token_key(token));
        batch.put(Self::user_key(&stored.id), serde_json::to_vec(&stored)?);
        self.write_batch(batch)?;
        Ok(stored)
    }
}
