// crates/hearsay-store/src/memory.rs
//
// In-memory implementation of every store trait. Same semantics as the
// RocksDB backend; state is lost when the process exits.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use hearsay_core::traits::{AssertionStore, IdentityRegistry, ManaLedger, UserStore};
use hearsay_core::{time, AssertionKind, AssertionNode, HearsayError, ManaBalance, User};

use crate::onboarding;

#[derive(Debug, Default)]
struct Inner {
    nodes: HashMap<String, AssertionNode>,
    users: HashMap<String, User>,
    pending_tokens: HashSet<String>,
    used_emails: HashSet<String>,
}

/// Volatile store for assertions, users, mana, and onboarding tokens.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssertionStore for MemoryStore {
    async fn create(&self, node: AssertionNode) -> Result<AssertionNode, HearsayError> {
        let mut inner = self.inner.write().await;
        let stored = inner.nodes.entry(node.id.clone()).or_insert(node);
        Ok(stored.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<AssertionNode>, HearsayError> {
        Ok(self.inner.read().await.nodes.get(id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<AssertionNode>, HearsayError> {
        Ok(self.inner.read().await.nodes.values().cloned().collect())
    }

    async fn list_by_kind(&self, kind: AssertionKind) -> Result<Vec<AssertionNode>, HearsayError> {
        let inner = self.inner.read().await;
        Ok(inner
            .nodes
            .values()
            .filter(|n| n.kind == kind)
            .cloned()
            .collect())
    }

    async fn list_votes_for_parent(&self, id: &str) -> Result<Vec<AssertionNode>, HearsayError> {
        let inner = self.inner.read().await;
        Ok(inner
            .nodes
            .values()
            .filter(|n| n.is_vote() && n.parent_id.as_deref() == Some(id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<User>, HearsayError> {
        Ok(self.inner.read().await.users.get(id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<User>, HearsayError> {
        let inner = self.inner.read().await;
        let mut users: Vec<User> = inner.users.values().cloned().collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    async fn set_reputations(&self, reputations: &HashMap<String, f64>) -> Result<(), HearsayError> {
        let mut inner = self.inner.write().await;
        for (id, reputation) in reputations {
            if let Some(user) = inner.users.get_mut(id) {
                user.reputation = *reputation;
            }
        }
        Ok(())
    }

    async fn import(&self, user: User) -> Result<(), HearsayError> {
        self.inner.write().await.users.insert(user.id.clone(), user);
        Ok(())
    }
}

#[async_trait]
impl ManaLedger for MemoryStore {
    async fn consume(&self, id: &str, amount: i64) -> Result<bool, HearsayError> {
        let mut inner = self.inner.write().await;
        let Some(user) = inner.users.get_mut(id) else {
            return Ok(false);
        };
        user.regenerate_mana(time::now_millis());
        if user.mana < amount {
            return Ok(false);
        }
        user.mana -= amount;
        Ok(true)
    }

    async fn refund(&self, id: &str, amount: i64) -> Result<(), HearsayError> {
        if let Some(user) = self.inner.write().await.users.get_mut(id) {
            user.credit_mana(amount);
        }
        Ok(())
    }

    async fn balance(&self, id: &str) -> Result<Option<ManaBalance>, HearsayError> {
        let mut inner = self.inner.write().await;
        Ok(inner.users.get_mut(id).map(|user| {
            user.regenerate_mana(time::now_millis());
            user.balance()
        }))
    }
}

#[async_trait]
impl IdentityRegistry for MemoryStore {
    async fn register_email(&self, email: &str) -> Result<String, HearsayError> {
        onboarding::validate_email(email)?;
        let hash = onboarding::email_hash(email);

        let mut inner = self.inner.write().await;
        if !inner.used_emails.insert(hash) {
            return Err(HearsayError::Onboarding(
                "This email has already been registered".to_string(),
            ));
        }
        let token = onboarding::new_token();
        inner.pending_tokens.insert(token.clone());
        Ok(token)
    }

    async fn onboard(&self, public_key: &str, token: &str) -> Result<User, HearsayError> {
        onboarding::validate_onboarding(public_key, token)?;

        let mut inner = self.inner.write().await;
        if !inner.pending_tokens.remove(token) {
            return Err(HearsayError::Onboarding(
                "Invalid or already used token".to_string(),
            ));
        }
        let user = User::onboarded(public_key, time::now_millis());
        let stored = inner.users.entry(user.id.clone()).or_insert(user);
        Ok(stored.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_is_write_once() {
        let store = MemoryStore::new();
        let rumor = AssertionNode::rumor("alice", "first", None).unwrap();
        let mut altered = rumor.clone();
        altered.text = Some("rewritten".to_string());

        store.create(rumor.clone()).await.unwrap();
        let returned = store.create(altered).await.unwrap();
        assert_eq!(returned.text.as_deref(), Some("first"));
        assert_eq!(AssertionStore::list_all(&store).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn votes_are_listed_by_parent() {
        let store = MemoryStore::new();
        let rumor = store
            .create(AssertionNode::rumor("alice", "claim", None).unwrap())
            .await
            .unwrap();
        store
            .create(AssertionNode::vote(&rumor.id, "bob", 1, None).unwrap())
            .await
            .unwrap();
        store
            .create(AssertionNode::vote("other", "bob", 1, None).unwrap())
            .await
            .unwrap();

        assert_eq!(store.list_votes_for_parent(&rumor.id).await.unwrap().len(), 1);
        assert_eq!(store.list_by_kind(AssertionKind::Vote).await.unwrap().len(), 2);
        assert_eq!(store.list_by_kind(AssertionKind::Rumor).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn onboarding_consumes_token_once() {
        let store = MemoryStore::new();
        let token = store.register_email("a@example.com").await.unwrap();

        let user = store.onboard("pk-a", &token).await.unwrap();
        assert_eq!(user.mana, 100);

        assert!(matches!(
            store.onboard("pk-b", &token).await,
            Err(HearsayError::Onboarding(_))
        ));
        assert!(UserStore::get(&store, &User::id_for_public_key("pk-b"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn mismatched_token_creates_no_user() {
        let store = MemoryStore::new();
        store.register_email("a@example.com").await.unwrap();

        assert!(store.onboard("pk-a", "not-a-token").await.is_err());
        assert!(UserStore::list_all(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn email_registers_once() {
        let store = MemoryStore::new();
        store.register_email("a@example.com").await.unwrap();
        assert!(store.register_email("A@EXAMPLE.COM").await.is_err());
    }

    #[tokio::test]
    async fn consume_refuses_short_balance() {
        let store = MemoryStore::new();
        let token = store.register_email("a@example.com").await.unwrap();
        let user = store.onboard("pk-a", &token).await.unwrap();

        assert!(store.consume(&user.id, 50).await.unwrap());
        assert!(store.consume(&user.id, 50).await.unwrap());
        assert!(!store.consume(&user.id, 5).await.unwrap());
        assert_eq!(store.balance(&user.id).await.unwrap().unwrap().mana, 0);
        assert!(!store.consume("nobody", 1).await.unwrap());

        store.refund(&user.id, 5).await.unwrap();
        assert_eq!(store.balance(&user.id).await.unwrap().unwrap().mana, 5);
        store.refund("nobody", 5).await.unwrap();
    }

    #[tokio::test]
    async fn set_reputations_replaces_known_users_only() {
        let store = MemoryStore::new();
        store.import(User::onboarded("pk-a", 0)).await.unwrap();
        let id = User::id_for_public_key("pk-a");

        let mut reps = HashMap::new();
        reps.insert(id.clone(), 0.75);
        reps.insert("ghost".to_string(), 0.25);
        store.set_reputations(&reps).await.unwrap();

        let users = UserStore::list_all(&store).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].reputation, 0.75);
    }
}
