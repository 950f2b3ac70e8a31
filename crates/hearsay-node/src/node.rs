// crates/hearsay-node/src/node.rs
//
// Node: the single entry point for everything a request layer can ask of a
// running Hearsay node. Validation and resource errors surface here,
// synchronously and before any mutation; network failures never do.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;

use hearsay_core::traits::{AssertionStore, IdentityRegistry, ManaLedger, UserStore};
use hearsay_core::user::{RUMOR_COST, VOTE_COST};
use hearsay_core::{
    assertion, time, user, AssertionNode, HearsayError, LocalIdentity, ManaBalance, User,
};
use hearsay_p2p::{Network, NetworkConfig, NetworkStatus};
use hearsay_reputation::{ConsensusTick, FeedItem, TrustConfig, TrustEngine, TrustReport};

use crate::rate_limit::VoteRateLimiter;

/// The collaborators a node is built from.
#[derive(Clone)]
pub struct NodeStores {
    pub assertions: Arc<dyn AssertionStore>,
    pub users: Arc<dyn UserStore>,
    pub mana: Arc<dyn ManaLedger>,
    pub registry: Arc<dyn IdentityRegistry>,
}

impl NodeStores {
    /// Use one backend for every collaborator.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: AssertionStore + UserStore + ManaLedger + IdentityRegistry + 'static,
    {
        Self {
            assertions: store.clone(),
            users: store.clone(),
            mana: store.clone(),
            registry: store,
        }
    }
}

pub struct Node {
    stores: NodeStores,
    network: Arc<Network>,
    trust: TrustEngine,
    votes: Mutex<VoteRateLimiter>,
}

impl Node {
    pub fn new(
        identity: LocalIdentity,
        network_config: NetworkConfig,
        trust_config: TrustConfig,
        stores: NodeStores,
    ) -> Self {
        let network = Network::new(
            identity,
            network_config,
            stores.assertions.clone(),
            stores.users.clone(),
        );
        let trust = TrustEngine::new(stores.assertions.clone(), stores.users.clone(), trust_config);
        Self {
            stores,
            network,
            trust,
            votes: Mutex::new(VoteRateLimiter::default()),
        }
    }

    pub fn network(&self) -> &Arc<Network> {
        &self.network
    }

    pub fn node_id(&self) -> &str {
        self.network.node_id()
    }

    /// Start listening and kick off bootstrap dials.
    pub async fn start(&self) -> Result<SocketAddr, HearsayError> {
        let addr = self.network.listen().await?;
        self.network.bootstrap();
        Ok(addr)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Create a rumor, charge its author, and flood it.
    pub async fn post_rumor(
        &self,
        author_id: &str,
        text: &str,
        parent_id: Option<String>,
    ) -> Result<AssertionNode, HearsayError> {
        let rumor = AssertionNode::rumor(author_id, text, parent_id)?;
        self.require_user(author_id).await?;
        self.charge(author_id, RUMOR_COST, "post a rumor").await?;

        let stored = self.store_charged(author_id, RUMOR_COST, rumor).await?;
        tracing::info!("Rumor {} posted by {}", stored.id, author_id);
        self.flood_node(&stored).await;
        Ok(stored)
    }

    /// Cast a vote on an existing rumor.
    ///
    /// Every check (value, parent, voter, rate limit, mana) runs before the
    /// vote is stored or broadcast.
    pub async fn cast_vote(
        &self,
        voter_id: &str,
        rumor_id: &str,
        vote: i64,
        evidence: Option<String>,
    ) -> Result<AssertionNode, HearsayError> {
        let ballot = AssertionNode::vote(rumor_id, voter_id, vote, evidence)?;
        let Some(value) = ballot.vote else {
            return Err(HearsayError::Validation("Vote value is required".to_string()));
        };

        match self.stores.assertions.get(rumor_id).await? {
            Some(parent) if parent.is_rumor() => {}
            Some(_) => {
                return Err(HearsayError::Validation(format!(
                    "Parent {} is not a rumor",
                    rumor_id
                )))
            }
            None => {
                return Err(HearsayError::Validation(format!(
                    "Parent rumor {} not found",
                    rumor_id
                )))
            }
        }
        self.require_user(voter_id).await?;

        let stored = {
            let mut limiter = self.votes.lock().await;
            let now = time::now_millis();
            if !limiter.allows(voter_id, rumor_id, value, now) {
                return Err(HearsayError::RateLimited(format!(
                    "Too many {} votes on {}",
                    value.direction(),
                    rumor_id
                )));
            }
            self.charge(voter_id, VOTE_COST, "vote").await?;
            let stored = self.store_charged(voter_id, VOTE_COST, ballot).await?;
            limiter.record(voter_id, rumor_id, value, now);
            stored
        };
        tracing::info!(
            "Vote {} ({}) on {} by {}",
            stored.id,
            value.direction(),
            rumor_id,
            voter_id
        );
        self.flood_node(&stored).await;
        Ok(stored)
    }

    async fn require_user(&self, id: &str) -> Result<User, HearsayError> {
        self.stores
            .users
            .get(id)
            .await?
            .ok_or_else(|| HearsayError::NotFound(format!("User {}", id)))
    }

    async fn charge(&self, id: &str, amount: i64, action: &str) -> Result<(), HearsayError> {
        if self.stores.mana.consume(id, amount).await? {
            Ok(())
        } else {
            Err(HearsayError::InsufficientMana(format!(
                "Need {} mana to {}",
                amount, action
            )))
        }
    }

    /// Persist a node whose cost was already charged; a failed write gives
    /// the mana back.
    async fn store_charged(
        &self,
        payer_id: &str,
        amount: i64,
        node: AssertionNode,
    ) -> Result<AssertionNode, HearsayError> {
        match self.stores.assertions.create(node).await {
            Ok(stored) => Ok(stored),
            Err(e) => {
                if let Err(refund_err) = self.stores.mana.refund(payer_id, amount).await {
                    tracing::error!(
                        "Failed to refund {} mana to {}: {}",
                        amount,
                        payer_id,
                        refund_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn flood_node(&self, node: &AssertionNode) {
        if let Err(e) = self.network.gossip_node(node).await {
            tracing::warn!("Failed to gossip {}: {}", node.id, e);
        }
    }

    // ------------------------------------------------------------------
    // Trust
    // ------------------------------------------------------------------

    pub async fn feed(&self) -> Result<Vec<FeedItem>, HearsayError> {
        self.trust.feed().await
    }

    pub async fn score(&self, rumor_id: &str) -> Result<Option<f64>, HearsayError> {
        self.trust.score(rumor_id).await
    }

    pub async fn run_consensus_tick(&self) -> Result<ConsensusTick, HearsayError> {
        self.trust.run_consensus_tick().await
    }

    pub async fn trust_report(&self) -> Result<TrustReport, HearsayError> {
        self.trust.trust_report().await
    }

    pub async fn votes_for(&self, rumor_id: &str) -> Result<Vec<AssertionNode>, HearsayError> {
        self.stores.assertions.list_votes_for_parent(rumor_id).await
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Local assertion, or the DHT copy under `dag:<id>` imported locally.
    pub async fn get_assertion(&self, id: &str) -> Result<Option<AssertionNode>, HearsayError> {
        if let Some(node) = self.stores.assertions.get(id).await? {
            return Ok(Some(node));
        }
        let Some(node) = self.fetch::<AssertionNode>(&assertion::dht_key(id)).await else {
            return Ok(None);
        };
        if node.id != id {
            tracing::debug!("DHT returned assertion {} for {}", node.id, id);
            return Ok(None);
        }
        Ok(Some(self.stores.assertions.create(node).await?))
    }

    /// Local user, or the DHT copy under `user:<id>` imported locally.
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, HearsayError> {
        if let Some(found) = self.stores.users.get(id).await? {
            return Ok(Some(found));
        }
        let Some(found) = self.fetch::<User>(&user::dht_key(id)).await else {
            return Ok(None);
        };
        if found.id != id {
            tracing::debug!("DHT returned user {} for {}", found.id, id);
            return Ok(None);
        }
        self.stores.users.import(found.clone()).await?;
        Ok(Some(found))
    }

    async fn fetch<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.network.dht_get(key).await?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::debug!("Ignoring undecodable DHT value under {}: {}", key, e);
                None
            }
        }
    }

    pub async fn mana(&self, id: &str) -> Result<Option<ManaBalance>, HearsayError> {
        self.stores.mana.balance(id).await
    }

    // ------------------------------------------------------------------
    // Onboarding
    // ------------------------------------------------------------------

    pub async fn register_email(&self, email: &str) -> Result<String, HearsayError> {
        self.stores.registry.register_email(email).await
    }

    /// Exchange a token for a user record and announce it.
    pub async fn onboard(&self, public_key: &str, token: &str) -> Result<User, HearsayError> {
        let created = self.stores.registry.onboard(public_key, token).await?;
        tracing::info!("Onboarded user {}", created.id);
        if let Err(e) = self.network.gossip_user(&created).await {
            tracing::warn!("Failed to announce user {}: {}", created.id, e);
        }
        Ok(created)
    }

    // ------------------------------------------------------------------
    // DHT and network
    // ------------------------------------------------------------------

    pub async fn dht_put(&self, key: &str, value: Value) -> Result<usize, HearsayError> {
        if key.is_empty() {
            return Err(HearsayError::Validation("DHT key is required".to_string()));
        }
        self.network.dht_put(key, value).await
    }

    pub async fn dht_get(&self, key: &str) -> Option<Value> {
        self.network.dht_get(key).await
    }

    pub async fn dht_keys(&self) -> Vec<String> {
        self.network.dht_keys().await
    }

    pub async fn network_status(&self) -> NetworkStatus {
        self.network.status().await
    }

    /// Periodic upkeep: network caches and the vote rate-limit table.
    pub async fn housekeeping(&self) {
        self.network.housekeeping().await;
        self.votes.lock().await.prune(time::now_millis());
    }

    /// Current reputation of every known user.
    pub async fn reputations(&self) -> Result<HashMap<String, f64>, HearsayError> {
        Ok(self
            .stores
            .users
            .list_all()
            .await?
            .into_iter()
            .map(|u| (u.id, u.reputation))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hearsay_core::user::{INITIAL_MANA, MAX_MANA};
    use hearsay_core::AssertionKind;
    use hearsay_reputation::TrustState;
    use hearsay_store::MemoryStore;
    use serde_json::json;

    fn test_node() -> (Node, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let node = Node::new(
            LocalIdentity::generate(),
            NetworkConfig::default(),
            TrustConfig::default(),
            NodeStores::shared(store.clone()),
        );
        (node, store)
    }

    /// Reads from the wrapped store, refuses every write.
    struct ReadOnlyAssertions(Arc<MemoryStore>);

    #[async_trait]
    impl AssertionStore for ReadOnlyAssertions {
        async fn create(&self, _node: AssertionNode) -> Result<AssertionNode, HearsayError> {
            Err(HearsayError::Storage("read-only volume".to_string()))
        }

        async fn get(&self, id: &str) -> Result<Option<AssertionNode>, HearsayError> {
            AssertionStore::get(self.0.as_ref(), id).await
        }

        async fn list_all(&self) -> Result<Vec<AssertionNode>, HearsayError> {
            AssertionStore::list_all(self.0.as_ref()).await
        }

        async fn list_by_kind(&self, kind: AssertionKind) -> Result<Vec<AssertionNode>, HearsayError> {
            self.0.list_by_kind(kind).await
        }

        async fn list_votes_for_parent(&self, id: &str) -> Result<Vec<AssertionNode>, HearsayError> {
            self.0.list_votes_for_parent(id).await
        }
    }

    async fn onboarded(node: &Node, name: &str) -> User {
        let token = node
            .register_email(&format!("{}@example.com", name))
            .await
            .unwrap();
        node.onboard(&format!("pk-{}", name), &token).await.unwrap()
    }

    #[tokio::test]
    async fn posting_charges_mana_and_caches_in_dht() {
        let (node, _) = test_node();
        let alice = onboarded(&node, "alice").await;

        let rumor = node.post_rumor(&alice.id, "the pier is closed", None).await.unwrap();
        assert!(rumor.is_rumor());
        assert_eq!(node.mana(&alice.id).await.unwrap().unwrap().mana, INITIAL_MANA - RUMOR_COST);
        assert!(node.dht_keys().await.contains(&rumor.dht_key()));
    }

    #[tokio::test]
    async fn insufficient_mana_creates_nothing() {
        let (node, store) = test_node();
        let alice = onboarded(&node, "alice").await;
        node.post_rumor(&alice.id, "one", None).await.unwrap();
        node.post_rumor(&alice.id, "two", None).await.unwrap();

        let err = node.post_rumor(&alice.id, "three", None).await.unwrap_err();
        assert!(matches!(err, HearsayError::InsufficientMana(_)));
        assert_eq!(AssertionStore::list_all(store.as_ref()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn overlong_rumor_is_rejected_before_charging() {
        let (node, _) = test_node();
        let alice = onboarded(&node, "alice").await;
        let err = node
            .post_rumor(&alice.id, &"x".repeat(501), None)
            .await
            .unwrap_err();
        assert!(matches!(err, HearsayError::Validation(_)));
        assert_eq!(node.mana(&alice.id).await.unwrap().unwrap().mana, MAX_MANA);
    }

    #[tokio::test]
    async fn vote_on_missing_rumor_mutates_nothing() {
        let (node, store) = test_node();
        let bob = onboarded(&node, "bob").await;
        let keys_before = node.dht_keys().await;

        let err = node.cast_vote(&bob.id, "no-such-rumor", 1, None).await.unwrap_err();
        assert!(matches!(err, HearsayError::Validation(_)));
        assert!(AssertionStore::list_all(store.as_ref()).await.unwrap().is_empty());
        assert_eq!(node.mana(&bob.id).await.unwrap().unwrap().mana, INITIAL_MANA);
        assert_eq!(node.dht_keys().await, keys_before);
    }

    #[tokio::test]
    async fn vote_on_a_vote_is_rejected() {
        let (node, _) = test_node();
        let alice = onboarded(&node, "alice").await;
        let bob = onboarded(&node, "bob").await;
        let rumor = node.post_rumor(&alice.id, "claim", None).await.unwrap();
        let vote = node.cast_vote(&bob.id, &rumor.id, 1, None).await.unwrap();

        let err = node.cast_vote(&alice.id, &vote.id, 1, None).await.unwrap_err();
        assert!(matches!(err, HearsayError::Validation(_)));
    }

    #[tokio::test]
    async fn bad_vote_value_is_rejected() {
        let (node, _) = test_node();
        let alice = onboarded(&node, "alice").await;
        let rumor = node.post_rumor(&alice.id, "claim", None).await.unwrap();
        let err = node.cast_vote(&alice.id, &rumor.id, 2, None).await.unwrap_err();
        assert!(matches!(err, HearsayError::Validation(_)));
    }

    #[tokio::test]
    async fn repeated_votes_are_rate_limited_per_direction() {
        let (node, _) = test_node();
        let alice = onboarded(&node, "alice").await;
        let bob = onboarded(&node, "bob").await;
        let rumor = node.post_rumor(&alice.id, "claim", None).await.unwrap();

        for _ in 0..3 {
            node.cast_vote(&bob.id, &rumor.id, 1, None).await.unwrap();
        }
        let err = node.cast_vote(&bob.id, &rumor.id, 1, None).await.unwrap_err();
        assert!(matches!(err, HearsayError::RateLimited(_)));
        assert_eq!(
            node.mana(&bob.id).await.unwrap().unwrap().mana,
            INITIAL_MANA - 3 * VOTE_COST
        );

        node.cast_vote(&bob.id, &rumor.id, -1, None).await.unwrap();
    }

    #[tokio::test]
    async fn failed_write_refunds_mana() {
        let store = Arc::new(MemoryStore::new());
        let mut stores = NodeStores::shared(store.clone());
        stores.assertions = Arc::new(ReadOnlyAssertions(store.clone()));
        let node = Node::new(
            LocalIdentity::generate(),
            NetworkConfig::default(),
            TrustConfig::default(),
            stores,
        );
        let alice = onboarded(&node, "alice").await;
        let rumor = store
            .create(AssertionNode::rumor("someone", "already here", None).unwrap())
            .await
            .unwrap();

        let err = node.post_rumor(&alice.id, "lost", None).await.unwrap_err();
        assert!(matches!(err, HearsayError::Storage(_)));
        assert_eq!(node.mana(&alice.id).await.unwrap().unwrap().mana, INITIAL_MANA);

        // Failed votes neither spend mana nor count against the rate limit.
        for _ in 0..4 {
            let err = node.cast_vote(&alice.id, &rumor.id, 1, None).await.unwrap_err();
            assert!(matches!(err, HearsayError::Storage(_)));
        }
        assert_eq!(node.mana(&alice.id).await.unwrap().unwrap().mana, INITIAL_MANA);
        assert!(!node.dht_keys().await.iter().any(|k| k.starts_with("dag:")));
    }

    #[tokio::test]
    async fn unknown_voter_is_not_found() {
        let (node, _) = test_node();
        let alice = onboarded(&node, "alice").await;
        let rumor = node.post_rumor(&alice.id, "claim", None).await.unwrap();
        let err = node.cast_vote("ghost", &rumor.id, 1, None).await.unwrap_err();
        assert!(matches!(err, HearsayError::NotFound(_)));
    }

    #[tokio::test]
    async fn reused_token_creates_no_user() {
        let (node, store) = test_node();
        let token = node.register_email("carol@example.com").await.unwrap();
        node.onboard("pk-carol", &token).await.unwrap();

        let err = node.onboard("pk-mallory", &token).await.unwrap_err();
        assert!(matches!(err, HearsayError::Onboarding(_)));
        assert!(node.onboard("pk-mallory", "made-up").await.is_err());
        assert_eq!(UserStore::list_all(store.as_ref()).await.unwrap().len(), 1);

        assert!(node.register_email("CAROL@example.com").await.is_err());
    }

    #[tokio::test]
    async fn lookups_fall_back_to_dht() {
        let (node, store) = test_node();
        let remote = AssertionNode::rumor("someone", "seen elsewhere", None).unwrap();
        node.dht_put(&remote.dht_key(), serde_json::to_value(&remote).unwrap())
            .await
            .unwrap();

        let found = node.get_assertion(&remote.id).await.unwrap().unwrap();
        assert_eq!(found, remote);
        assert!(AssertionStore::get(store.as_ref(), &remote.id).await.unwrap().is_some());

        let stranger = User::onboarded("pk-stranger", 0);
        node.dht_put(&stranger.dht_key(), serde_json::to_value(&stranger).unwrap())
            .await
            .unwrap();
        assert_eq!(node.get_user(&stranger.id).await.unwrap(), Some(stranger.clone()));
        assert!(UserStore::get(store.as_ref(), &stranger.id).await.unwrap().is_some());

        assert_eq!(node.get_user("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn mismatched_dht_record_is_not_imported() {
        let (node, _) = test_node();
        let other = AssertionNode::rumor("someone", "wrong key", None).unwrap();
        node.dht_put("dag:expected", serde_json::to_value(&other).unwrap())
            .await
            .unwrap();
        assert_eq!(node.get_assertion("expected").await.unwrap(), None);

        node.dht_put("dag:junk", json!({"not": "a node"})).await.unwrap();
        assert_eq!(node.get_assertion("junk").await.unwrap(), None);
    }

    #[tokio::test]
    async fn consensus_tick_feeds_reputation_into_scores() {
        let (node, _) = test_node();
        let alice = onboarded(&node, "alice").await;
        let bob = onboarded(&node, "bob").await;
        let carol = onboarded(&node, "carol").await;

        let rumor = node.post_rumor(&alice.id, "claim", None).await.unwrap();
        node.cast_vote(&alice.id, &rumor.id, 1, None).await.unwrap();
        node.cast_vote(&bob.id, &rumor.id, 1, None).await.unwrap();
        node.cast_vote(&carol.id, &rumor.id, -1, None).await.unwrap();

        let tick = node.run_consensus_tick().await.unwrap();
        assert_eq!(tick.feed_length, 1);
        let total: f64 = node.reputations().await.unwrap().values().sum();
        assert!((total - 1.0).abs() < 1e-9);

        let feed = node.feed().await.unwrap();
        assert_eq!(feed[0].id, rumor.id);
        assert!(feed[0].score > 0.0);
        assert!(matches!(
            feed[0].state,
            TrustState::Verified | TrustState::Neutral
        ));
    }

    #[tokio::test]
    async fn empty_dht_key_is_rejected() {
        let (node, _) = test_node();
        assert!(node.dht_put("", json!(1)).await.is_err());
    }
}
