// crates/hearsay-daemon/tests/network_integration.rs
//
// Multi-node integration tests for the Hearsay network.
//
// Each test starts several in-process nodes on 127.0.0.1:0 and waits for
// them to converge over real TCP connections. These use the public APIs of
// the library crates directly since the daemon is a binary crate with no
// lib.rs.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use hearsay_core::traits::{AssertionStore, UserStore};
use hearsay_core::{LocalIdentity, User};
use hearsay_node::{Node, NodeStores};
use hearsay_p2p::NetworkConfig;
use hearsay_reputation::TrustConfig;
use hearsay_store::{MemoryStore, RocksStore};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create a temporary directory path using UUID to avoid conflicts.
fn temp_db_path(label: &str) -> String {
    let dir = std::env::temp_dir();
    let path = dir.join(format!("hearsay_test_{}_{}", label, Uuid::now_v7()));
    path.to_string_lossy().to_string()
}

struct TestNode {
    node: Arc<Node>,
    store: Arc<MemoryStore>,
    url: String,
}

impl TestNode {
    fn id(&self) -> String {
        self.node.node_id().to_string()
    }

    async fn is_connected_to(&self, other: &TestNode) -> bool {
        self.node
            .network_status()
            .await
            .connections
            .contains(&other.id())
    }

    async fn has_assertion(&self, id: &str) -> bool {
        matches!(AssertionStore::get(self.store.as_ref(), id).await, Ok(Some(_)))
    }

    async fn has_user(&self, id: &str) -> bool {
        matches!(UserStore::get(self.store.as_ref(), id).await, Ok(Some(_)))
    }

    async fn assertion_count(&self) -> usize {
        AssertionStore::list_all(self.store.as_ref())
            .await
            .map(|nodes| nodes.len())
            .unwrap_or(0)
    }

    async fn user(&self, name: &str) -> User {
        let token = self
            .node
            .register_email(&format!("{}@example.com", name))
            .await
            .unwrap();
        self.node
            .onboard(&format!("pk-{}", name), &token)
            .await
            .unwrap()
    }
}

async fn spawn_node(bootstrap: Vec<String>) -> TestNode {
    spawn_node_with(NetworkConfig {
        bootstrap_peers: bootstrap,
        ..NetworkConfig::default()
    })
    .await
}

async fn spawn_node_with(mut config: NetworkConfig) -> TestNode {
    let store = Arc::new(MemoryStore::new());
    config.listen_addr = "127.0.0.1:0".to_string();
    let node = Arc::new(Node::new(
        LocalIdentity::generate(),
        config,
        TrustConfig::default(),
        NodeStores::shared(store.clone()),
    ));
    let addr = node.start().await.unwrap();
    TestNode {
        node,
        store,
        url: format!("tcp://{}", addr),
    }
}

/// Poll a condition until it holds, failing the test after 10 seconds.
macro_rules! eventually {
    ($what:expr, $check:expr) => {{
        let waited = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if $check {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        })
        .await;
        assert!(waited.is_ok(), "timed out waiting for {}", $what);
    }};
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_handshake_syncs_existing_state() {
    let a = spawn_node(vec![]).await;
    let alice = a.user("alice").await;
    let rumor = a.node.post_rumor(&alice.id, "the ferry is late", None).await.unwrap();

    let b = spawn_node(vec![a.url.clone()]).await;

    eventually!(
        "both sides to bind the connection",
        a.is_connected_to(&b).await && b.is_connected_to(&a).await
    );
    eventually!("b to sync the rumor", b.has_assertion(&rumor.id).await);
    eventually!("b to sync the user", b.has_user(&alice.id).await);

    let keys = b.node.dht_keys().await;
    assert!(keys.contains(&rumor.dht_key()));
    assert!(keys.contains(&alice.dht_key()));

    let status = b.node.network_status().await;
    let peer_a = status.peers.iter().find(|p| p.peer_id == a.id()).unwrap();
    assert_eq!(peer_a.url.as_deref(), Some(a.url.as_str()));
}

#[tokio::test]
async fn test_gossip_reaches_nodes_two_hops_away() {
    let a = spawn_node(vec![]).await;
    let b = spawn_node(vec![a.url.clone()]).await;
    eventually!("b to connect to a", b.is_connected_to(&a).await);
    let c = spawn_node(vec![b.url.clone()]).await;
    eventually!("c to connect to b", c.is_connected_to(&b).await);

    let alice = a.user("alice").await;
    eventually!("the user update to reach c", c.has_user(&alice.id).await);

    let rumor = a.node.post_rumor(&alice.id, "power cut downtown", None).await.unwrap();
    eventually!("the rumor to reach c", c.has_assertion(&rumor.id).await);
    assert!(b.has_assertion(&rumor.id).await);
}

#[tokio::test]
async fn test_peer_exchange_discovers_indirect_peers() {
    let a = spawn_node(vec![]).await;
    let b = spawn_node(vec![a.url.clone()]).await;
    eventually!("b to connect to a", b.is_connected_to(&a).await);

    let c = spawn_node(vec![b.url.clone()]).await;
    eventually!("c to discover and connect to a", c.is_connected_to(&a).await);
}

#[tokio::test]
async fn test_votes_converge_to_identical_reputations() {
    let a = spawn_node(vec![]).await;
    let b = spawn_node(vec![a.url.clone()]).await;
    eventually!(
        "a and b to connect",
        a.is_connected_to(&b).await && b.is_connected_to(&a).await
    );

    let alice = a.user("alice").await;
    let bob = b.user("bob").await;
    let carol = a.user("carol").await;
    eventually!(
        "users to replicate",
        a.has_user(&bob.id).await && b.has_user(&alice.id).await && b.has_user(&carol.id).await
    );

    let rumor = a.node.post_rumor(&alice.id, "the bakery closed", None).await.unwrap();
    eventually!("b to receive the rumor", b.has_assertion(&rumor.id).await);

    a.node.cast_vote(&alice.id, &rumor.id, 1, None).await.unwrap();
    b.node.cast_vote(&bob.id, &rumor.id, 1, None).await.unwrap();
    a.node.cast_vote(&carol.id, &rumor.id, -1, None).await.unwrap();
    eventually!(
        "all votes on both nodes",
        a.assertion_count().await == 4 && b.assertion_count().await == 4
    );

    let tick_a = a.node.run_consensus_tick().await.unwrap();
    let tick_b = b.node.run_consensus_tick().await.unwrap();
    assert_eq!(tick_a.reputations.len(), 3);
    for (id, value) in &tick_a.reputations {
        assert!((value - tick_b.reputations[id]).abs() < 1e-12);
    }
    let total: f64 = tick_a.reputations.values().sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert!(tick_a.reputations[&bob.id] > tick_a.reputations[&carol.id]);
}

#[tokio::test]
async fn test_dht_put_replicates_and_get_queries_peers() {
    let a = spawn_node(vec![]).await;
    a.node.dht_put("app:before", json!("held by a")).await.unwrap();

    let b = spawn_node(vec![a.url.clone()]).await;
    eventually!(
        "a and b to connect",
        a.is_connected_to(&b).await && b.is_connected_to(&a).await
    );

    // Pushed to the only live peer.
    assert_eq!(a.node.dht_put("app:color", json!("blue")).await.unwrap(), 1);
    eventually!(
        "b to hold the replica",
        b.node.network().dht_get_local("app:color").await == Some(json!("blue"))
    );

    // Not replicated (put before b existed), so b must ask.
    assert_eq!(b.node.network().dht_get_local("app:before").await, None);
    assert_eq!(b.node.dht_get("app:before").await, Some(json!("held by a")));
    assert_eq!(
        b.node.network().dht_get_local("app:before").await,
        Some(json!("held by a"))
    );

    assert_eq!(b.node.dht_get("app:nowhere").await, None);
}

#[tokio::test]
async fn test_lookup_falls_back_to_remote_dht() {
    // a shares no assertions on sync, so b can only learn the rumor by
    // querying a's DHT.
    let a = spawn_node_with(NetworkConfig {
        sync_snapshot_limit: 0,
        ..NetworkConfig::default()
    })
    .await;
    let alice = a.user("alice").await;
    let rumor = a.node.post_rumor(&alice.id, "cached remotely", None).await.unwrap();

    let b = spawn_node(vec![]).await;
    assert!(!b.has_assertion(&rumor.id).await);
    assert!(b.node.network().connect(&a.url).await);
    eventually!("b to connect to a", b.is_connected_to(&a).await);
    eventually!("b to sync a's users", b.has_user(&alice.id).await);
    assert!(!b.has_assertion(&rumor.id).await);

    let found = b.node.get_assertion(&rumor.id).await.unwrap();
    assert_eq!(found.map(|n| n.id), Some(rumor.id.clone()));
    assert!(b.has_assertion(&rumor.id).await);
}

#[tokio::test]
async fn test_rocks_node_survives_restart() {
    let db_path = temp_db_path("restart");
    let identity_path = format!("{}_identity.json", db_path);

    let (node_id, rumor_id, alice_id) = {
        let identity = LocalIdentity::load_or_create(Path::new(&identity_path)).unwrap();
        let store = Arc::new(RocksStore::open(&db_path).unwrap());
        let node = Node::new(
            identity,
            NetworkConfig::default(),
            TrustConfig::default(),
            NodeStores::shared(store),
        );
        let token = node.register_email("dora@example.com").await.unwrap();
        let dora = node.onboard("pk-dora", &token).await.unwrap();
        let rumor = node.post_rumor(&dora.id, "still here", None).await.unwrap();
        (node.node_id().to_string(), rumor.id, dora.id)
    };

    let identity = LocalIdentity::load_or_create(Path::new(&identity_path)).unwrap();
    assert_eq!(identity.node_id(), node_id);
    let store = Arc::new(RocksStore::open(&db_path).unwrap());
    let node = Node::new(
        identity,
        NetworkConfig::default(),
        TrustConfig::default(),
        NodeStores::shared(store),
    );
    assert!(node.get_assertion(&rumor_id).await.unwrap().is_some());
    let balance = node.mana(&alice_id).await.unwrap().unwrap();
    assert_eq!(balance.mana, 50);

    let _ = std::fs::remove_dir_all(&db_path);
    let _ = std::fs::remove_file(&identity_path);
}
