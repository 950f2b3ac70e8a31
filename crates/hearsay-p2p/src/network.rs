// crates/hearsay-p2p/src/network.rs
//
// Network: the node's gossip and DHT endpoint.
//
// One instance per process, shared as `Arc<Network>`. Each TCP connection gets
// a reader loop that verifies and dispatches envelopes, plus a writer task fed
// by an unbounded channel, so sends never block a handler. Connections move
// through Connecting -> Handshaking -> Active -> Closed; a peer becomes a
// gossip and routing target once its HELLO binds it to a live connection.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};

use hearsay_core::traits::{AssertionStore, UserStore};
use hearsay_core::{AssertionNode, HearsayError, LocalIdentity, User};
use hearsay_store::DhtStore;

use crate::config::NetworkConfig;
use crate::envelope::{new_msg_id, Envelope};
use crate::message::{
    default_capabilities, FindValue, GossipNode, GossipUser, Hello, KeyValue, Message, PeerInfo,
    PeerList, SyncSnapshot,
};
use crate::peers::{PeerRecord, PeerRegistry};
use crate::routing;
use crate::seen::SeenCache;

/// URL scheme of advertised peer addresses.
pub const URL_SCHEME: &str = "tcp://";

/// Lifecycle of a single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Outbound dial in flight (tracked by URL in `dialing`).
    Connecting,
    /// Socket open, peer identity not yet bound by HELLO.
    Handshaking,
    Active,
    Closed,
}

/// Sending half of a live connection, registered per peer id.
#[derive(Debug, Clone)]
struct Link {
    conn_id: u64,
    tx: mpsc::UnboundedSender<String>,
}

/// Per-socket context handed to message handlers.
struct Connection {
    id: u64,
    tx: mpsc::UnboundedSender<String>,
    peer_id: Option<String>,
    state: ConnState,
}

impl Connection {
    fn link(&self) -> Link {
        Link {
            conn_id: self.id,
            tx: self.tx.clone(),
        }
    }
}

/// An outstanding DHT lookup.
struct PendingGet {
    key: String,
    /// Queried peers that have not answered yet.
    outstanding: usize,
    done: oneshot::Sender<Option<Value>>,
}

/// Snapshot of the node's view of the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    pub node_id: String,
    pub advertise_url: Option<String>,
    /// Known peers, most recently seen first.
    pub peers: Vec<PeerRecord>,
    /// Peer ids with a live connection, sorted.
    pub connections: Vec<String>,
}

pub struct Network {
    identity: LocalIdentity,
    config: NetworkConfig,
    assertions: Arc<dyn AssertionStore>,
    users: Arc<dyn UserStore>,
    advertise_url: RwLock<Option<String>>,
    peers: RwLock<PeerRegistry>,
    seen: Mutex<SeenCache>,
    dht: RwLock<DhtStore>,
    links: RwLock<HashMap<String, Link>>,
    dialing: Mutex<HashSet<String>>,
    pending: Mutex<HashMap<String, PendingGet>>,
    next_conn_id: AtomicU64,
}

/// Turn `tcp://host:port` (or bare `host:port`) into a dialable address.
pub fn dial_addr(url: &str) -> Option<String> {
    let rest = match url.strip_prefix(URL_SCHEME) {
        Some(rest) => rest,
        None if url.contains("://") => return None,
        None => url,
    };
    let addr = rest.trim_end_matches('/');
    if addr.is_empty() || !addr.contains(':') {
        return None;
    }
    Some(addr.to_string())
}

impl Network {
    pub fn new(
        identity: LocalIdentity,
        config: NetworkConfig,
        assertions: Arc<dyn AssertionStore>,
        users: Arc<dyn UserStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            advertise_url: RwLock::new(config.advertise_url.clone()),
            seen: Mutex::new(SeenCache::new(config.seen_ttl_secs)),
            identity,
            config,
            assertions,
            users,
            peers: RwLock::new(PeerRegistry::new()),
            dht: RwLock::new(DhtStore::new()),
            links: RwLock::new(HashMap::new()),
            dialing: Mutex::new(HashSet::new()),
            pending: Mutex::new(HashMap::new()),
            next_conn_id: AtomicU64::new(1),
        })
    }

    pub fn node_id(&self) -> &str {
        self.identity.node_id()
    }

    pub fn identity(&self) -> &LocalIdentity {
        &self.identity
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub async fn advertise_url(&self) -> Option<String> {
        self.advertise_url.read().await.clone()
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    /// Bind the listener and start accepting connections.
    ///
    /// Returns the bound address. When no advertise URL is configured, one is
    /// derived from it, unless the listener is bound to a wildcard address.
    pub async fn listen(self: &Arc<Self>) -> Result<SocketAddr, HearsayError> {
        let listener = TcpListener::bind(&self.config.listen_addr)
            .await
            .map_err(|e| {
                HearsayError::Network(format!("bind {}: {}", self.config.listen_addr, e))
            })?;
        let local = listener
            .local_addr()
            .map_err(|e| HearsayError::Network(e.to_string()))?;

        {
            let mut advertise = self.advertise_url.write().await;
            if advertise.is_none() {
                if local.ip().is_unspecified() {
                    tracing::warn!(
                        "Listening on wildcard {}; set advertise_url so peers can dial back",
                        local
                    );
                } else {
                    *advertise = Some(format!("{}{}", URL_SCHEME, local));
                }
            }
        }

        let network = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        tracing::debug!("Inbound connection from {}", addr);
                        network.spawn_connection(stream, false);
                    }
                    Err(e) => {
                        tracing::warn!("Accept failed: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        });

        tracing::info!("P2P listening on {} as {}", local, self.node_id());
        Ok(local)
    }

    /// Dial a peer. Returns true once the socket is open.
    ///
    /// Concurrent dials to the same URL are collapsed, and this node's own
    /// advertise URL is never dialed. Failures are logged, not returned.
    pub async fn connect(self: &Arc<Self>, url: &str) -> bool {
        let Some(addr) = dial_addr(url) else {
            tracing::debug!("Ignoring unusable peer url {}", url);
            return false;
        };
        if self.advertise_url.read().await.as_deref() == Some(url) {
            return false;
        }
        if !self.dialing.lock().await.insert(url.to_string()) {
            return false;
        }

        let result = TcpStream::connect(addr.as_str()).await;
        self.dialing.lock().await.remove(url);

        match result {
            Ok(stream) => {
                tracing::debug!("Connected to {}", url);
                self.spawn_connection(stream, true);
                true
            }
            Err(e) => {
                tracing::debug!("Connect to {} failed: {}", url, e);
                false
            }
        }
    }

    /// Dial the static bootstrap list in order, and probe the local port
    /// range with one concurrent dial per port. Returns immediately.
    pub fn bootstrap(self: &Arc<Self>) {
        let urls = self.config.bootstrap_peers.clone();
        if !urls.is_empty() {
            let network = Arc::clone(self);
            tokio::spawn(async move {
                for url in urls {
                    network.connect(&url).await;
                }
            });
        }

        if let Some(range) = &self.config.probe_ports {
            for port in range.start..=range.end {
                let url = format!("{}{}:{}", URL_SCHEME, self.config.probe_host, port);
                let network = Arc::clone(self);
                tokio::spawn(async move {
                    network.connect(&url).await;
                });
            }
        }
    }

    // Must stay synchronous: the connection future reaches `connect` again
    // through PEERS handling and cannot embed it.
    fn spawn_connection(self: &Arc<Self>, stream: TcpStream, outbound: bool) {
        let network = Arc::clone(self);
        tokio::spawn(async move {
            network.run_connection(stream, outbound).await;
        });
    }

    async fn run_connection(self: Arc<Self>, stream: TcpStream, outbound: bool) {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let (reader, mut writer) = stream.into_split();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        // Exits once every sender is dropped or the socket fails.
        tokio::spawn(async move {
            while let Some(mut line) = rx.recv().await {
                line.push('\n');
                if let Err(e) = writer.write_all(line.as_bytes()).await {
                    tracing::debug!("Write on connection {} failed: {}", conn_id, e);
                    break;
                }
            }
        });

        let mut conn = Connection {
            id: conn_id,
            tx,
            peer_id: None,
            state: ConnState::Handshaking,
        };

        if outbound {
            let hello = self.hello(false).await;
            self.send_on(&conn, &hello, new_msg_id(), None);
            self.send_on(&conn, &Message::SyncReq, new_msg_id(), None);
        }

        let mut lines = BufReader::new(reader).lines();
        while conn.state != ConnState::Closed {
            match lines.next_line().await {
                Ok(Some(line)) => self.handle_line(&mut conn, &line).await,
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("Read on connection {} failed: {}", conn_id, e);
                    break;
                }
            }
        }

        conn.state = ConnState::Closed;
        self.unbind(&conn).await;
    }

    /// Forget the peer's link, unless a newer connection has replaced it.
    async fn unbind(&self, conn: &Connection) {
        let Some(peer_id) = &conn.peer_id else {
            return;
        };
        let mut links = self.links.write().await;
        if links.get(peer_id).map(|link| link.conn_id) == Some(conn.id) {
            links.remove(peer_id);
            tracing::info!("Connection to peer {} closed", short(peer_id));
        }
    }

    // ------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------

    fn seal(
        &self,
        message: &Message,
        msg_id: String,
        reply_to: Option<String>,
    ) -> Result<String, HearsayError> {
        let envelope = Envelope::seal(
            &self.identity,
            message.kind(),
            message.to_payload()?,
            msg_id,
            reply_to,
        )?;
        envelope.to_line()
    }

    /// Send on a specific connection, regardless of handshake state.
    fn send_on(&self, conn: &Connection, message: &Message, msg_id: String, reply_to: Option<String>) {
        match self.seal(message, msg_id, reply_to) {
            Ok(line) => {
                let _ = conn.tx.send(line);
            }
            Err(e) => tracing::warn!("Failed to seal {}: {}", message.kind(), e),
        }
    }

    async fn send_to_peer(&self, peer_id: &str, line: &str) -> bool {
        let links = self.links.read().await;
        match links.get(peer_id) {
            Some(link) => link.tx.send(line.to_string()).is_ok(),
            None => false,
        }
    }

    /// Peer ids with a live connection, sorted.
    pub async fn connected_peers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.links.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Random sample of connected peers, excluding `exclude`.
    async fn sample_peers(&self, limit: usize, exclude: Option<&str>) -> Vec<String> {
        let mut ids: Vec<String> = self
            .links
            .read()
            .await
            .keys()
            .filter(|id| Some(id.as_str()) != exclude)
            .cloned()
            .collect();
        ids.shuffle(&mut rand::thread_rng());
        ids.truncate(limit);
        ids
    }

    /// Send one sealed line to a fanout sample. Returns the number of peers reached.
    async fn broadcast(&self, line: &str, exclude: Option<&str>) -> usize {
        let mut sent = 0;
        for peer_id in self.sample_peers(self.config.gossip_fanout, exclude).await {
            if self.send_to_peer(&peer_id, line).await {
                sent += 1;
            }
        }
        sent
    }

    /// Live peers closest to `key` by XOR distance.
    pub async fn closest_live_peers(&self, key: &str, k: usize) -> Vec<String> {
        let links = self.links.read().await;
        routing::closest(key, links.keys(), k)
    }

    async fn hello(&self, reply: bool) -> Message {
        Message::Hello(Hello {
            advertise_url: self.advertise_url().await,
            capabilities: default_capabilities(),
            reply,
        })
    }

    // ------------------------------------------------------------------
    // Receiving
    // ------------------------------------------------------------------

    async fn handle_line(self: &Arc<Self>, conn: &mut Connection, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        match Envelope::parse(line) {
            Ok(envelope) => self.handle_envelope(conn, envelope).await,
            Err(e) => tracing::debug!("Dropping malformed envelope on connection {}: {}", conn.id, e),
        }
    }

    async fn handle_envelope(self: &Arc<Self>, conn: &mut Connection, envelope: Envelope) {
        if !envelope.verify() {
            tracing::debug!("Dropping unverifiable {} envelope", envelope.kind);
            return;
        }
        if envelope.from == self.node_id() {
            tracing::debug!("Connection {} loops back to this node; closing", conn.id);
            conn.state = ConnState::Closed;
            return;
        }

        let message = match Message::decode(&envelope.kind, &envelope.payload) {
            Ok(Some(message)) => message,
            Ok(None) => {
                tracing::debug!("Ignoring unknown message type {}", envelope.kind);
                return;
            }
            Err(e) => {
                tracing::debug!("Dropping malformed {} payload: {}", envelope.kind, e);
                return;
            }
        };

        {
            let (url, capabilities) = match &message {
                Message::Hello(hello) => {
                    (hello.advertise_url.clone(), Some(hello.capabilities.clone()))
                }
                _ => (None, None),
            };
            self.peers
                .write()
                .await
                .upsert(&envelope.from, url, capabilities);
        }

        match message {
            Message::Hello(hello) => self.on_hello(conn, &envelope, hello).await,
            Message::Peers(list) => self.on_peers(list).await,
            Message::SyncReq => self.on_sync_req(conn, &envelope).await,
            Message::SyncRes(snapshot) => self.on_sync_res(snapshot).await,
            Message::Gossip(gossip) => self.on_gossip(&envelope, gossip).await,
            Message::UserUpdate(update) => self.on_user_update(&envelope, update).await,
            Message::DhtStore(kv) => self.dht.write().await.put_local(&kv.key, kv.value),
            Message::DhtFindValue(find) => self.on_find_value(conn, &envelope, find).await,
            Message::DhtValue(kv) => self.on_dht_value(&envelope, kv).await,
        }
    }

    async fn on_hello(&self, conn: &mut Connection, envelope: &Envelope, hello: Hello) {
        let peer_id = envelope.from.clone();
        if conn.state != ConnState::Active {
            tracing::info!("Peer {} connected", short(&peer_id));
        }
        conn.peer_id = Some(peer_id.clone());
        conn.state = ConnState::Active;
        self.links.write().await.insert(peer_id.clone(), conn.link());

        if hello.reply {
            return;
        }

        let answer = self.hello(true).await;
        self.send_on(conn, &answer, new_msg_id(), None);

        let peers: Vec<PeerInfo> = self
            .peers
            .read()
            .await
            .list()
            .into_iter()
            .filter(|p| p.peer_id != peer_id && p.url.is_some())
            .take(self.config.max_shared_peers)
            .map(|p| PeerInfo {
                peer_id: p.peer_id,
                url: p.url,
            })
            .collect();
        self.send_on(conn, &Message::Peers(PeerList { peers }), new_msg_id(), None);
        self.send_on(conn, &Message::SyncReq, new_msg_id(), None);
    }

    async fn on_peers(self: &Arc<Self>, list: PeerList) {
        let mut to_dial = Vec::new();
        {
            let mut peers = self.peers.write().await;
            let links = self.links.read().await;
            for info in list.peers {
                if info.peer_id.is_empty() || info.peer_id == self.node_id() {
                    continue;
                }
                peers.upsert(&info.peer_id, info.url.clone(), None);
                if let Some(url) = info.url {
                    if !links.contains_key(&info.peer_id) {
                        to_dial.push(url);
                    }
                }
            }
        }

        for url in to_dial {
            let network = Arc::clone(self);
            tokio::spawn(async move {
                network.connect(&url).await;
            });
        }
    }

    async fn on_sync_req(&self, conn: &Connection, envelope: &Envelope) {
        match self.snapshot().await {
            Ok(snapshot) => self.send_on(
                conn,
                &Message::SyncRes(snapshot),
                new_msg_id(),
                Some(envelope.msg_id.clone()),
            ),
            Err(e) => tracing::warn!("Failed to build sync snapshot: {}", e),
        }
    }

    /// The most recent assertion nodes plus every known user.
    async fn snapshot(&self) -> Result<SyncSnapshot, HearsayError> {
        let mut nodes = self.assertions.list_all().await?;
        nodes.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        nodes.truncate(self.config.sync_snapshot_limit);
        let users = self.users.list_all().await?;
        Ok(SyncSnapshot { nodes, users })
    }

    async fn on_sync_res(&self, snapshot: SyncSnapshot) {
        let mut imported_nodes = 0;
        for node in snapshot.nodes {
            match self.store_node_if_absent(node).await {
                Ok(true) => imported_nodes += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!("Sync import of assertion failed: {}", e),
            }
        }

        let mut imported_users = 0;
        for user in snapshot.users {
            match self.store_user_if_absent(user).await {
                Ok(true) => imported_users += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!("Sync import of user failed: {}", e),
            }
        }

        if imported_nodes > 0 || imported_users > 0 {
            tracing::info!(
                "Sync imported {} assertions and {} users",
                imported_nodes,
                imported_users
            );
        }
    }

    async fn on_gossip(&self, envelope: &Envelope, gossip: GossipNode) {
        if !self.seen.lock().await.mark(&envelope.msg_id) {
            return;
        }
        if let Err(e) = self.store_node_if_absent(gossip.node.clone()).await {
            tracing::warn!("Failed to store gossiped assertion {}: {}", gossip.node.id, e);
        }

        let ttl = gossip.ttl.saturating_sub(1);
        if ttl > 0 {
            let forward = Message::Gossip(GossipNode {
                ttl,
                node: gossip.node,
            });
            self.forward(envelope, &forward).await;
        }
    }

    async fn on_user_update(&self, envelope: &Envelope, update: GossipUser) {
        if !self.seen.lock().await.mark(&envelope.msg_id) {
            return;
        }
        let key = update.user.dht_key();
        match serde_json::to_value(&update.user) {
            Ok(value) => self.dht.write().await.put_local(&key, value),
            Err(e) => tracing::warn!("Failed to encode user {}: {}", update.user.id, e),
        }
        if let Err(e) = self.users.import(update.user.clone()).await {
            tracing::warn!("Failed to import user {}: {}", update.user.id, e);
        }

        let ttl = update.ttl.saturating_sub(1);
        if ttl > 0 {
            let forward = Message::UserUpdate(GossipUser {
                ttl,
                user: update.user,
            });
            self.forward(envelope, &forward).await;
        }
    }

    /// Re-sign under the original message id and pass on to a fresh sample.
    async fn forward(&self, envelope: &Envelope, message: &Message) {
        match self.seal(message, envelope.msg_id.clone(), None) {
            Ok(line) => {
                let sent = self.broadcast(&line, Some(&envelope.from)).await;
                tracing::debug!("Forwarded {} {} to {} peers", message.kind(), envelope.msg_id, sent);
            }
            Err(e) => tracing::warn!("Failed to seal forwarded {}: {}", message.kind(), e),
        }
    }

    async fn on_find_value(&self, conn: &Connection, envelope: &Envelope, find: FindValue) {
        let value = self
            .dht
            .read()
            .await
            .get_local(&find.key)
            .cloned()
            .unwrap_or(Value::Null);
        let answer = Message::DhtValue(KeyValue {
            key: find.key,
            value,
        });
        self.send_on(conn, &answer, new_msg_id(), Some(envelope.msg_id.clone()));
    }

    async fn on_dht_value(&self, envelope: &Envelope, kv: KeyValue) {
        let Some(reply_to) = envelope.reply_to.as_deref() else {
            return;
        };

        let resolved = {
            let mut pending = self.pending.lock().await;
            let finished = match pending.get_mut(reply_to) {
                None => false,
                Some(query) if kv.value.is_null() => {
                    query.outstanding = query.outstanding.saturating_sub(1);
                    query.outstanding == 0
                }
                Some(_) => true,
            };
            if finished {
                pending.remove(reply_to)
            } else {
                None
            }
        };

        // Late or extra answers are still cached; only the first resolves the lookup.
        if !kv.value.is_null() {
            let key = resolved.as_ref().map_or(kv.key.as_str(), |query| query.key.as_str());
            self.dht.write().await.put_local(key, kv.value.clone());
        }

        if let Some(query) = resolved {
            let answer = if kv.value.is_null() { None } else { Some(kv.value) };
            let _ = query.done.send(answer);
        }
    }

    /// Store a received assertion node unless already present; cache it in the DHT.
    async fn store_node_if_absent(&self, node: AssertionNode) -> Result<bool, HearsayError> {
        if self.assertions.get(&node.id).await?.is_some() {
            return Ok(false);
        }
        let value = serde_json::to_value(&node)?;
        let key = node.dht_key();
        self.assertions.create(node).await?;
        self.dht.write().await.put_local(&key, value);
        Ok(true)
    }

    async fn store_user_if_absent(&self, user: User) -> Result<bool, HearsayError> {
        if self.users.get(&user.id).await?.is_some() {
            return Ok(false);
        }
        let value = serde_json::to_value(&user)?;
        let key = user.dht_key();
        self.users.import(user).await?;
        self.dht.write().await.put_local(&key, value);
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Gossip and DHT operations
    // ------------------------------------------------------------------

    /// Cache a locally created assertion node and flood it.
    ///
    /// Returns the number of peers the first hop reached.
    pub async fn gossip_node(&self, node: &AssertionNode) -> Result<usize, HearsayError> {
        self.dht
            .write()
            .await
            .put_local(&node.dht_key(), serde_json::to_value(node)?);
        let message = Message::Gossip(GossipNode {
            ttl: self.config.gossip_ttl,
            node: node.clone(),
        });
        self.originate(&message).await
    }

    /// Cache a user record and flood it as USER_UPDATE.
    pub async fn gossip_user(&self, user: &User) -> Result<usize, HearsayError> {
        self.dht
            .write()
            .await
            .put_local(&user.dht_key(), serde_json::to_value(user)?);
        let message = Message::UserUpdate(GossipUser {
            ttl: self.config.gossip_ttl,
            user: user.clone(),
        });
        self.originate(&message).await
    }

    async fn originate(&self, message: &Message) -> Result<usize, HearsayError> {
        let msg_id = new_msg_id();
        self.seen.lock().await.mark(&msg_id);
        let line = self.seal(message, msg_id, None)?;
        let sent = self.broadcast(&line, None).await;
        tracing::debug!("Flooded {} to {} peers", message.kind(), sent);
        Ok(sent)
    }

    /// Store locally, then push to the closest live peers.
    ///
    /// Returns the number of replicas contacted.
    pub async fn dht_put(&self, key: &str, value: Value) -> Result<usize, HearsayError> {
        self.dht.write().await.put_local(key, value.clone());

        let targets = self
            .closest_live_peers(key, self.config.replication_factor)
            .await;
        if targets.is_empty() {
            return Ok(0);
        }

        let message = Message::DhtStore(KeyValue {
            key: key.to_string(),
            value,
        });
        let line = self.seal(&message, new_msg_id(), None)?;
        let mut sent = 0;
        for peer_id in &targets {
            if self.send_to_peer(peer_id, &line).await {
                sent += 1;
            }
        }
        Ok(sent)
    }

    /// Look up `key` with the configured timeout.
    pub async fn dht_get(&self, key: &str) -> Option<Value> {
        self.dht_get_with_timeout(key, Duration::from_millis(self.config.dht_timeout_ms))
            .await
    }

    /// Local value if present, otherwise the first non-null answer from the
    /// closest live peers. Resolves to `None` on timeout or when every
    /// queried peer reports no value.
    pub async fn dht_get_with_timeout(&self, key: &str, timeout: Duration) -> Option<Value> {
        if let Some(value) = self.dht.read().await.get_local(key) {
            return Some(value.clone());
        }

        let targets = self
            .closest_live_peers(key, self.config.dht_query_fanout)
            .await;
        if targets.is_empty() {
            return None;
        }

        let msg_id = new_msg_id();
        let query = Message::DhtFindValue(FindValue {
            key: key.to_string(),
        });
        let line = match self.seal(&query, msg_id.clone(), None) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Failed to seal DHT query: {}", e);
                return None;
            }
        };

        let (done, answer) = oneshot::channel();
        self.pending.lock().await.insert(
            msg_id.clone(),
            PendingGet {
                key: key.to_string(),
                outstanding: targets.len(),
                done,
            },
        );

        let mut unsent = 0;
        for peer_id in &targets {
            if !self.send_to_peer(peer_id, &line).await {
                unsent += 1;
            }
        }
        if unsent > 0 {
            let mut pending = self.pending.lock().await;
            if let Some(query) = pending.get_mut(&msg_id) {
                query.outstanding = query.outstanding.saturating_sub(unsent);
                if query.outstanding == 0 {
                    pending.remove(&msg_id);
                    return None;
                }
            }
        }

        let result = tokio::time::timeout(timeout, answer).await;
        self.pending.lock().await.remove(&msg_id);
        match result {
            Ok(Ok(value)) => value,
            Ok(Err(_)) => None,
            Err(_) => {
                tracing::debug!("DHT lookup for {} timed out", key);
                None
            }
        }
    }

    /// Local DHT value, without touching the network.
    pub async fn dht_get_local(&self, key: &str) -> Option<Value> {
        self.dht.read().await.get_local(key).cloned()
    }

    /// Locally held DHT keys, sorted.
    pub async fn dht_keys(&self) -> Vec<String> {
        self.dht.read().await.keys()
    }

    // ------------------------------------------------------------------
    // Status and upkeep
    // ------------------------------------------------------------------

    pub async fn status(&self) -> NetworkStatus {
        let peers = self.peers.read().await.list();
        NetworkStatus {
            node_id: self.node_id().to_string(),
            advertise_url: self.advertise_url().await,
            peers,
            connections: self.connected_peers().await,
        }
    }

    /// Prune expired message ids and stale peers.
    pub async fn housekeeping(&self) {
        let expired = self.seen.lock().await.prune();
        let max_age_ms = (self.config.peer_max_age_secs as i64).saturating_mul(1000);
        let stale = self.peers.write().await.prune(max_age_ms);
        tracing::debug!(
            "Housekeeping: dropped {} message ids and {} peers",
            expired,
            stale
        );
    }
}

fn short(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}
