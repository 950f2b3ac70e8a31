// crates/hearsay-p2p/src/message.rs
//
// The fixed message set carried in envelope payloads. Dispatch happens on the
// envelope `type` tag; unknown tags decode to `None` and are ignored.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use hearsay_core::{AssertionNode, HearsayError, User};

pub const HELLO: &str = "HELLO";
pub const PEERS: &str = "PEERS";
pub const SYNC_REQ: &str = "SYNC_REQ";
pub const SYNC_RES: &str = "SYNC_RES";
pub const GOSSIP: &str = "GOSSIP";
pub const USER_UPDATE: &str = "USER_UPDATE";
pub const DHT_STORE: &str = "DHT_STORE";
pub const DHT_FIND_VALUE: &str = "DHT_FIND_VALUE";
pub const DHT_VALUE: &str = "DHT_VALUE";

/// Capability flags advertised in HELLO.
pub fn default_capabilities() -> BTreeSet<String> {
    ["dht", "gossip", "sync"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    #[serde(default)]
    pub advertise_url: Option<String>,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// Set on the answer to a HELLO; a reply is never answered.
    #[serde(default)]
    pub reply: bool,
}

/// A peer shared for discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub peer_id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerList {
    #[serde(default)]
    pub peers: Vec<PeerInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    #[serde(default)]
    pub nodes: Vec<AssertionNode>,
    #[serde(default)]
    pub users: Vec<User>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GossipNode {
    pub ttl: u32,
    pub node: AssertionNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GossipUser {
    pub ttl: u32,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindValue {
    pub key: String,
}

/// A decoded envelope payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Hello(Hello),
    Peers(PeerList),
    SyncReq,
    SyncRes(SyncSnapshot),
    Gossip(GossipNode),
    UserUpdate(GossipUser),
    DhtStore(KeyValue),
    DhtFindValue(FindValue),
    /// Answer to DHT_FIND_VALUE; correlated through the envelope `replyTo`.
    DhtValue(KeyValue),
}

impl Message {
    /// The envelope `type` tag for this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Hello(_) => HELLO,
            Message::Peers(_) => PEERS,
            Message::SyncReq => SYNC_REQ,
            Message::SyncRes(_) => SYNC_RES,
            Message::Gossip(_) => GOSSIP,
            Message::UserUpdate(_) => USER_UPDATE,
            Message::DhtStore(_) => DHT_STORE,
            Message::DhtFindValue(_) => DHT_FIND_VALUE,
            Message::DhtValue(_) => DHT_VALUE,
        }
    }

    /// Encode as an envelope payload object.
    pub fn to_payload(&self) -> Result<Value, HearsayError> {
        let value = match self {
            Message::Hello(m) => serde_json::to_value(m)?,
            Message::Peers(m) => serde_json::to_value(m)?,
            Message::SyncReq => Value::Object(Default::default()),
            Message::SyncRes(m) => serde_json::to_value(m)?,
            Message::Gossip(m) => serde_json::to_value(m)?,
            Message::UserUpdate(m) => serde_json::to_value(m)?,
            Message::DhtStore(m) | Message::DhtValue(m) => serde_json::to_value(m)?,
            Message::DhtFindValue(m) => serde_json::to_value(m)?,
        };
        Ok(value)
    }

    /// Decode a payload by its `type` tag.
    ///
    /// Returns `Ok(None)` for unknown tags and an error for a known tag with
    /// a malformed payload.
    pub fn decode(kind: &str, payload: &Value) -> Result<Option<Self>, HearsayError> {
        let message = match kind {
            HELLO => Message::Hello(from_payload(payload)?),
            PEERS => Message::Peers(from_payload(payload)?),
            SYNC_REQ => Message::SyncReq,
            SYNC_RES => Message::SyncRes(from_payload(payload)?),
            GOSSIP => Message::Gossip(from_payload(payload)?),
            USER_UPDATE => Message::UserUpdate(from_payload(payload)?),
            DHT_STORE => Message::DhtStore(from_payload(payload)?),
            DHT_FIND_VALUE => Message::DhtFindValue(from_payload(payload)?),
            DHT_VALUE => Message::DhtValue(from_payload(payload)?),
            _ => return Ok(None),
        };
        Ok(Some(message))
    }
}

fn from_payload<T: serde::de::DeserializeOwned>(payload: &Value) -> Result<T, HearsayError> {
    Ok(T::deserialize(payload)?)
}
