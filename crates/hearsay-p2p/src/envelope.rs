// crates/hearsay-p2p/src/envelope.rs
//
// Signed wire envelope. The signature covers a canonical JSON encoding of
// every field except `sig`, including the sender's public key, so an
// envelope cannot be replayed under a substituted key.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use hearsay_core::{time, HearsayError, LocalIdentity, NodeIdentity};

/// Envelope format version.
pub const PROTOCOL_VERSION: u32 = 1;

/// A signed message in transit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub v: u32,
    #[serde(rename = "type")]
    pub kind: String,
    /// Sender node id: hex(sha256(fromPub bytes)).
    pub from: String,
    /// Sender's hex ed25519 public key.
    pub from_pub: String,
    /// Epoch milliseconds at signing.
    pub ts: i64,
    pub msg_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub payload: Value,
    pub sig: String,
}

/// Borrowed view of the signed fields, in their pinned order.
///
/// `Value` objects serialize with sorted keys, so the payload is canonical too.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Signable<'a> {
    v: u32,
    #[serde(rename = "type")]
    kind: &'a str,
    from: &'a str,
    from_pub: &'a str,
    ts: i64,
    msg_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
    payload: &'a Value,
}

/// A fresh message id: epoch millis plus a random 64-bit suffix.
pub fn new_msg_id() -> String {
    let mut seed = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut seed);
    format!("{}-{}", time::now_millis(), hex::encode(seed))
}

impl Envelope {
    /// Build and sign an envelope from this node.
    pub fn seal(
        identity: &LocalIdentity,
        kind: &str,
        payload: Value,
        msg_id: String,
        reply_to: Option<String>,
    ) -> Result<Self, HearsayError> {
        let me = identity.identity();
        let mut envelope = Self {
            v: PROTOCOL_VERSION,
            kind: kind.to_string(),
            from: me.node_id.clone(),
            from_pub: me.public_key.clone(),
            ts: time::now_millis(),
            msg_id,
            reply_to,
            payload,
            sig: String::new(),
        };
        envelope.sig = identity.sign(&envelope.signing_bytes()?);
        Ok(envelope)
    }

    /// Canonical bytes covered by `sig`.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, HearsayError> {
        let view = Signable {
            v: self.v,
            kind: &self.kind,
            from: &self.from,
            from_pub: &self.from_pub,
            ts: self.ts,
            msg_id: &self.msg_id,
            reply_to: self.reply_to.as_deref(),
            payload: &self.payload,
        };
        Ok(serde_json::to_vec(&view)?)
    }

    /// True when the version is known, `from` is derived from `fromPub`, and
    /// `sig` is a valid signature by `fromPub` over the signed fields.
    pub fn verify(&self) -> bool {
        if self.v != PROTOCOL_VERSION {
            return false;
        }
        let Ok(key_bytes) = hex::decode(&self.from_pub) else {
            return false;
        };
        let Ok(key) = <[u8; 32]>::try_from(key_bytes.as_slice()) else {
            return false;
        };
        if NodeIdentity::derive_id(&key) != self.from {
            return false;
        }
        match self.signing_bytes() {
            Ok(bytes) => LocalIdentity::verify(&bytes, &self.sig, &self.from_pub),
            Err(_) => false,
        }
    }

    /// Encode as one line of the wire stream (no trailing newline).
    pub fn to_line(&self) -> Result<String, HearsayError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn parse(line: &str) -> Result<Self, HearsayError> {
        Ok(serde_json::from_str(line)?)
    }
}
