// crates/hearsay-core/src/identity.rs
//
// Node identity for the P2P transport. Each running node owns one ed25519
// keypair; the node id is the hex SHA-256 of the public key bytes. The
// keypair is created on first use and persisted so restarts keep the id.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::crypto::{self, Keypair};
use crate::error::HearsayError;

/// Public half of a node identity, safe to advertise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeIdentity {
    /// hex(sha256(public key bytes)).
    pub node_id: String,
    /// Hex-encoded ed25519 verifying key.
    pub public_key: String,
}

impl NodeIdentity {
    /// Derive the node id for a raw public key.
    pub fn derive_id(public_key: &[u8; 32]) -> String {
        crypto::sha256_hex(public_key)
    }
}

/// On-disk form of the identity file.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityFile {
    node_id: String,
    public_key: String,
    secret_key: String,
}

/// The local node's full identity, including the private key.
#[derive(Debug)]
pub struct LocalIdentity {
    identity: NodeIdentity,
    keypair: Keypair,
}

impl LocalIdentity {
    /// Create a fresh, unpersisted identity.
    pub fn generate() -> Self {
        Self::from_keypair(Keypair::generate())
    }

    fn from_keypair(keypair: Keypair) -> Self {
        let public_key = keypair.public_key_bytes();
        let identity = NodeIdentity {
            node_id: NodeIdentity::derive_id(&public_key),
            public_key: hex::encode(public_key),
        };
        Self { identity, keypair }
    }

    /// Load the identity stored at `path`, or create and persist a new one.
    ///
    /// Idempotent: every call after the first returns the same node id.
    pub fn load_or_create(path: &Path) -> Result<Self, HearsayError> {
        if path.exists() {
            let raw = fs::read_to_string(path)?;
            let file: IdentityFile = serde_json::from_str(&raw)?;
            let secret: [u8; 32] = hex::decode(file.secret_key.trim())?
                .try_into()
                .map_err(|_| HearsayError::Crypto("Secret key must be 32 bytes".to_string()))?;
            let loaded = Self::from_keypair(Keypair::from_secret_bytes(&secret));
            if loaded.identity.node_id != file.node_id {
                return Err(HearsayError::Storage(format!(
                    "Identity file {} has a node id that does not match its key",
                    path.display()
                )));
            }
            tracing::debug!("Loaded node identity {}", loaded.identity.node_id);
            return Ok(loaded);
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let created = Self::generate();
        let file = IdentityFile {
            node_id: created.identity.node_id.clone(),
            public_key: created.identity.public_key.clone(),
            secret_key: hex::encode(created.keypair.secret_key_bytes()),
        };
        fs::write(path, serde_json::to_string_pretty(&file)?)?;
        tracing::info!(
            "Created node identity {} at {}",
            created.identity.node_id,
            path.display()
        );
        Ok(created)
    }

    /// The public identity `{nodeId, publicKey}`.
    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    pub fn node_id(&self) -> &str {
        &self.identity.node_id
    }

    /// Sign `payload`, returning a hex-encoded signature.
    pub fn sign(&self, payload: &[u8]) -> String {
        hex::encode(self.keypair.sign(payload))
    }

    /// Verify a hex signature against a hex public key. Never errors.
    pub fn verify(payload: &[u8], signature: &str, public_key: &str) -> bool {
        crypto::verify_hex(public_key, payload, signature)
    }
}
