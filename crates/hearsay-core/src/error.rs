use thiserror::Error;

/// Protocol-wide error types for the Hearsay network.
#[derive(Debug, Error)]
pub enum HearsayError {
    /// Caller input rejected before any mutation (text length, vote value, missing parent).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The acting user does not hold enough mana for the write.
    #[error("Insufficient mana: {0}")]
    InsufficientMana(String),

    /// Too many votes in the sliding window.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Onboarding failure (reused email, unknown or spent token).
    #[error("Onboarding error: {0}")]
    Onboarding(String),

    /// Network error (transport, handshake, envelope decoding).
    #[error("Network error: {0}")]
    Network(String),

    /// Cryptographic error (key generation, signing, verification).
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Storage layer error (RocksDB, identity file).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<serde_json::Error> for HearsayError {
    fn from(e: serde_json::Error) -> Self {
        HearsayError::Serialization(e.to_string())
    }
}

impl From<ed25519_dalek::SignatureError> for HearsayError {
    fn from(e: ed25519_dalek::SignatureError) -> Self {
        HearsayError::Crypto(e.to_string())
    }
}

impl From<std::io::Error> for HearsayError {
    fn from(e: std::io::Error) -> Self {
        HearsayError::Storage(e.to_string())
    }
}

impl From<hex::FromHexError> for HearsayError {
    fn from(e: hex::FromHexError) -> Self {
        HearsayError::Serialization(format!("Invalid hex: {}", e))
    }
}
