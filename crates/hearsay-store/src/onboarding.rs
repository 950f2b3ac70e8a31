// crates/hearsay-store/src/onboarding.rs
//
// Helpers shared by both store backends for email registration and tokens.
// Emails are never stored in the clear, only their SHA-256.

use uuid::Uuid;

use hearsay_core::crypto;
use hearsay_core::HearsayError;

/// Case-insensitive hash of an email address.
pub fn email_hash(email: &str) -> String {
    crypto::sha256_hex(email.trim().to_lowercase().as_bytes())
}

/// A fresh single-use onboarding token.
pub fn new_token() -> String {
    Uuid::new_v4().to_string()
}

pub fn validate_email(email: &str) -> Result<(), HearsayError> {
    if email.trim().is_empty() {
        return Err(HearsayError::Validation("Email is required".to_string()));
    }
    Ok(())
}

pub fn validate_onboarding(public_key: &str, token: &str) -> Result<(), HearsayError> {
    if public_key.is_empty() || token.is_empty() {
        return Err(HearsayError::Validation(
            "publicKey and token are required".to_string(),
        ));
    }
    Ok(())
}
