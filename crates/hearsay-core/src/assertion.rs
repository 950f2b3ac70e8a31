// crates/hearsay-core/src/assertion.rs
//
// Assertion graph records. Rumors are roots; votes hang off a rumor through
// `parent_id`. Nodes are immutable once created and identified by a globally
// unique id (UUID v7, time-ordered).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HearsayError;
use crate::time;

/// Maximum rumor length, in characters.
pub const MAX_RUMOR_CHARS: usize = 500;

/// Discriminates the two node kinds of the assertion graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssertionKind {
    /// An authored claim, the root of a trust computation.
    Rumor,
    /// A +1/-1 judgment cast against a rumor.
    Vote,
}

impl AssertionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssertionKind::Rumor => "RUMOR",
            AssertionKind::Vote => "VOTE",
        }
    }
}

/// A vote direction. Encoded on the wire as the integer `1` or `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            VoteValue::Up => 1.0,
            VoteValue::Down => -1.0,
        }
    }

    /// Label used for per-direction rate limiting.
    pub fn direction(&self) -> &'static str {
        match self {
            VoteValue::Up => "verify",
            VoteValue::Down => "dispute",
        }
    }
}

impl TryFrom<i64> for VoteValue {
    type Error = HearsayError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(VoteValue::Up),
            -1 => Ok(VoteValue::Down),
            other => Err(HearsayError::Validation(format!(
                "vote must be +1 or -1, got {}",
                other
            ))),
        }
    }
}

impl From<VoteValue> for i64 {
    fn from(value: VoteValue) -> Self {
        match value {
            VoteValue::Up => 1,
            VoteValue::Down => -1,
        }
    }
}

/// A node in the assertion graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionNode {
    /// Globally unique, write-once identifier.
    pub id: String,
    /// Rumor this vote targets; optional reply thread for rumors.
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: AssertionKind,
    /// Rumor body (rumors only).
    #[serde(default)]
    pub text: Option<String>,
    /// Vote direction (votes only).
    #[serde(default)]
    pub vote: Option<VoteValue>,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub voter_id: Option<String>,
    #[serde(default)]
    pub evidence: Option<String>,
    /// Creation time, whole seconds since the epoch.
    pub timestamp: i64,
}

impl AssertionNode {
    /// Build a new rumor, validating author and text.
    pub fn rumor(
        author_id: &str,
        text: &str,
        parent_id: Option<String>,
    ) -> Result<Self, HearsayError> {
        if author_id.is_empty() {
            return Err(HearsayError::Validation("authorId is required".to_string()));
        }
        validate_rumor_text(text)?;

        Ok(Self {
            id: Uuid::now_v7().to_string(),
            parent_id: parent_id.filter(|p| !p.is_empty()),
            kind: AssertionKind::Rumor,
            text: Some(text.to_string()),
            vote: None,
            author_id: Some(author_id.to_string()),
            voter_id: None,
            evidence: None,
            timestamp: time::now_secs(),
        })
    }

    /// Build a new vote on `rumor_id`. The caller checks that the rumor exists.
    pub fn vote(
        rumor_id: &str,
        voter_id: &str,
        vote: i64,
        evidence: Option<String>,
    ) -> Result<Self, HearsayError> {
        if rumor_id.is_empty() {
            return Err(HearsayError::Validation(
                "parentId (rumor id) is required".to_string(),
            ));
        }
        if voter_id.is_empty() {
            return Err(HearsayError::Validation("voterId is required".to_string()));
        }
        let vote = VoteValue::try_from(vote)?;

        Ok(Self {
            id: Uuid::now_v7().to_string(),
            parent_id: Some(rumor_id.to_string()),
            kind: AssertionKind::Vote,
            text: None,
            vote: Some(vote),
            author_id: None,
            voter_id: Some(voter_id.to_string()),
            evidence: evidence.filter(|e| !e.is_empty()),
            timestamp: time::now_secs(),
        })
    }

    pub fn is_rumor(&self) -> bool {
        self.kind == AssertionKind::Rumor
    }

    pub fn is_vote(&self) -> bool {
        self.kind == AssertionKind::Vote
    }

    /// The user who wrote this node: the author of a rumor or the voter of a vote.
    pub fn actor_id(&self) -> Option<&str> {
        match self.kind {
            AssertionKind::Rumor => self.author_id.as_deref(),
            AssertionKind::Vote => self.voter_id.as_deref(),
        }
    }

    /// DHT key under which this node is cached.
    pub fn dht_key(&self) -> String {
        dht_key(&self.id)
    }
}

/// DHT key for an assertion id: `dag:<id>`.
pub fn dht_key(id: &str) -> String {
    format!("dag:{}", id)
}

/// Rumor text must be non-empty and at most [`MAX_RUMOR_CHARS`] characters.
pub fn validate_rumor_text(text: &str) -> Result<(), HearsayError> {
    if text.is_empty() || text.chars().count() > MAX_RUMOR_CHARS {
        return Err(HearsayError::Validation(format!(
            "Rumor text is required and must be <= {} chars",
            MAX_RUMOR_CHARS
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rumor_text_limits() {
        assert!(AssertionNode::rumor("alice", "", None).is_err());
        assert!(AssertionNode::rumor("alice", &"x".repeat(500), None).is_ok());
        assert!(AssertionNode::rumor("alice", &"x".repeat(501), None).is_err());
        assert!(AssertionNode::rumor("", "hi", None).is_err());
    }

    #[test]
    fn vote_value_must_be_unit() {
        assert!(AssertionNode::vote("r1", "bob", 1, None).is_ok());
        assert!(AssertionNode::vote("r1", "bob", -1, None).is_ok());
        assert!(matches!(
            AssertionNode::vote("r1", "bob", 0, None),
            Err(HearsayError::Validation(_))
        ));
        assert!(AssertionNode::vote("r1", "bob", 2, None).is_err());
    }

    #[test]
    fn wire_format_uses_camel_case_and_integer_votes() {
        let vote = AssertionNode::vote("r1", "bob", -1, Some("source".into())).unwrap();
        let json = serde_json::to_value(&vote).unwrap();
        assert_eq!(json["type"], "VOTE");
        assert_eq!(json["vote"], -1);
        assert_eq!(json["parentId"], "r1");
        assert_eq!(json["voterId"], "bob");

        let back: AssertionNode = serde_json::from_value(json).unwrap();
        assert_eq!(back, vote);
    }

    #[test]
    fn out_of_range_vote_fails_to_decode() {
        let json = serde_json::json!({
            "id": "v", "type": "VOTE", "vote": 3, "timestamp": 0
        });
        assert!(serde_json::from_value::<AssertionNode>(json).is_err());
    }

    #[test]
    fn actor_id_follows_kind() {
        let rumor = AssertionNode::rumor("alice", "text", None).unwrap();
        assert_eq!(rumor.actor_id(), Some("alice"));
        assert_eq!(rumor.dht_key(), format!("dag:{}", rumor.id));
    }
}
