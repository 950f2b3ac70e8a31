// crates/hearsay-reputation/src/scoring.rs
//
// Per-rumor trust scores and feed construction.
//
// score = (sum(vote * rep) / sum(rep)) * decay(age) over the rumor's votes.
// A rumor without votes (or whose voters all carry zero weight) scores the
// neutral 0.5 and is not decayed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use hearsay_core::user::INITIAL_REPUTATION;
use hearsay_core::AssertionNode;

use crate::decay::RecencyDecay;

/// Score of a rumor nobody has voted on.
pub const NEUTRAL_SCORE: f64 = 0.5;
/// Scores strictly above this are VERIFIED.
pub const VERIFIED_THRESHOLD: f64 = 0.7;
/// Scores strictly below this are DISPUTED.
pub const DISPUTED_THRESHOLD: f64 = 0.3;

/// Display classification of a scored rumor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustState {
    Verified,
    Disputed,
    Neutral,
}

impl TrustState {
    pub fn classify(score: f64) -> Self {
        if score > VERIFIED_THRESHOLD {
            TrustState::Verified
        } else if score < DISPUTED_THRESHOLD {
            TrustState::Disputed
        } else {
            TrustState::Neutral
        }
    }
}

/// A rumor with its current score, as rendered by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub id: String,
    pub text: Option<String>,
    pub author_id: Option<String>,
    pub parent_id: Option<String>,
    pub timestamp: i64,
    pub score: f64,
    pub state: TrustState,
}

/// Reputation-weighted, decayed score of one rumor.
///
/// Voters missing from `reputations` weigh [`INITIAL_REPUTATION`].
pub fn rumor_score(
    rumor: &AssertionNode,
    votes: &[AssertionNode],
    reputations: &HashMap<String, f64>,
    now_secs: i64,
    decay: &RecencyDecay,
) -> f64 {
    let mut num = 0.0;
    let mut den = 0.0;
    for vote in votes {
        let Some(value) = vote.vote else {
            continue;
        };
        let rep = vote
            .voter_id
            .as_deref()
            .and_then(|id| reputations.get(id))
            .copied()
            .unwrap_or(INITIAL_REPUTATION);
        num += value.as_f64() * rep;
        den += rep;
    }

    if den == 0.0 {
        return NEUTRAL_SCORE;
    }

    decay.apply(num / den, now_secs - rumor.timestamp)
}

/// Score every rumor and sort descending by score.
pub fn build_feed(
    rumors: &[AssertionNode],
    votes_by_rumor: &HashMap<String, Vec<AssertionNode>>,
    reputations: &HashMap<String, f64>,
    now_secs: i64,
    decay: &RecencyDecay,
) -> Vec<FeedItem> {
    let mut items: Vec<FeedItem> = rumors
        .iter()
        .map(|rumor| {
            let votes = votes_by_rumor
                .get(&rumor.id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let score = rumor_score(rumor, votes, reputations, now_secs, decay);
            FeedItem {
                id: rumor.id.clone(),
                text: rumor.text.clone(),
                author_id: rumor.author_id.clone(),
                parent_id: rumor.parent_id.clone(),
                timestamp: rumor.timestamp,
                score,
                state: TrustState::classify(score),
            }
        })
        .collect();

    items.sort_by(|a, b| b.score.total_cmp(&a.score));
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rumor_at(ts: i64) -> AssertionNode {
        let mut rumor = AssertionNode::rumor("author", "claim", None).unwrap();
        rumor.timestamp = ts;
        rumor
    }

    fn vote(rumor: &AssertionNode, voter: &str, value: i64) -> AssertionNode {
        AssertionNode::vote(&rumor.id, voter, value, None).unwrap()
    }

    #[test]
    fn classification_thresholds() {
        assert_eq!(TrustState::classify(0.71), TrustState::Verified);
        assert_eq!(TrustState::classify(0.7), TrustState::Neutral);
        assert_eq!(TrustState::classify(0.5), TrustState::Neutral);
        assert_eq!(TrustState::classify(0.3), TrustState::Neutral);
        assert_eq!(TrustState::classify(0.29), TrustState::Disputed);
        assert_eq!(TrustState::classify(-1.0), TrustState::Disputed);
    }

    #[test]
    fn no_votes_is_neutral_and_undecayed() {
        let now = 1_000_000;
        let rumor = rumor_at(now - 100 * 3600);
        let score = rumor_score(&rumor, &[], &HashMap::new(), now, &RecencyDecay::default());
        assert_eq!(score, NEUTRAL_SCORE);
    }

    #[test]
    fn weighted_average_uses_reputation() {
        let now = 1_000_000;
        let rumor = rumor_at(now);
        let votes = vec![vote(&rumor, "heavy", 1), vote(&rumor, "light", -1)];
        let mut reps = HashMap::new();
        reps.insert("heavy".to_string(), 0.75);
        reps.insert("light".to_string(), 0.25);

        let score = rumor_score(&rumor, &votes, &reps, now, &RecencyDecay::default());
        assert!((score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn unknown_voter_gets_initial_weight() {
        let now = 1_000_000;
        let rumor = rumor_at(now);
        let votes = vec![vote(&rumor, "known", -1), vote(&rumor, "unknown", 1)];
        let mut reps = HashMap::new();
        reps.insert("known".to_string(), 0.1);

        let score = rumor_score(&rumor, &votes, &reps, now, &RecencyDecay::default());
        assert!(score.abs() < 1e-12);
    }

    #[test]
    fn zero_weight_voters_fall_back_to_neutral() {
        let now = 1_000_000;
        let rumor = rumor_at(now);
        let votes = vec![vote(&rumor, "ghost", 1)];
        let mut reps = HashMap::new();
        reps.insert("ghost".to_string(), 0.0);
        let score = rumor_score(&rumor, &votes, &reps, now, &RecencyDecay::default());
        assert_eq!(score, NEUTRAL_SCORE);
    }

    #[test]
    fn older_rumor_scores_below_fresh_one() {
        let now = 10_000_000;
        let old = rumor_at(now - 48 * 3600);
        let fresh = rumor_at(now);
        let decay = RecencyDecay::default();
        let reps = HashMap::new();

        let old_score = rumor_score(&old, &[vote(&old, "v", 1)], &reps, now, &decay);
        let fresh_score = rumor_score(&fresh, &[vote(&fresh, "v", 1)], &reps, now, &decay);

        assert!((fresh_score - 1.0).abs() < 1e-12);
        assert!((old_score - 0.237).abs() < 1e-3);
        assert!(old_score < fresh_score);
    }

    #[test]
    fn feed_is_sorted_descending() {
        let now = 1_000_000;
        let up = rumor_at(now);
        let down = rumor_at(now);
        let quiet = rumor_at(now);

        let mut votes = HashMap::new();
        votes.insert(up.id.clone(), vec![vote(&up, "v", 1)]);
        votes.insert(down.id.clone(), vec![vote(&down, "v", -1)]);

        let feed = build_feed(
            &[down.clone(), quiet.clone(), up.clone()],
            &votes,
            &HashMap::new(),
            now,
            &RecencyDecay::default(),
        );

        let order: Vec<&str> = feed.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(order, vec![up.id.as_str(), quiet.id.as_str(), down.id.as_str()]);
        assert_eq!(feed[0].state, TrustState::Verified);
        assert_eq!(feed[1].state, TrustState::Neutral);
        assert_eq!(feed[2].state, TrustState::Disputed);
    }
}
