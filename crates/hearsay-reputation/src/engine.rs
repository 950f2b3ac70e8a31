// crates/hearsay-reputation/src/engine.rs
//
// TrustEngine: reads the assertion graph and user records through the store
// traits, recomputes reputations wholesale, and scores the feed on demand.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use hearsay_core::traits::{AssertionStore, UserStore};
use hearsay_core::{time, AssertionKind, AssertionNode, HearsayError};

use crate::decay::{RecencyDecay, DEFAULT_DECAY_LAMBDA};
use crate::scoring::{self, FeedItem};
use crate::trust_matrix::{AgreementCounts, DEFAULT_ITERATIONS};

/// Tunables for the trust engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustConfig {
    /// Power-iteration rounds. Default: 10.
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Recency decay per hour. Default: 0.03.
    #[serde(default = "default_decay_lambda")]
    pub decay_lambda: f64,
}

fn default_iterations() -> usize {
    DEFAULT_ITERATIONS
}

fn default_decay_lambda() -> f64 {
    DEFAULT_DECAY_LAMBDA
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            decay_lambda: default_decay_lambda(),
        }
    }
}

/// Outcome of one consensus tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusTick {
    pub reputations: HashMap<String, f64>,
    pub feed_length: usize,
}

/// One cell of the trust report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustCell {
    pub user_id: String,
    pub c: f64,
    pub agree: u32,
    pub total: u32,
}

/// One row of the trust report: everything `from` thinks of the others.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustRow {
    pub from: String,
    pub to: Vec<TrustCell>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserReputation {
    pub id: String,
    pub reputation: f64,
}

/// Debug view of the full trust computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustReport {
    pub users: Vec<UserReputation>,
    pub matrix: Vec<TrustRow>,
}

/// Reputation and feed computation over the local replicated state.
#[derive(Clone)]
pub struct TrustEngine {
    assertions: Arc<dyn AssertionStore>,
    users: Arc<dyn UserStore>,
    config: TrustConfig,
}

impl TrustEngine {
    pub fn new(
        assertions: Arc<dyn AssertionStore>,
        users: Arc<dyn UserStore>,
        config: TrustConfig,
    ) -> Self {
        Self {
            assertions,
            users,
            config,
        }
    }

    fn decay(&self) -> RecencyDecay {
        RecencyDecay::new(self.config.decay_lambda)
    }

    /// Rumors plus their votes, grouped by rumor id. Orphan votes are left out.
    async fn rumors_with_votes(
        &self,
    ) -> Result<(Vec<AssertionNode>, HashMap<String, Vec<AssertionNode>>), HearsayError> {
        let rumors = self.assertions.list_by_kind(AssertionKind::Rumor).await?;
        let votes = self.assertions.list_by_kind(AssertionKind::Vote).await?;

        let mut by_rumor: HashMap<String, Vec<AssertionNode>> = rumors
            .iter()
            .map(|r| (r.id.clone(), Vec::new()))
            .collect();
        for vote in votes {
            if let Some(bucket) = vote.parent_id.as_ref().and_then(|p| by_rumor.get_mut(p)) {
                bucket.push(vote);
            }
        }
        Ok((rumors, by_rumor))
    }

    /// Build the agreement counts over every known user.
    pub async fn agreement_counts(&self) -> Result<AgreementCounts, HearsayError> {
        let mut user_ids: Vec<String> = self
            .users
            .list_all()
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect();
        user_ids.sort();

        let (_, by_rumor) = self.rumors_with_votes().await?;
        Ok(AgreementCounts::from_vote_groups(
            user_ids,
            by_rumor.values().map(Vec::as_slice),
        ))
    }

    /// Compute the reputation distribution without persisting it.
    pub async fn compute_reputations(&self) -> Result<HashMap<String, f64>, HearsayError> {
        let counts = self.agreement_counts().await?;
        Ok(counts
            .local_trust()
            .compute_global_trust(self.config.iterations))
    }

    /// Recompute and persist every user's reputation.
    pub async fn apply_reputation(&self) -> Result<HashMap<String, f64>, HearsayError> {
        let reputations = self.compute_reputations().await?;
        self.users.set_reputations(&reputations).await?;
        Ok(reputations)
    }

    /// Every rumor, scored with the stored reputations, best first.
    pub async fn feed(&self) -> Result<Vec<FeedItem>, HearsayError> {
        let reputations: HashMap<String, f64> = self
            .users
            .list_all()
            .await?
            .into_iter()
            .map(|u| (u.id, u.reputation))
            .collect();
        let (rumors, by_rumor) = self.rumors_with_votes().await?;

        Ok(scoring::build_feed(
            &rumors,
            &by_rumor,
            &reputations,
            time::now_secs(),
            &self.decay(),
        ))
    }

    /// Score a single rumor on demand.
    pub async fn score(&self, rumor_id: &str) -> Result<Option<f64>, HearsayError> {
        let Some(rumor) = self.assertions.get(rumor_id).await? else {
            return Ok(None);
        };
        if !rumor.is_rumor() {
            return Ok(None);
        }
        let votes = self.assertions.list_votes_for_parent(rumor_id).await?;
        let reputations: HashMap<String, f64> = self
            .users
            .list_all()
            .await?
            .into_iter()
            .map(|u| (u.id, u.reputation))
            .collect();
        Ok(Some(scoring::rumor_score(
            &rumor,
            &votes,
            &reputations,
            time::now_secs(),
            &self.decay(),
        )))
    }

    /// Recompute reputations, then rescore the feed.
    pub async fn run_consensus_tick(&self) -> Result<ConsensusTick, HearsayError> {
        let reputations = self.apply_reputation().await?;
        let feed = self.feed().await?;
        tracing::debug!(
            "Consensus tick: {} users, {} rumors",
            reputations.len(),
            feed.len()
        );
        Ok(ConsensusTick {
            reputations,
            feed_length: feed.len(),
        })
    }

    /// Full matrix dump for debugging, without persisting anything.
    pub async fn trust_report(&self) -> Result<TrustReport, HearsayError> {
        let counts = self.agreement_counts().await?;
        let matrix = counts.local_trust();
        let reputations = matrix.compute_global_trust(self.config.iterations);

        let rows = counts
            .user_ids
            .iter()
            .enumerate()
            .map(|(i, from)| TrustRow {
                from: from.clone(),
                to: counts
                    .user_ids
                    .iter()
                    .enumerate()
                    .map(|(j, to)| TrustCell {
                        user_id: to.clone(),
                        c: matrix.c[i][j],
                        agree: counts.agree[i][j],
                        total: counts.total[i][j],
                    })
                    .collect(),
            })
            .collect();

        let users = counts
            .user_ids
            .iter()
            .map(|id| UserReputation {
                id: id.clone(),
                reputation: reputations.get(id).copied().unwrap_or(0.0),
            })
            .collect();

        Ok(TrustReport {
            users,
            matrix: rows,
        })
    }
}
