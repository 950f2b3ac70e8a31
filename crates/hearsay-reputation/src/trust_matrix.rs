// crates/hearsay-reputation/src/trust_matrix.rs
//
// Trust matrix: C[i][j] local trust values between users for the Hearsay
// network, and the EigenTrust aggregation into a global distribution.
//
// Local trust is the fraction of shared rumors on which two users cast the
// same vote. Each row is normalized so a user's outgoing trust sums to 1.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use hearsay_core::AssertionNode;

/// Default number of power-iteration rounds.
pub const DEFAULT_ITERATIONS: usize = 10;

/// Pairwise vote agreement between users.
///
/// `agree[i][j]` counts rumors where users i and j cast the same vote,
/// `total[i][j]` counts rumors where both voted. Both matrices are symmetric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgreementCounts {
    /// User ids in matrix order.
    pub user_ids: Vec<String>,
    pub agree: Vec<Vec<u32>>,
    pub total: Vec<Vec<u32>>,
}

impl AgreementCounts {
    /// Count agreement over the votes of each rumor.
    ///
    /// Each element of `vote_groups` holds the votes cast on one rumor. Votes
    /// from users outside `user_ids` are ignored. When a user voted more than
    /// once on the same rumor, only their latest vote counts.
    pub fn from_vote_groups<'a, I>(user_ids: Vec<String>, vote_groups: I) -> Self
    where
        I: IntoIterator<Item = &'a [AssertionNode]>,
    {
        let n = user_ids.len();
        let index: HashMap<&str, usize> = user_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut agree = vec![vec![0u32; n]; n];
        let mut total = vec![vec![0u32; n]; n];

        for votes in vote_groups {
            // Latest vote per known voter on this rumor.
            let mut latest: HashMap<usize, &AssertionNode> = HashMap::new();
            for vote in votes {
                let (Some(voter), Some(_)) = (vote.voter_id.as_deref(), vote.vote) else {
                    continue;
                };
                let Some(&idx) = index.get(voter) else {
                    continue;
                };
                let replace = match latest.get(&idx) {
                    Some(prev) => (vote.timestamp, &vote.id) > (prev.timestamp, &prev.id),
                    None => true,
                };
                if replace {
                    latest.insert(idx, vote);
                }
            }

            let mut cast: Vec<(usize, &AssertionNode)> = latest.into_iter().collect();
            cast.sort_by_key(|(idx, _)| *idx);

            for a in 0..cast.len() {
                for b in (a + 1)..cast.len() {
                    let (i, vi) = cast[a];
                    let (j, vj) = cast[b];
                    total[i][j] += 1;
                    total[j][i] += 1;
                    if vi.vote == vj.vote {
                        agree[i][j] += 1;
                        agree[j][i] += 1;
                    }
                }
            }
        }

        Self {
            user_ids,
            agree,
            total,
        }
    }

    /// Build the row-normalized local trust matrix.
    pub fn local_trust(&self) -> TrustMatrix {
        let n = self.user_ids.len();

        // Step 1: C[i][j] = agree / total where the pair has shared rumors
        let mut c = vec![vec![0.0_f64; n]; n];
        for i in 0..n {
            for j in 0..n {
                if self.total[i][j] > 0 {
                    c[i][j] = self.agree[i][j] as f64 / self.total[i][j] as f64;
                }
            }
        }

        // Step 2: Row-normalize; if row is all zeros, use uniform
        for row in c.iter_mut() {
            let row_sum: f64 = row.iter().sum();
            if row_sum > 0.0 {
                for value in row.iter_mut() {
                    *value /= row_sum;
                }
            } else {
                // A user with no observed agreement trusts everyone equally
                for value in row.iter_mut() {
                    *value = 1.0 / n as f64;
                }
            }
        }

        TrustMatrix {
            user_ids: self.user_ids.clone(),
            c,
        }
    }

    pub fn index_of(&self, user_id: &str) -> Option<usize> {
        self.user_ids.iter().position(|id| id == user_id)
    }
}

/// A dense, row-stochastic local trust matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustMatrix {
    /// User ids in matrix order.
    pub user_ids: Vec<String>,
    /// C[i][j]: share of user i's trust placed on user j.
    pub c: Vec<Vec<f64>>,
}

impl TrustMatrix {
    /// Trust from user `from` to user `to`; 0.0 for unknown users.
    pub fn get_trust(&self, from: &str, to: &str) -> f64 {
        let i = self.user_ids.iter().position(|id| id == from);
        let j = self.user_ids.iter().position(|id| id == to);
        match (i, j) {
            (Some(i), Some(j)) => self.c[i][j],
            _ => 0.0,
        }
    }

    /// Compute global trust scores using EigenTrust power iteration.
    ///
    /// Starts from the uniform distribution and runs exactly `iterations`
    /// rounds of `t[j] = sum_i(C[i][j] * t[i])`, renormalizing to sum 1
    /// after each round. There is no early exit on convergence.
    pub fn compute_global_trust(&self, iterations: usize) -> HashMap<String, f64> {
        let n = self.user_ids.len();
        if n == 0 {
            return HashMap::new();
        }

        let mut t = vec![1.0 / n as f64; n];

        for _ in 0..iterations {
            let mut t_new = vec![0.0_f64; n];
            for (i, row) in self.c.iter().enumerate() {
                for (j, value) in row.iter().enumerate() {
                    t_new[j] += value * t[i];
                }
            }

            let mut sum: f64 = t_new.iter().sum();
            if sum == 0.0 {
                sum = 1.0;
            }
            t = t_new.into_iter().map(|v| v / sum).collect();
        }

        self.user_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), t[i]))
            .collect()
    }
}
