// crates/hearsay-reputation/src/decay.rs
//
// Time-decay for rumor trust scores.
//
// A rumor's score fades as it ages so the feed favors fresh, well-supported
// claims: factor = exp(-lambda * age_in_hours).

use serde::{Deserialize, Serialize};

/// Default decay constant, per hour.
pub const DEFAULT_DECAY_LAMBDA: f64 = 0.03;

/// Exponential recency decay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecencyDecay {
    /// Decay rate per hour of age.
    pub lambda_per_hour: f64,
}

impl Default for RecencyDecay {
    fn default() -> Self {
        Self {
            lambda_per_hour: DEFAULT_DECAY_LAMBDA,
        }
    }
}

impl RecencyDecay {
    pub fn new(lambda_per_hour: f64) -> Self {
        Self { lambda_per_hour }
    }

    /// Multiplier for an item that is `age_secs` old.
    ///
    /// Timestamps from the future (peer clock skew) count as age zero, so the
    /// factor never exceeds 1.
    pub fn factor(&self, age_secs: i64) -> f64 {
        let hours = age_secs.max(0) as f64 / 3600.0;
        (-self.lambda_per_hour * hours).exp()
    }

    /// Apply the decay to `value`.
    pub fn apply(&self, value: f64, age_secs: i64) -> f64 {
        value * self.factor(age_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_items_do_not_decay() {
        let decay = RecencyDecay::default();
        assert!((decay.factor(0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn forty_eight_hours_matches_closed_form() {
        let decay = RecencyDecay::default();
        let factor = decay.factor(48 * 3600);
        assert!((factor - (-0.03_f64 * 48.0).exp()).abs() < 1e-12);
        assert!((factor - 0.237).abs() < 1e-3);
    }

    #[test]
    fn future_timestamps_clamp_to_now() {
        let decay = RecencyDecay::default();
        assert!((decay.factor(-3600) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn apply_scales_value() {
        let decay = RecencyDecay::new(1.0);
        let result = decay.apply(2.0, 3600);
        assert!((result - 2.0 * (-1.0_f64).exp()).abs() < 1e-12);
    }
}
