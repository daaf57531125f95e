use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Weighted composite ranking used by `retrieve_context` (§4.5.2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalWeights {
    pub similarity: f64,
    pub recency: f64,
    pub importance: f64,
    /// Decay timescale in days for [`recency_decay`].
    pub tau_days: f64,
}

impl Default for RetrievalWeights {
    fn default() -> Self {
        Self {
            similarity: 0.65,
            recency: 0.25,
            importance: 0.10,
            tau_days: 14.0,
        }
    }
}

impl RetrievalWeights {
    /// §4.5.2: the three weights must sum to 1.0 within a `[0.99, 1.01]`
    /// tolerance, validated once at config load rather than per call.
    pub fn validate(self) -> Result<Self, String> {
        let sum = self.similarity + self.recency + self.importance;
        if !(0.99..=1.01).contains(&sum) {
            return Err(format!("retrieval weights must sum to ~1.0, got {sum}"));
        }
        Ok(self)
    }
}

/// `exp(-Δt / τ)`, Δt in days.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn recency_decay(happened_at: DateTime<Utc>, now: DateTime<Utc>, tau_days: f64) -> f64 {
    let delta_days = (now - happened_at).num_seconds().max(0) as f64 / 86_400.0;
    (-delta_days / tau_days).exp()
}

/// `(importance - 1) / 4`, mapping the `1..=5` scale onto `[0.0, 1.0]`.
#[must_use]
pub fn normalized_importance(importance: i32) -> f64 {
    (f64::from(importance) - 1.0) / 4.0
}

/// The composite retrieval score (§4.5.2 step 3).
#[must_use]
pub fn retrieval_score(
    similarity: f64,
    happened_at: DateTime<Utc>,
    now: DateTime<Utc>,
    importance: i32,
    weights: RetrievalWeights,
) -> f64 {
    weights.similarity * similarity
        + weights.recency * recency_decay(happened_at, now, weights.tau_days)
        + weights.importance * normalized_importance(importance)
}

/// `sha256("{category}:{content}")`, the exact-content dedup key (§4.5.5),
/// computed independently of `mneme_store`'s private helper of the same
/// name so the memory service can look an item up by hash before deciding
/// whether to insert or reinforce.
#[must_use]
pub fn content_hash(category: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(category.as_bytes());
    hasher.update(b":");
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recency_decay_is_one_at_zero_delta() {
        let now = Utc::now();
        assert!((recency_decay(now, now, 14.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn recency_decay_shrinks_with_age() {
        let now = Utc::now();
        let week_old = now - chrono::Duration::days(7);
        let month_old = now - chrono::Duration::days(30);
        assert!(recency_decay(week_old, now, 14.0) > recency_decay(month_old, now, 14.0));
    }

    #[test]
    fn normalized_importance_maps_one_to_five_onto_unit_range() {
        assert!((normalized_importance(1) - 0.0).abs() < 1e-9);
        assert!((normalized_importance(5) - 1.0).abs() < 1e-9);
        assert!((normalized_importance(3) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn default_weights_sum_to_one() {
        assert!(RetrievalWeights::default().validate().is_ok());
    }

    #[test]
    fn unbalanced_weights_are_rejected() {
        let weights = RetrievalWeights {
            similarity: 0.5,
            recency: 0.5,
            importance: 0.5,
            tau_days: 14.0,
        };
        assert!(weights.validate().is_err());
    }

    #[test]
    fn content_hash_is_stable_and_category_sensitive() {
        let a = content_hash("user_defined", "my dog's name is buddy");
        let b = content_hash("user_defined", "my dog's name is buddy");
        let c = content_hash("conversation", "my dog's name is buddy");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
