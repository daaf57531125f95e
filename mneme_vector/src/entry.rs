use mneme_core::Id;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// One indexed vector and the payload carried alongside it (§4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: Id,
    pub vector: Vec<f32>,
    pub metadata: Json,
    pub text: String,
}

/// The on-disk shape of one `entries.jsonl` line — everything but the
/// vector itself, which lives in the companion `vectors.bin` (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct EntryRecord {
    pub id: Id,
    pub metadata: Json,
    pub text: String,
    /// Offset of this entry's vector, in vector-count units, into
    /// `vectors.bin`. Stable for the entry's lifetime; `optimize()`
    /// rewrites both files together to keep it so.
    pub vector_slot: u64,
}

/// A scored hit returned by a search (§4.4: "Returned similarity score is
/// `1 - cosine_distance`, in `[0,1]`").
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub entry: VectorEntry,
    pub score: f64,
}

/// `score(a, b)` in `[-1, 1]`; `0.0` if either vector is zero-magnitude or
/// the two differ in dimensionality. Mirrors the retrieval engine's own
/// cosine primitive so both layers agree on a score for the same pair.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut mag_a = 0.0_f64;
    let mut mag_b = 0.0_f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = f64::from(*x);
        let y = f64::from(*y);
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }

    let denom = mag_a.sqrt() * mag_b.sqrt();
    if denom < f64::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_score_one() {
        let v = [1.0_f32, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        let a = [1.0_f32, 0.0];
        let b = [0.0_f32, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-9);
    }

    #[test]
    fn mismatched_dimensions_score_zero() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0])).abs() < 1e-9);
    }
}
