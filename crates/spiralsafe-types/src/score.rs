// ─────────────────────────────────────────────────────────────────────
// SpiralSafe — Coherence Score Types
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

/// Clamp a value to [lo, hi], mapping NaN to lo and Inf to nearest bound.
#[inline]
pub fn clamp_score(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        log::warn!("clamp_score: NaN detected, clamping to {lo:.4}");
        return lo;
    }
    if value.is_infinite() {
        let boundary = if value > 0.0 { hi } else { lo };
        log::warn!("clamp_score: Inf detected, clamping to {boundary:.4}");
        return boundary;
    }
    value.clamp(lo, hi)
}

/// The four surface statistics of a text sample.
///
/// Each field is computed independently from the same text; none reads
/// another's value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoherenceMetrics {
    /// Circularity: share of repeated word bigrams, in [0, 1].
    pub curl: f64,
    /// Unresolved expansion: normalised sentence-length variance, in [0, 1].
    pub divergence: f64,
    /// Latent structure: unique words / total words, in [0, 1].
    pub potential: f64,
    /// Information density: normalised character entropy, in [0, 1].
    pub entropy: f64,
}

impl CoherenceMetrics {
    /// Build a metrics record, clamping each field into [0, 1].
    pub fn new(curl: f64, divergence: f64, potential: f64, entropy: f64) -> Self {
        Self {
            curl: clamp_score(curl, 0.0, 1.0),
            divergence: clamp_score(divergence, 0.0, 1.0),
            potential: clamp_score(potential, 0.0, 1.0),
            entropy: clamp_score(entropy, 0.0, 1.0),
        }
    }

    /// The metrics that score exactly 100 under the default weights.
    pub fn ideal() -> Self {
        Self {
            curl: 0.0,
            divergence: 0.2,
            potential: 1.0,
            entropy: 1.0,
        }
    }
}

/// Metrics plus the composite score derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoherenceResult {
    pub metrics: CoherenceMetrics,
    /// Composite coherence score in [0, 100].
    pub score: f64,
}

impl CoherenceResult {
    pub fn new(metrics: CoherenceMetrics, score: f64) -> Self {
        Self {
            metrics,
            score: clamp_score(score, 0.0, 100.0),
        }
    }

    /// Whether the score reaches the given snap-in threshold.
    pub fn snapped_in(&self, threshold: f64) -> bool {
        self.score >= threshold
    }
}
