// ─────────────────────────────────────────────────────────────────────
// SpiralSafe — Coherence Scorer
// ─────────────────────────────────────────────────────────────────────
//! Combines the four coherence sub-metrics into one score in [0, 100].
//!
//! ```text
//! score = (1 - w_curl·curl
//!            - w_div·|divergence - target|
//!            - w_pot·(1 - potential)
//!            - w_ent·(1 - entropy)) × 100
//! ```
//!
//! With the default weights (0.4, 0.3, 0.2, 0.1) and target 0.2 the
//! ideal metrics map to exactly 100. The result is clamped into
//! [0, 100]; non-finite intermediates clamp like any other value.
//!
//! Every implementation of this formula must agree with this one to
//! within 1e-6 on the shared conformance corpus.

use spiralsafe_types::score::clamp_score;
use spiralsafe_types::{CoherenceMetrics, CoherenceResult, GateConfig};

use crate::metrics::{join_fields, MetricExtractor};

/// Weighted coherence scorer. Stateless apart from its configuration.
#[derive(Debug, Clone, Default)]
pub struct CoherenceScorer {
    config: GateConfig,
    extractor: MetricExtractor,
}

impl CoherenceScorer {
    pub fn new(config: GateConfig) -> Self {
        Self {
            extractor: MetricExtractor::new(config.clone()),
            config,
        }
    }

    /// Raw weighted formula before clamping, as a fraction of 1.
    pub fn raw(&self, m: &CoherenceMetrics) -> f64 {
        let c = &self.config;
        1.0 - m.curl * c.w_curl
            - (m.divergence - c.divergence_target).abs() * c.w_divergence
            - (1.0 - m.potential) * c.w_potential
            - (1.0 - m.entropy) * c.w_entropy
    }

    /// Score a metrics record into [0, 100].
    pub fn score(&self, metrics: &CoherenceMetrics) -> f64 {
        clamp_score(self.raw(metrics) * 100.0, 0.0, 100.0)
    }

    /// Extract metrics from `text` and score them.
    pub fn analyze(&self, text: &str) -> CoherenceResult {
        let metrics = self.extractor.extract(text);
        let score = self.score(&metrics);
        log::debug!(
            "coherence: curl={:.4} div={:.4} pot={:.4} ent={:.4} → {score:.2}",
            metrics.curl,
            metrics.divergence,
            metrics.potential,
            metrics.entropy,
        );
        CoherenceResult::new(metrics, score)
    }

    /// Score several labelled fields as one newline-joined sample.
    pub fn analyze_fields(&self, fields: &[&str]) -> CoherenceResult {
        self.analyze(&join_fields(fields))
    }

    pub fn extractor(&self) -> &MetricExtractor {
        &self.extractor
    }

    /// Read-only access to config.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }
}
