// ─────────────────────────────────────────────────────────────────────
// SpiralSafe — Coherence Field Extraction
// ─────────────────────────────────────────────────────────────────────
//! Turns a text sample into the four coherence sub-metrics.
//!
//! - **curl**: share of word bigrams that are repeats (circularity).
//! - **divergence**: normalised variance of sentence lengths.
//! - **potential**: unique words / total words.
//! - **entropy**: Shannon entropy of the lowercased character
//!   distribution, divided by `log2(alphabet)`.
//!
//! Every metric is a total function of the text. Denominators use
//! `max(count, 1)`, so empty and whitespace-only input yield a
//! degenerate but well-defined record.

use std::collections::{BTreeMap, HashSet};

use spiralsafe_types::{CoherenceMetrics, DivergenceNormalization, GateConfig};

/// Entropy reported for empty text.
const NEUTRAL_ENTROPY: f64 = 0.5;

/// Join several labelled text fields (input, output, reasoning...)
/// into one sample, newline-separated.
pub fn join_fields(fields: &[&str]) -> String {
    fields.join("\n")
}

/// Fraction of repeated adjacent-word bigrams.
///
/// `1 - unique / max(total, 1)`: a text with fewer than two words has
/// no bigrams and scores 1.0.
pub fn curl(words: &[&str]) -> f64 {
    let total = words.len().saturating_sub(1);
    let unique: HashSet<(&str, &str)> = words.windows(2).map(|w| (w[0], w[1])).collect();
    1.0 - unique.len() as f64 / total.max(1) as f64
}

/// Lexical diversity: `unique / max(total, 1)`.
pub fn potential(words: &[&str]) -> f64 {
    let unique: HashSet<&str> = words.iter().copied().collect();
    unique.len() as f64 / words.len().max(1) as f64
}

/// Word counts of the non-blank sentences in `text`, split on any
/// character in `terminators`.
pub fn sentence_lengths(text: &str, terminators: &str) -> Vec<usize> {
    text.split(|c: char| terminators.contains(c))
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.split_whitespace().count())
        .collect()
}

/// Raw Shannon entropy (bits) of the lowercased character distribution.
///
/// Returns `None` for empty text. Counts are kept in an ordered map so
/// the summation order, and therefore the result, is bit-stable.
pub fn char_entropy_bits(text: &str) -> Option<f64> {
    let mut counts: BTreeMap<char, usize> = BTreeMap::new();
    for c in text.to_lowercase().chars() {
        *counts.entry(c).or_insert(0) += 1;
    }
    let total: usize = counts.values().sum();
    if total == 0 {
        return None;
    }
    let total = total as f64;
    let h = -counts
        .values()
        .map(|&c| {
            let p = c as f64 / total;
            p * p.log2()
        })
        .sum::<f64>();
    Some(h)
}

/// Extracts `CoherenceMetrics` under a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct MetricExtractor {
    config: GateConfig,
}

impl MetricExtractor {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    /// Compute all four metrics for `text`.
    pub fn extract(&self, text: &str) -> CoherenceMetrics {
        let words: Vec<&str> = text.split_whitespace().collect();
        CoherenceMetrics::new(
            curl(&words),
            self.divergence(text),
            potential(&words),
            self.entropy(text),
        )
    }

    /// Sentence-length divergence.
    ///
    /// Fewer than two sentences carry no variance signal and report the
    /// configured target, which the scorer treats as neutral.
    pub fn divergence(&self, text: &str) -> f64 {
        let lengths = sentence_lengths(text, &self.config.sentence_terminators);
        if lengths.len() < 2 {
            return self.config.divergence_target;
        }
        let n = lengths.len() as f64;
        let mean = lengths.iter().map(|&l| l as f64).sum::<f64>() / n;
        let variance = lengths
            .iter()
            .map(|&l| (l as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        let raw = match self.config.divergence_normalization {
            DivergenceNormalization::Dispersion => variance / mean.max(1.0),
            DivergenceNormalization::FixedScale { scale } => variance / scale,
        };
        raw.min(1.0)
    }

    /// Normalised character entropy in [0, 1].
    pub fn entropy(&self, text: &str) -> f64 {
        match char_entropy_bits(text) {
            Some(bits) => (bits / self.config.entropy_divisor()).min(1.0),
            None => NEUTRAL_ENTROPY,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }
}
