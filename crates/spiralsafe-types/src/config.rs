// ─────────────────────────────────────────────────────────────────────
// SpiralSafe — Gate Kernel Configuration
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::error::{SpiralError, SpiralResult};
use crate::phase::Phase;

/// How the sentence-length variance is mapped into `divergence`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DivergenceNormalization {
    /// Index of dispersion: `variance / mean`.
    #[default]
    Dispersion,
    /// `variance / scale`. A scale of 100 matches the legacy Python
    /// circuit validator.
    FixedScale { scale: f64 },
}

/// Minimum coherence score per phase, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseThresholds {
    pub kenl: f64,
    pub awi: f64,
    pub atom: f64,
    pub saif: f64,
    pub spiral: f64,
}

impl Default for PhaseThresholds {
    fn default() -> Self {
        Self {
            kenl: 28.0,
            awi: 42.0,
            atom: 60.0,
            saif: 70.0,
            spiral: 70.0,
        }
    }
}

impl PhaseThresholds {
    pub fn get(&self, phase: Phase) -> f64 {
        match phase {
            Phase::Kenl => self.kenl,
            Phase::Awi => self.awi,
            Phase::Atom => self.atom,
            Phase::Saif => self.saif,
            Phase::Spiral => self.spiral,
        }
    }
}

/// Immutable configuration shared by the extractor, scorer, evaluator
/// and pipeline runner.
///
/// Passed explicitly rather than read from process-wide constants so
/// that conformance harnesses can run identical or deliberately
/// divergent configurations side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Penalty weight for circular reasoning. Default: 0.4.
    pub w_curl: f64,

    /// Penalty weight for distance from the divergence target. Default: 0.3.
    pub w_divergence: f64,

    /// Penalty weight for missing lexical diversity. Default: 0.2.
    pub w_potential: f64,

    /// Penalty weight for missing information density. Default: 0.1.
    pub w_entropy: f64,

    /// Healthy expansion divergence. Default: 0.2.
    pub divergence_target: f64,

    pub divergence_normalization: DivergenceNormalization,

    /// Characters that end a sentence when measuring divergence.
    /// Default: `.!?`.
    pub sentence_terminators: String,

    /// Alphabet size used to normalise character entropy.
    /// Default: 32 (divisor `log2(32) = 5` bits).
    pub entropy_alphabet: usize,

    pub thresholds: PhaseThresholds,

    /// Escalated threshold for production-sensitive changes. Default: 85.
    pub production_threshold: f64,

    /// Partial runs passing at least this many phases earn `PING`
    /// instead of `BLOCK`. Default: 3.
    pub ping_min_passed: usize,

    /// Trail-level snap-in threshold used by health summaries. Default: 70.
    pub snap_in_threshold: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            w_curl: 0.4,
            w_divergence: 0.3,
            w_potential: 0.2,
            w_entropy: 0.1,
            divergence_target: 0.2,
            divergence_normalization: DivergenceNormalization::Dispersion,
            sentence_terminators: ".!?".into(),
            entropy_alphabet: 32,
            thresholds: PhaseThresholds::default(),
            production_threshold: 85.0,
            ping_min_passed: 3,
            snap_in_threshold: 70.0,
        }
    }
}

impl GateConfig {
    /// Configuration reproducing the legacy Python circuit validator:
    /// `variance / 100` divergence, sentences split on `.` only.
    pub fn legacy_validator() -> Self {
        Self {
            divergence_normalization: DivergenceNormalization::FixedScale { scale: 100.0 },
            sentence_terminators: ".".into(),
            ..Self::default()
        }
    }

    /// Normaliser applied to raw Shannon entropy (bits).
    pub fn entropy_divisor(&self) -> f64 {
        (self.entropy_alphabet as f64).log2()
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> SpiralResult<()> {
        let weights = [
            ("w_curl", self.w_curl),
            ("w_divergence", self.w_divergence),
            ("w_potential", self.w_potential),
            ("w_entropy", self.w_entropy),
        ];
        for (name, w) in weights {
            if !(0.0..=1.0).contains(&w) {
                return Err(SpiralError::Config(format!(
                    "{name} must be in [0, 1], got {w}"
                )));
            }
        }
        let sum: f64 = weights.iter().map(|(_, w)| w).sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(SpiralError::Config(format!(
                "weights must sum to 1.0, got {sum}"
            )));
        }
        if !(0.0..=1.0).contains(&self.divergence_target) {
            return Err(SpiralError::Config(format!(
                "divergence_target must be in [0, 1], got {}",
                self.divergence_target
            )));
        }
        if let DivergenceNormalization::FixedScale { scale } = self.divergence_normalization {
            if !(scale > 0.0 && scale.is_finite()) {
                return Err(SpiralError::Config(format!(
                    "divergence scale must be finite and > 0, got {scale}"
                )));
            }
        }
        if self.sentence_terminators.trim().is_empty() {
            return Err(SpiralError::Config(
                "sentence_terminators must name at least one non-blank character".into(),
            ));
        }
        if self.entropy_alphabet < 2 {
            return Err(SpiralError::Config(format!(
                "entropy_alphabet must be >= 2, got {}",
                self.entropy_alphabet
            )));
        }

        let mut previous = 0.0;
        for phase in Phase::ALL {
            let t = self.thresholds.get(phase);
            if !(0.0..=100.0).contains(&t) {
                return Err(SpiralError::Config(format!(
                    "{phase} threshold must be in [0, 100], got {t}"
                )));
            }
            if t < previous {
                return Err(SpiralError::Config(format!(
                    "{phase} threshold {t} is below the preceding phase ({previous})"
                )));
            }
            previous = t;
        }
        if !(0.0..=100.0).contains(&self.production_threshold) {
            return Err(SpiralError::Config(format!(
                "production_threshold must be in [0, 100], got {}",
                self.production_threshold
            )));
        }
        if !(0.0..=100.0).contains(&self.snap_in_threshold) {
            return Err(SpiralError::Config(format!(
                "snap_in_threshold must be in [0, 100], got {}",
                self.snap_in_threshold
            )));
        }
        Ok(())
    }

    /// Load from JSON string. Absent fields take their defaults.
    pub fn from_json(json: &str) -> SpiralResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| SpiralError::Config(format!("JSON parse error: {e}")))
    }
}
