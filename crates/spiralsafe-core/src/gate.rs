// ─────────────────────────────────────────────────────────────────────
// SpiralSafe — Phase Gate Evaluator
// ─────────────────────────────────────────────────────────────────────
//! Pure per-phase verdicts over `(phase, GateContext)`.
//!
//! Preconditions are checked before the threshold and fail with their
//! own reason string. Callers match on substrings of these reasons
//! ("Intent documentation missing", "AWI threshold", "PRODUCTION
//! threshold") to drive remediation, so the wording is part of the
//! contract.
//!
//! One evaluator serves every decision kind. What differs between
//! pull-request review, infrastructure decisions and dialogue review
//! is captured by a `DomainProfile`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use spiralsafe_types::{GateConfig, GateContext, GateVerdict, Phase};

/// A boolean requirement a phase checks before its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precondition {
    /// Intent/purpose documented (`GateContext::has_intent`).
    Intent,
    /// Decision justification present (also read from `has_intent`).
    Justification,
    /// Rollback plan present (`GateContext::has_rollback`).
    Rollback,
}

impl Precondition {
    pub fn is_met(&self, ctx: &GateContext) -> bool {
        match self {
            Self::Intent | Self::Justification => ctx.has_intent,
            Self::Rollback => ctx.has_rollback,
        }
    }

    pub fn failure_reason(&self) -> &'static str {
        match self {
            Self::Intent => "Intent documentation missing",
            Self::Justification => "Justification missing",
            Self::Rollback => "Rollback plan missing for learning gate",
        }
    }
}

/// Which preconditions apply to which phase, and which phases escalate
/// to the production threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainProfile {
    pub name: String,
    pub kenl: Option<Precondition>,
    pub awi: Option<Precondition>,
    pub atom: Option<Precondition>,
    pub saif: Option<Precondition>,
    pub spiral: Option<Precondition>,
    /// Phases whose threshold becomes `production_threshold` when the
    /// context is production-sensitive.
    pub escalated: BTreeSet<Phase>,
}

impl Default for DomainProfile {
    fn default() -> Self {
        Self::review()
    }
}

impl DomainProfile {
    /// Pull-request and commit review.
    pub fn review() -> Self {
        Self {
            name: "review".to_string(),
            kenl: None,
            awi: Some(Precondition::Intent),
            atom: None,
            saif: None,
            spiral: Some(Precondition::Rollback),
            escalated: BTreeSet::from([Phase::Saif]),
        }
    }

    /// Infrastructure decisions (provisioning, scaling, deploys).
    pub fn infrastructure() -> Self {
        Self {
            name: "infrastructure".to_string(),
            awi: Some(Precondition::Justification),
            ..Self::review()
        }
    }

    /// Generated dialogue: intent is required, there is nothing to roll back.
    pub fn dialogue() -> Self {
        Self {
            name: "dialogue".to_string(),
            spiral: None,
            ..Self::review()
        }
    }

    /// Look up a built-in profile by name.
    pub fn named(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "review" => Some(Self::review()),
            "infrastructure" | "infra" => Some(Self::infrastructure()),
            "dialogue" => Some(Self::dialogue()),
            _ => None,
        }
    }

    pub fn precondition(&self, phase: Phase) -> Option<Precondition> {
        match phase {
            Phase::Kenl => self.kenl,
            Phase::Awi => self.awi,
            Phase::Atom => self.atom,
            Phase::Saif => self.saif,
            Phase::Spiral => self.spiral,
        }
    }
}

/// Stateless phase-gate evaluator.
#[derive(Debug, Clone, Default)]
pub struct GateEvaluator {
    config: GateConfig,
    profile: DomainProfile,
}

impl GateEvaluator {
    pub fn new(config: GateConfig, profile: DomainProfile) -> Self {
        Self { config, profile }
    }

    pub fn with_config(config: GateConfig) -> Self {
        Self::new(config, DomainProfile::review())
    }

    /// Effective threshold for `phase`, and whether production
    /// escalation applied.
    pub fn threshold(&self, phase: Phase, ctx: &GateContext) -> (f64, bool) {
        if ctx.is_production && self.profile.escalated.contains(&phase) {
            (self.config.production_threshold, true)
        } else {
            (self.config.thresholds.get(phase), false)
        }
    }

    /// Decide pass/fail for one phase.
    pub fn evaluate(&self, phase: Phase, ctx: &GateContext) -> GateVerdict {
        if let Some(pre) = self.profile.precondition(phase) {
            if !pre.is_met(ctx) {
                log::debug!("{phase}: precondition {pre:?} unmet");
                return GateVerdict::fail(pre.failure_reason());
            }
        }

        let (threshold, escalated) = self.threshold(phase, ctx);
        let score = ctx.coherence_score;
        if score.is_nan() || score < threshold {
            let label = if escalated { "PRODUCTION" } else { phase.as_str() };
            log::debug!("{phase}: {score} < {threshold} ({label})");
            return GateVerdict::fail(format!(
                "Coherence {score}% < {threshold}% ({label} threshold)"
            ));
        }

        GateVerdict::pass(match phase {
            Phase::Kenl => format!("Knowledge context verified (coherence ≥ {threshold}%)"),
            Phase::Awi => "Intent documented and coherent".to_string(),
            Phase::Atom => "Execution gate passed".to_string(),
            Phase::Saif => "SNAP-IN ACHIEVED".to_string(),
            Phase::Spiral => "Ready for next cycle".to_string(),
        })
    }

    pub fn profile(&self) -> &DomainProfile {
        &self.profile
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }
}
