// ─────────────────────────────────────────────────────────────────────
// SpiralSafe — Phase Gate Types
// ─────────────────────────────────────────────────────────────────────

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SpiralError;

/// One ordered stage of the approval pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    /// Knowledge: context exists.
    Kenl,
    /// Intent: purpose is documented.
    Awi,
    /// Execution: the change is ready to run.
    Atom,
    /// Assessment: snap-in, results match intent.
    Saif,
    /// Learning: rollback captured, ready for the next cycle.
    Spiral,
}

impl Phase {
    /// All phases in pipeline order.
    pub const ALL: [Phase; 5] = [
        Phase::Kenl,
        Phase::Awi,
        Phase::Atom,
        Phase::Saif,
        Phase::Spiral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kenl => "KENL",
            Self::Awi => "AWI",
            Self::Atom => "ATOM",
            Self::Saif => "SAIF",
            Self::Spiral => "SPIRAL",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = SpiralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SpiralError::Validation(format!("unknown phase: {s}")))
    }
}

/// Status flag attached to a pipeline result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Marker {
    Wave,
    Pass,
    Ping,
    Sync,
    Block,
}

impl Marker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wave => "WAVE",
            Self::Pass => "PASS",
            Self::Ping => "PING",
            Self::Sync => "SYNC",
            Self::Block => "BLOCK",
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recognised override labels, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EscapeHatch {
    EmergencyMerge,
    CoherenceOverride,
}

impl EscapeHatch {
    /// Resolution order. Earlier entries win when several labels are present.
    pub const PRIORITY: [EscapeHatch; 2] = [
        EscapeHatch::EmergencyMerge,
        EscapeHatch::CoherenceOverride,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::EmergencyMerge => "emergency-merge",
            Self::CoherenceOverride => "coherence-override",
        }
    }

    /// Reason recorded on verdicts that passed through this hatch.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::EmergencyMerge => "Emergency merge override",
            Self::CoherenceOverride => "Coherence override",
        }
    }
}

impl fmt::Display for EscapeHatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-request input to the gate evaluator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GateContext {
    pub coherence_score: f64,
    pub has_intent: bool,
    pub has_rollback: bool,
    pub is_production: bool,
    /// Approval is still waiting on an extra requirement (e.g. a dry run).
    /// Only affects marker derivation: `PING` instead of `SYNC`.
    pub pending_dry_run: bool,
    pub labels: BTreeSet<String>,
}

impl GateContext {
    pub fn new(coherence_score: f64) -> Self {
        Self {
            coherence_score,
            ..Default::default()
        }
    }

    pub fn with_intent(mut self, has_intent: bool) -> Self {
        self.has_intent = has_intent;
        self
    }

    pub fn with_rollback(mut self, has_rollback: bool) -> Self {
        self.has_rollback = has_rollback;
        self
    }

    pub fn production(mut self, is_production: bool) -> Self {
        self.is_production = is_production;
        self
    }

    pub fn pending_dry_run(mut self, pending: bool) -> Self {
        self.pending_dry_run = pending;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(Into::into));
        self
    }
}

/// Outcome of evaluating one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateVerdict {
    pub passed: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub escaped_via: Option<EscapeHatch>,
}

impl GateVerdict {
    pub fn pass(reason: impl Into<String>) -> Self {
        Self {
            passed: true,
            reason: reason.into(),
            escaped_via: None,
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: reason.into(),
            escaped_via: None,
        }
    }

    pub fn escaped(hatch: EscapeHatch) -> Self {
        Self {
            passed: true,
            reason: hatch.reason().to_string(),
            escaped_via: Some(hatch),
        }
    }
}

/// A verdict tagged with the phase it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseVerdict {
    pub phase: Phase,
    #[serde(flatten)]
    pub verdict: GateVerdict,
}

/// Result of walking an ordered list of phases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    /// Phases that passed; always a prefix of the requested list.
    pub passed: Vec<Phase>,
    /// One verdict per evaluated phase, including the failing one.
    pub verdicts: Vec<PhaseVerdict>,
    /// The phase that blocked the run, if any.
    pub stopped_at: Option<Phase>,
    pub markers: BTreeSet<Marker>,
}

impl PipelineResult {
    pub fn all_passed(&self) -> bool {
        self.stopped_at.is_none()
    }

    pub fn has_marker(&self, marker: Marker) -> bool {
        self.markers.contains(&marker)
    }

    /// True once the SAIF gate has been cleared.
    pub fn snap_in(&self) -> bool {
        self.passed.contains(&Phase::Saif)
    }

    /// The blocking verdict, if the run stopped early.
    pub fn blocking_verdict(&self) -> Option<&GateVerdict> {
        self.stopped_at?;
        self.verdicts.last().map(|v| &v.verdict)
    }

    pub fn escaped_via(&self) -> Option<EscapeHatch> {
        self.verdicts.iter().find_map(|v| v.verdict.escaped_via)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        assert!(Phase::Kenl < Phase::Awi);
        assert!(Phase::Saif < Phase::Spiral);
        assert_eq!(Phase::ALL.len(), 5);
    }

    #[test]
    fn test_phase_parse_and_display() {
        assert_eq!("spiral".parse::<Phase>().unwrap(), Phase::Spiral);
        assert_eq!(Phase::Awi.to_string(), "AWI");
        assert!("LEARN".parse::<Phase>().is_err());
    }

    #[test]
    fn test_phase_serializes_uppercase() {
        let json = serde_json::to_string(&[Phase::Kenl, Phase::Saif]).unwrap();
        assert_eq!(json, r#"["KENL","SAIF"]"#);
    }

    #[test]
    fn test_marker_serializes_uppercase() {
        let json = serde_json::to_string(&Marker::Block).unwrap();
        assert_eq!(json, r#""BLOCK""#);
    }

    #[test]
    fn test_escape_hatch_labels() {
        assert_eq!(EscapeHatch::EmergencyMerge.label(), "emergency-merge");
        let json = serde_json::to_string(&EscapeHatch::CoherenceOverride).unwrap();
        assert_eq!(json, r#""coherence-override""#);
    }

    #[test]
    fn test_context_builder() {
        let ctx = GateContext::new(65.0)
            .with_intent(true)
            .with_rollback(true)
            .with_labels(["a", "b"]);
        assert!(ctx.has_intent && ctx.has_rollback && !ctx.is_production);
        assert_eq!(ctx.labels.len(), 2);
    }

    #[test]
    fn test_context_from_camel_case_json() {
        let ctx: GateContext = serde_json::from_str(
            r#"{"coherenceScore": 80, "isProduction": true, "labels": ["emergency-merge"]}"#,
        )
        .unwrap();
        assert_eq!(ctx.coherence_score, 80.0);
        assert!(ctx.is_production);
        assert!(!ctx.has_rollback);
        assert!(ctx.labels.contains("emergency-merge"));
    }

    #[test]
    fn test_verdict_omits_absent_escape() {
        let json = serde_json::to_value(GateVerdict::pass("ok")).unwrap();
        assert!(json.get("escapedVia").is_none());
        let json = serde_json::to_value(GateVerdict::escaped(EscapeHatch::EmergencyMerge)).unwrap();
        assert_eq!(json["escapedVia"], "emergency-merge");
    }

    #[test]
    fn test_blocking_verdict() {
        let result = PipelineResult {
            passed: vec![Phase::Kenl],
            verdicts: vec![
                PhaseVerdict {
                    phase: Phase::Kenl,
                    verdict: GateVerdict::pass("ok"),
                },
                PhaseVerdict {
                    phase: Phase::Awi,
                    verdict: GateVerdict::fail("Intent documentation missing"),
                },
            ],
            stopped_at: Some(Phase::Awi),
            markers: BTreeSet::from([Marker::Block]),
        };
        assert!(!result.all_passed());
        assert!(!result.snap_in());
        assert_eq!(
            result.blocking_verdict().unwrap().reason,
            "Intent documentation missing"
        );
    }
}
