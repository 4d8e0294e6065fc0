// ─────────────────────────────────────────────────────────────────────
// SpiralSafe — Phase Pipeline Runner
// ─────────────────────────────────────────────────────────────────────
//! Walks an ordered list of phases.
//!
//! For each phase the escape-hatch resolver is asked first; an escape
//! records a passing verdict and the evaluator is never consulted for
//! that phase. Otherwise the gate evaluator decides, and the first
//! failure ends the run. Phases after it are never evaluated.

use std::collections::BTreeSet;

use spiralsafe_types::{
    GateConfig, GateContext, GateVerdict, Marker, Phase, PhaseVerdict, PipelineResult,
};

use crate::escape::EscapeHatchResolver;
use crate::gate::{DomainProfile, GateEvaluator};

/// Derive status markers from how far a run got.
///
/// - every requested phase passed → `WAVE, PASS` plus `SYNC` when
///   approved, else `PING`;
/// - at least `ping_min_passed` passed → `WAVE, PING`;
/// - otherwise → `BLOCK`.
pub fn derive_markers(
    passed: usize,
    requested: usize,
    approved: bool,
    ping_min_passed: usize,
) -> BTreeSet<Marker> {
    if passed >= requested {
        let last = if approved { Marker::Sync } else { Marker::Ping };
        BTreeSet::from([Marker::Wave, Marker::Pass, last])
    } else if passed >= ping_min_passed {
        BTreeSet::from([Marker::Wave, Marker::Ping])
    } else {
        BTreeSet::from([Marker::Block])
    }
}

/// Escape resolver + gate evaluator, applied phase by phase.
#[derive(Debug, Clone, Default)]
pub struct PipelineRunner {
    evaluator: GateEvaluator,
    resolver: EscapeHatchResolver,
}

impl PipelineRunner {
    pub fn new(config: GateConfig, profile: DomainProfile) -> Self {
        Self {
            evaluator: GateEvaluator::new(config, profile),
            resolver: EscapeHatchResolver,
        }
    }

    pub fn with_config(config: GateConfig) -> Self {
        Self::new(config, DomainProfile::review())
    }

    /// Verdict for a single phase, escape hatches included.
    pub fn check(&self, phase: Phase, ctx: &GateContext) -> GateVerdict {
        match self.resolver.resolve(&ctx.labels) {
            Some(hatch) => {
                log::info!("{phase}: escaped via {hatch}");
                GateVerdict::escaped(hatch)
            }
            None => self.evaluator.evaluate(phase, ctx),
        }
    }

    /// Run `phases` in order, stopping at the first failure.
    pub fn run(&self, phases: &[Phase], ctx: &GateContext) -> PipelineResult {
        let mut result = PipelineResult::default();

        for &phase in phases {
            let verdict = self.check(phase, ctx);
            let passed = verdict.passed;
            result.verdicts.push(PhaseVerdict { phase, verdict });
            if !passed {
                result.stopped_at = Some(phase);
                break;
            }
            result.passed.push(phase);
        }

        result.markers = derive_markers(
            result.passed.len(),
            phases.len(),
            !ctx.pending_dry_run,
            self.evaluator.config().ping_min_passed,
        );

        match result.stopped_at {
            Some(phase) => log::info!(
                "pipeline blocked at {phase} after {}/{} phases",
                result.passed.len(),
                phases.len()
            ),
            None if result.snap_in() => log::info!("pipeline complete: SNAP-IN"),
            None => log::debug!("pipeline complete: {} phases", phases.len()),
        }
        result
    }

    /// Run the full KENL → SPIRAL sequence.
    pub fn run_all(&self, ctx: &GateContext) -> PipelineResult {
        self.run(&Phase::ALL, ctx)
    }

    pub fn evaluator(&self) -> &GateEvaluator {
        &self.evaluator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spiralsafe_types::EscapeHatch;

    fn full_context(score: f64) -> GateContext {
        GateContext::new(score).with_intent(true).with_rollback(true)
    }

    // ── Marker derivation ─────────────────────────────────────────

    #[test]
    fn test_markers_all_passed_approved() {
        assert_eq!(
            derive_markers(5, 5, true, 3),
            BTreeSet::from([Marker::Wave, Marker::Pass, Marker::Sync])
        );
    }

    #[test]
    fn test_markers_all_passed_pending() {
        assert_eq!(
            derive_markers(5, 5, false, 3),
            BTreeSet::from([Marker::Wave, Marker::Pass, Marker::Ping])
        );
    }

    #[test]
    fn test_markers_partial() {
        assert_eq!(
            derive_markers(3, 5, true, 3),
            BTreeSet::from([Marker::Wave, Marker::Ping])
        );
        assert_eq!(
            derive_markers(4, 5, false, 3),
            BTreeSet::from([Marker::Wave, Marker::Ping])
        );
    }

    #[test]
    fn test_markers_block() {
        for passed in 0..3 {
            assert_eq!(derive_markers(passed, 5, true, 3), BTreeSet::from([Marker::Block]));
        }
    }

    // ── Runs ──────────────────────────────────────────────────────

    #[test]
    fn test_full_pass() {
        let result = PipelineRunner::default().run_all(&full_context(80.0));
        assert_eq!(result.passed, Phase::ALL.to_vec());
        assert!(result.all_passed());
        assert!(result.snap_in());
        assert!(result.has_marker(Marker::Sync));
        assert_eq!(result.verdicts.len(), 5);
    }

    #[test]
    fn test_partial_pass_blocked_at_saif() {
        let result = PipelineRunner::default().run_all(&full_context(65.0));
        assert_eq!(result.passed, vec![Phase::Kenl, Phase::Awi, Phase::Atom]);
        assert_eq!(result.stopped_at, Some(Phase::Saif));
        assert_eq!(result.verdicts.len(), 4);
        assert!(result.blocking_verdict().unwrap().reason.contains("SAIF threshold"));
        assert_eq!(result.markers, BTreeSet::from([Marker::Wave, Marker::Ping]));
    }

    #[test]
    fn test_stops_at_first_failure() {
        // AWI fails on intent; nothing after it is evaluated.
        let ctx = GateContext::new(95.0).with_rollback(true);
        let result = PipelineRunner::default().run_all(&ctx);
        assert_eq!(result.passed, vec![Phase::Kenl]);
        assert_eq!(result.stopped_at, Some(Phase::Awi));
        assert_eq!(result.verdicts.last().unwrap().phase, Phase::Awi);
        assert_eq!(result.markers, BTreeSet::from([Marker::Block]));
    }

    #[test]
    fn test_pending_dry_run_pings() {
        let ctx = full_context(90.0).pending_dry_run(true);
        let result = PipelineRunner::default().run_all(&ctx);
        assert!(result.all_passed());
        assert!(result.has_marker(Marker::Ping));
        assert!(!result.has_marker(Marker::Sync));
    }

    #[test]
    fn test_production_blocks_at_saif() {
        let ctx = full_context(80.0).production(true);
        let result = PipelineRunner::default().run_all(&ctx);
        assert_eq!(result.stopped_at, Some(Phase::Saif));
        assert!(result
            .blocking_verdict()
            .unwrap()
            .reason
            .contains("PRODUCTION threshold"));
    }

    #[test]
    fn test_coherence_override_passes_everything() {
        let ctx = GateContext::new(0.0).with_label("coherence-override");
        let result = PipelineRunner::default().run_all(&ctx);
        assert_eq!(result.passed, Phase::ALL.to_vec());
        for v in &result.verdicts {
            assert!(v.verdict.passed);
            assert_eq!(v.verdict.escaped_via, Some(EscapeHatch::CoherenceOverride));
        }
        assert_eq!(result.escaped_via(), Some(EscapeHatch::CoherenceOverride));
    }

    #[test]
    fn test_emergency_merge_escapes_all_gates() {
        let ctx = GateContext::new(10.0)
            .production(true)
            .with_labels(["coherence-override", "emergency-merge"]);
        let runner = PipelineRunner::default();
        for phase in Phase::ALL {
            let v = runner.check(phase, &ctx);
            assert!(v.passed, "{phase} should be escaped");
            assert_eq!(v.escaped_via, Some(EscapeHatch::EmergencyMerge));
        }
    }

    #[test]
    fn test_penrose_loop_exit() {
        // Edits keep the score stuck below SAIF; only the override moves it.
        let runner = PipelineRunner::default();
        let attempts = [50.0, 53.5, 58.2, 55.0, 59.9];
        for (i, score) in attempts.iter().enumerate() {
            let mut ctx = full_context(*score);
            let last = i == attempts.len() - 1;
            if last {
                ctx = ctx.with_label("coherence-override");
            }
            let v = runner.check(Phase::Saif, &ctx);
            assert_eq!(v.passed, last);
        }
    }

    #[test]
    fn test_custom_phase_order_subset() {
        let result = PipelineRunner::default().run(&[Phase::Kenl, Phase::Atom], &GateContext::new(61.0));
        assert_eq!(result.passed, vec![Phase::Kenl, Phase::Atom]);
        assert!(result.has_marker(Marker::Pass));
    }

    #[test]
    fn test_empty_phase_list() {
        let result = PipelineRunner::default().run(&[], &GateContext::new(0.0));
        assert!(result.passed.is_empty());
        assert!(result.all_passed());
        assert!(result.has_marker(Marker::Pass));
    }

    #[test]
    fn test_result_serializes_markers() {
        let result = PipelineRunner::default().run_all(&full_context(65.0));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["passed"], serde_json::json!(["KENL", "AWI", "ATOM"]));
        assert_eq!(json["markers"], serde_json::json!(["WAVE", "PING"]));
        assert_eq!(json["stoppedAt"], "SAIF");
    }
}
