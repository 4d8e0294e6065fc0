// ─────────────────────────────────────────────────────────────────────
// SpiralSafe — Validation Front Door
// ─────────────────────────────────────────────────────────────────────
//! Score → gate → tag → persist, in one call.

use std::sync::Arc;

use serde_json::{Map, Value};

use spiralsafe_core::{CoherenceScorer, DomainProfile, PipelineRunner};
use spiralsafe_types::{CoherenceResult, GateConfig, GateContext, PipelineResult};

use crate::execute::{ExecutionGuard, InfraDecision};
use crate::tag::AtomTag;
use crate::trail::{persist_or_log, TrailRecord, TrailSink, TrailStatus};

/// Everything one validation produced.
#[derive(Debug, Clone)]
pub struct Validation {
    pub atom_tag: String,
    pub coherence: CoherenceResult,
    pub pipeline: PipelineResult,
    /// Secondary: a failed write never alters `pipeline`.
    pub trail: TrailStatus,
}

pub struct Validator {
    category: String,
    scorer: CoherenceScorer,
    runner: PipelineRunner,
    sink: Arc<dyn TrailSink>,
}

impl Validator {
    pub fn new(
        category: impl Into<String>,
        config: GateConfig,
        profile: DomainProfile,
        sink: Arc<dyn TrailSink>,
    ) -> Self {
        Self {
            category: category.into(),
            scorer: CoherenceScorer::new(config.clone()),
            runner: PipelineRunner::new(config, profile),
            sink,
        }
    }

    /// Score `fields`, run every phase with the computed score, and
    /// append the outcome to the trail.
    pub fn validate(&self, name: &str, fields: &[&str], ctx: GateContext) -> Validation {
        self.validate_with(name, fields, ctx, Map::new())
    }

    /// Like [`validate`](Self::validate), storing `extra` on the trail record.
    pub fn validate_with(
        &self,
        name: &str,
        fields: &[&str],
        mut ctx: GateContext,
        extra: Map<String, Value>,
    ) -> Validation {
        let coherence = self.scorer.analyze_fields(fields);
        ctx.coherence_score = coherence.score;
        let pipeline = self.runner.run_all(&ctx);

        let atom_tag = AtomTag::generate(&self.category, name).to_string();
        let mut record = TrailRecord::new(&atom_tag, coherence, &pipeline);
        record.fields = extra;
        let trail = persist_or_log(self.sink.as_ref(), &record);

        log::debug!(
            "{atom_tag}: coherence {:.1}, {} phases passed",
            coherence.score,
            pipeline.passed.len()
        );
        Validation {
            atom_tag,
            coherence,
            pipeline,
            trail,
        }
    }

    /// Validate an infrastructure decision; the decision itself is
    /// stored on the trail record. Production-sensitive decisions stay
    /// pending until `guard` holds a dry run for them.
    pub fn validate_decision(
        &self,
        decision: &InfraDecision,
        guard: &ExecutionGuard,
    ) -> Validation {
        let extra = match serde_json::to_value(decision) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let name = format!("{} {}", decision.action, decision.resource);
        let ctx = decision.gate_context(0.0, guard.has_dry_run(&decision.id));
        self.validate_with(&name, &decision.scoring_fields(), ctx, extra)
    }

    pub fn scorer(&self) -> &CoherenceScorer {
        &self.scorer
    }

    pub fn runner(&self) -> &PipelineRunner {
        &self.runner
    }
}
