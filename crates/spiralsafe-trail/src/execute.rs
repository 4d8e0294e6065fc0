// ─────────────────────────────────────────────────────────────────────
// SpiralSafe — Infrastructure Execution Guard
// ─────────────────────────────────────────────────────────────────────
//! Guarded execution of infrastructure decisions.
//!
//! A real (non-dry-run) execution is refused unless every phase passed.
//! Production-sensitive decisions additionally need a successful dry run
//! for the same decision id first. A missing backend or credential is
//! reported as `NotConfigured`, never as a refusal.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use spiralsafe_types::{GateContext, Phase, PipelineResult, SpiralError, SpiralResult};

const PRODUCTION_KEYWORDS: &[&str] = &["prod", "production", "live", "primary", "critical"];

/// Keyword heuristic: does `text` name a production resource?
///
/// Matches whole tokens only, so `prod-db-1` is sensitive and
/// `reproduce` is not.
pub fn is_production_sensitive(text: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .any(|t| PRODUCTION_KEYWORDS.contains(&t.to_lowercase().as_str()))
}

/// An infrastructure change awaiting the gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfraDecision {
    pub id: String,
    pub action: String,
    pub resource: String,
    #[serde(default)]
    pub justification: String,
    #[serde(default)]
    pub rollback: Option<String>,
    /// Explicit production flag; the resource heuristic is OR-ed in.
    #[serde(default)]
    pub production: bool,
}

impl InfraDecision {
    pub fn new(id: impl Into<String>, action: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action: action.into(),
            resource: resource.into(),
            justification: String::new(),
            rollback: None,
            production: false,
        }
    }

    pub fn with_justification(mut self, justification: impl Into<String>) -> Self {
        self.justification = justification.into();
        self
    }

    pub fn with_rollback(mut self, rollback: impl Into<String>) -> Self {
        self.rollback = Some(rollback.into());
        self
    }

    pub fn production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    pub fn is_production_sensitive(&self) -> bool {
        self.production || is_production_sensitive(&self.resource)
    }

    /// Text the coherence scorer sees for this decision.
    pub fn scoring_fields(&self) -> Vec<&str> {
        let mut fields = vec![
            self.action.as_str(),
            self.resource.as_str(),
            self.justification.as_str(),
        ];
        if let Some(rollback) = &self.rollback {
            fields.push(rollback);
        }
        fields
    }

    /// Gate context for this decision at `coherence_score`.
    ///
    /// A production-sensitive decision without a recorded dry run is
    /// marked pending, which holds its marker at `PING`.
    pub fn gate_context(&self, coherence_score: f64, dry_run_recorded: bool) -> GateContext {
        let production = self.is_production_sensitive();
        GateContext::new(coherence_score)
            .with_intent(!self.justification.trim().is_empty())
            .with_rollback(self.rollback.as_deref().is_some_and(|r| !r.trim().is_empty()))
            .production(production)
            .pending_dry_run(production && !dry_run_recorded)
    }
}

/// What a backend reports back after running a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReceipt {
    pub decision_id: String,
    pub dry_run: bool,
    #[serde(default)]
    pub output: String,
    pub timestamp: String,
}

impl ExecutionReceipt {
    pub fn new(decision_id: impl Into<String>, dry_run: bool, output: impl Into<String>) -> Self {
        Self {
            decision_id: decision_id.into(),
            dry_run,
            output: output.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Trait for infrastructure execution backends (cloud APIs, IaC runners).
pub trait InfraBackend: Send + Sync {
    /// Run (or plan, when `dry_run`) the decision.
    fn execute(&self, decision: &InfraDecision, dry_run: bool) -> SpiralResult<ExecutionReceipt>;

    /// `Err(SpiralError::NotConfigured)` when credentials are absent.
    fn check_configured(&self) -> SpiralResult<()> {
        Ok(())
    }
}

type ExecuteFn = Box<dyn Fn(&InfraDecision, bool) -> SpiralResult<ExecutionReceipt> + Send + Sync>;

/// Backend that delegates to a closure, optionally requiring a
/// credential environment variable to be set.
pub struct ExternalBackend {
    execute_fn: ExecuteFn,
    credential_env: Option<String>,
}

impl ExternalBackend {
    pub fn new(
        execute_fn: impl Fn(&InfraDecision, bool) -> SpiralResult<ExecutionReceipt> + Send + Sync + 'static,
    ) -> Self {
        Self {
            execute_fn: Box::new(execute_fn),
            credential_env: None,
        }
    }

    pub fn requiring_env(mut self, var: impl Into<String>) -> Self {
        self.credential_env = Some(var.into());
        self
    }
}

impl InfraBackend for ExternalBackend {
    fn execute(&self, decision: &InfraDecision, dry_run: bool) -> SpiralResult<ExecutionReceipt> {
        (self.execute_fn)(decision, dry_run)
    }

    fn check_configured(&self) -> SpiralResult<()> {
        match &self.credential_env {
            Some(var) => match std::env::var(var) {
                Ok(value) if !value.is_empty() => Ok(()),
                _ => Err(SpiralError::NotConfigured(format!("{var} is not set"))),
            },
            None => Ok(()),
        }
    }
}

/// Result of a guarded execution attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Executed(ExecutionReceipt),
    DryRun(ExecutionReceipt),
    Refused(String),
    NotConfigured(String),
    Failed(String),
}

impl ExecutionOutcome {
    pub fn is_executed(&self) -> bool {
        matches!(self, Self::Executed(_))
    }
}

/// Gatekeeper between pipeline verdicts and an `InfraBackend`.
pub struct ExecutionGuard {
    backend: Option<Arc<dyn InfraBackend>>,
    /// Decisions whose dry run has not yet been spent on a real execution.
    dry_runs: Mutex<HashSet<String>>,
}

impl ExecutionGuard {
    pub fn new(backend: Arc<dyn InfraBackend>) -> Self {
        Self {
            backend: Some(backend),
            dry_runs: Mutex::new(HashSet::new()),
        }
    }

    /// A guard with no backend: every attempt is `NotConfigured`.
    pub fn unconfigured() -> Self {
        Self {
            backend: None,
            dry_runs: Mutex::new(HashSet::new()),
        }
    }

    /// Check the gates, then hand the decision to the backend.
    pub fn execute(
        &self,
        decision: &InfraDecision,
        pipeline: &PipelineResult,
        dry_run: bool,
    ) -> ExecutionOutcome {
        let Some(backend) = &self.backend else {
            return ExecutionOutcome::NotConfigured("no infrastructure backend configured".into());
        };
        match backend.check_configured() {
            Ok(()) => {}
            Err(SpiralError::NotConfigured(msg)) => return ExecutionOutcome::NotConfigured(msg),
            Err(e) => return ExecutionOutcome::Failed(e.to_string()),
        }

        if !dry_run {
            if let Some(reason) = self.refusal(decision, pipeline) {
                log::warn!("execution of {} refused: {reason}", decision.id);
                return ExecutionOutcome::Refused(reason);
            }
        }

        match backend.execute(decision, dry_run) {
            Ok(receipt) if dry_run => {
                self.record_dry_run(&decision.id);
                log::info!("dry run recorded for {}", decision.id);
                ExecutionOutcome::DryRun(receipt)
            }
            Ok(receipt) => {
                // A dry run clears exactly one real execution.
                self.dry_runs.lock().remove(&decision.id);
                log::info!("executed {} on {}", decision.action, decision.resource);
                ExecutionOutcome::Executed(receipt)
            }
            Err(e) => {
                log::error!("backend failed for {}: {e}", decision.id);
                ExecutionOutcome::Failed(e.to_string())
            }
        }
    }

    fn refusal(&self, decision: &InfraDecision, pipeline: &PipelineResult) -> Option<String> {
        if let Some(missing) = Phase::ALL.iter().find(|&&p| !pipeline.passed.contains(&p)) {
            return Some(format!("gate {missing} not passed"));
        }
        if decision.is_production_sensitive() && !self.has_dry_run(&decision.id) {
            return Some("production change requires a successful dry run first".into());
        }
        None
    }

    pub fn record_dry_run(&self, decision_id: &str) {
        self.dry_runs.lock().insert(decision_id.to_string());
    }

    pub fn has_dry_run(&self, decision_id: &str) -> bool {
        self.dry_runs.lock().contains(decision_id)
    }
}
