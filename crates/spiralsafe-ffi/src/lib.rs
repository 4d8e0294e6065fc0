// ─────────────────────────────────────────────────────────────────────
// SpiralSafe — Gate Kernel PyO3 FFI Bindings
// (C) 2026 SpiralSafe Contributors. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
// Note: #[deny(unsafe_code)] not applied — PyO3 proc macros generate
// unsafe blocks internally. All hand-written code in this crate is safe.
//! Python-callable wrappers around the SpiralSafe gate kernel, so the
//! Python validators and hooks score and gate with this implementation
//! instead of their own copies of the formula.
//!
//! Exposes `GateConfig`, `RustCoherenceScorer`, `RustGatePipeline`,
//! `RustValidator`, and the tag and production helpers.
//!
//! # FFI Safety
//!
//! - No Python callbacks: every call runs entirely in Rust.
//! - Invalid config, phase names, or profile names → `ValueError`.
//! - Trail write failures are returned on the result, never raised.
//!
//! Install: `pip install -e crates/spiralsafe-ffi` (requires maturin).
//!
//! Usage from Python:
//! ```python
//! from spiralsafe_kernel import RustCoherenceScorer, RustGatePipeline
//!
//! result = RustCoherenceScorer().analyze(commit_message)
//! run = RustGatePipeline().run(result.score, has_intent=True, has_rollback=True)
//! print(run.markers)
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use spiralsafe_core::{CoherenceScorer, DomainProfile, PipelineRunner};
use spiralsafe_trail::{JsonlTrail, TrailStatus, Validation, Validator};
use spiralsafe_types::{
    CoherenceMetrics, CoherenceResult, GateConfig, GateContext, GateVerdict, Phase, PipelineResult,
};

fn value_error(e: impl ToString) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn profile_from_name(name: &str) -> PyResult<DomainProfile> {
    DomainProfile::named(name).ok_or_else(|| value_error(format!("unknown profile: {name}")))
}

fn parse_phases(names: &[String]) -> PyResult<Vec<Phase>> {
    names
        .iter()
        .map(|n| n.parse::<Phase>().map_err(value_error))
        .collect()
}

fn build_context(
    coherence_score: f64,
    has_intent: bool,
    has_rollback: bool,
    is_production: bool,
    pending_dry_run: bool,
    labels: Option<Vec<String>>,
) -> GateContext {
    GateContext::new(coherence_score)
        .with_intent(has_intent)
        .with_rollback(has_rollback)
        .production(is_production)
        .pending_dry_run(pending_dry_run)
        .with_labels(labels.unwrap_or_default())
}

// ─── PyGateConfig ───────────────────────────────────────────────────

/// Python-visible configuration for the gate kernel.
#[pyclass(name = "GateConfig")]
#[derive(Clone)]
struct PyGateConfig {
    inner: GateConfig,
}

#[pymethods]
impl PyGateConfig {
    #[new]
    #[pyo3(signature = (
        w_curl = 0.4,
        w_divergence = 0.3,
        w_potential = 0.2,
        w_entropy = 0.1,
        divergence_target = 0.2,
        production_threshold = 85.0,
        snap_in_threshold = 70.0,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        w_curl: f64,
        w_divergence: f64,
        w_potential: f64,
        w_entropy: f64,
        divergence_target: f64,
        production_threshold: f64,
        snap_in_threshold: f64,
    ) -> PyResult<Self> {
        let config = GateConfig {
            w_curl,
            w_divergence,
            w_potential,
            w_entropy,
            divergence_target,
            production_threshold,
            snap_in_threshold,
            ..GateConfig::default()
        };
        config.validate().map_err(value_error)?;
        Ok(Self { inner: config })
    }

    /// Construct from JSON string.
    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        let config = GateConfig::from_json(json).map_err(value_error)?;
        config.validate().map_err(value_error)?;
        Ok(Self { inner: config })
    }

    /// `variance / 100` divergence over `.`-split sentences, as the
    /// circuit validator computes it.
    #[staticmethod]
    fn legacy_validator() -> Self {
        Self {
            inner: GateConfig::legacy_validator(),
        }
    }

    fn to_json(&self) -> PyResult<String> {
        serde_json::to_string(&self.inner).map_err(value_error)
    }

    fn __repr__(&self) -> String {
        format!(
            "GateConfig(weights=({}, {}, {}, {}), production_threshold={})",
            self.inner.w_curl,
            self.inner.w_divergence,
            self.inner.w_potential,
            self.inner.w_entropy,
            self.inner.production_threshold
        )
    }
}

// ─── PyCoherenceResult ──────────────────────────────────────────────

/// Metrics plus composite score.
#[pyclass(name = "CoherenceResult")]
#[derive(Clone)]
struct PyCoherenceResult {
    inner: CoherenceResult,
}

#[pymethods]
impl PyCoherenceResult {
    #[getter]
    fn score(&self) -> f64 {
        self.inner.score
    }

    #[getter]
    fn curl(&self) -> f64 {
        self.inner.metrics.curl
    }

    #[getter]
    fn divergence(&self) -> f64 {
        self.inner.metrics.divergence
    }

    #[getter]
    fn potential(&self) -> f64 {
        self.inner.metrics.potential
    }

    #[getter]
    fn entropy(&self) -> f64 {
        self.inner.metrics.entropy
    }

    fn to_dict<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let dict = PyDict::new(py);
        dict.set_item("curl", self.inner.metrics.curl)?;
        dict.set_item("divergence", self.inner.metrics.divergence)?;
        dict.set_item("potential", self.inner.metrics.potential)?;
        dict.set_item("entropy", self.inner.metrics.entropy)?;
        dict.set_item("score", self.inner.score)?;
        Ok(dict)
    }

    fn __repr__(&self) -> String {
        let m = &self.inner.metrics;
        format!(
            "CoherenceResult(score={:.2}, curl={:.4}, divergence={:.4}, potential={:.4}, entropy={:.4})",
            self.inner.score, m.curl, m.divergence, m.potential, m.entropy
        )
    }
}

// ─── PyGateVerdict ──────────────────────────────────────────────────

#[pyclass(name = "GateVerdict")]
#[derive(Clone)]
struct PyGateVerdict {
    inner: GateVerdict,
}

#[pymethods]
impl PyGateVerdict {
    #[getter]
    fn passed(&self) -> bool {
        self.inner.passed
    }

    #[getter]
    fn reason(&self) -> &str {
        &self.inner.reason
    }

    /// `"emergency-merge"`, `"coherence-override"`, or None.
    #[getter]
    fn escaped_via(&self) -> Option<&'static str> {
        self.inner.escaped_via.map(|h| h.label())
    }

    fn __repr__(&self) -> String {
        format!(
            "GateVerdict(passed={}, reason={:?})",
            self.inner.passed, self.inner.reason
        )
    }
}

// ─── PyPipelineResult ───────────────────────────────────────────────

#[pyclass(name = "PipelineResult")]
#[derive(Clone)]
struct PyPipelineResult {
    inner: PipelineResult,
}

#[pymethods]
impl PyPipelineResult {
    #[getter]
    fn passed(&self) -> Vec<&'static str> {
        self.inner.passed.iter().map(|p| p.as_str()).collect()
    }

    #[getter]
    fn stopped_at(&self) -> Option<&'static str> {
        self.inner.stopped_at.map(|p| p.as_str())
    }

    #[getter]
    fn markers(&self) -> Vec<&'static str> {
        self.inner.markers.iter().map(|m| m.as_str()).collect()
    }

    #[getter]
    fn reason(&self) -> Option<String> {
        self.inner.blocking_verdict().map(|v| v.reason.clone())
    }

    #[getter]
    fn snap_in(&self) -> bool {
        self.inner.snap_in()
    }

    fn all_passed(&self) -> bool {
        self.inner.all_passed()
    }

    fn verdicts(&self) -> Vec<(&'static str, PyGateVerdict)> {
        self.inner
            .verdicts
            .iter()
            .map(|v| {
                (
                    v.phase.as_str(),
                    PyGateVerdict {
                        inner: v.verdict.clone(),
                    },
                )
            })
            .collect()
    }

    fn to_json(&self) -> PyResult<String> {
        serde_json::to_string(&self.inner).map_err(value_error)
    }

    fn __repr__(&self) -> String {
        format!(
            "PipelineResult(passed={:?}, markers={:?})",
            self.passed(),
            self.markers()
        )
    }
}

// ─── RustCoherenceScorer ────────────────────────────────────────────

/// Coherence scorer exposed to Python.
///
/// Drop-in replacement for `analyze_circuit_coherence` /
/// `calculate_coherence` in the circuit validator.
#[pyclass(name = "RustCoherenceScorer")]
struct PyCoherenceScorer {
    inner: CoherenceScorer,
}

#[pymethods]
impl PyCoherenceScorer {
    #[new]
    #[pyo3(signature = (config = None))]
    fn new(config: Option<PyGateConfig>) -> Self {
        let cfg = config.map(|c| c.inner).unwrap_or_default();
        Self {
            inner: CoherenceScorer::new(cfg),
        }
    }

    fn analyze(&self, text: &str) -> PyCoherenceResult {
        PyCoherenceResult {
            inner: self.inner.analyze(text),
        }
    }

    /// Score several fields joined by newlines.
    fn analyze_fields(&self, fields: Vec<String>) -> PyCoherenceResult {
        let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
        PyCoherenceResult {
            inner: self.inner.analyze_fields(&refs),
        }
    }

    /// Composite score for externally computed metrics.
    fn score(&self, curl: f64, divergence: f64, potential: f64, entropy: f64) -> f64 {
        self.inner
            .score(&CoherenceMetrics::new(curl, divergence, potential, entropy))
    }
}

// ─── RustGatePipeline ───────────────────────────────────────────────

/// Phase-gate evaluator and pipeline runner.
#[pyclass(name = "RustGatePipeline")]
struct PyGatePipeline {
    inner: PipelineRunner,
}

#[pymethods]
impl PyGatePipeline {
    /// Args:
    ///     config: Optional GateConfig (defaults if None).
    ///     profile: "review", "infrastructure", or "dialogue".
    #[new]
    #[pyo3(signature = (config = None, profile = "review"))]
    fn new(config: Option<PyGateConfig>, profile: &str) -> PyResult<Self> {
        let cfg = config.map(|c| c.inner).unwrap_or_default();
        Ok(Self {
            inner: PipelineRunner::new(cfg, profile_from_name(profile)?),
        })
    }

    /// Verdict for one phase, escape hatches included.
    #[pyo3(signature = (
        phase,
        coherence_score,
        has_intent = false,
        has_rollback = false,
        is_production = false,
        labels = None,
    ))]
    fn check(
        &self,
        phase: &str,
        coherence_score: f64,
        has_intent: bool,
        has_rollback: bool,
        is_production: bool,
        labels: Option<Vec<String>>,
    ) -> PyResult<PyGateVerdict> {
        let phase: Phase = phase.parse().map_err(value_error)?;
        let ctx = build_context(
            coherence_score,
            has_intent,
            has_rollback,
            is_production,
            false,
            labels,
        );
        Ok(PyGateVerdict {
            inner: self.inner.check(phase, &ctx),
        })
    }

    /// Run `phases` (all five if None), stopping at the first failure.
    #[pyo3(signature = (
        coherence_score,
        phases = None,
        has_intent = false,
        has_rollback = false,
        is_production = false,
        pending_dry_run = false,
        labels = None,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn run(
        &self,
        coherence_score: f64,
        phases: Option<Vec<String>>,
        has_intent: bool,
        has_rollback: bool,
        is_production: bool,
        pending_dry_run: bool,
        labels: Option<Vec<String>>,
    ) -> PyResult<PyPipelineResult> {
        let phases = match phases {
            Some(names) => parse_phases(&names)?,
            None => Phase::ALL.to_vec(),
        };
        let ctx = build_context(
            coherence_score,
            has_intent,
            has_rollback,
            is_production,
            pending_dry_run,
            labels,
        );
        Ok(PyPipelineResult {
            inner: self.inner.run(&phases, &ctx),
        })
    }

    #[getter]
    fn profile(&self) -> String {
        self.inner.evaluator().profile().name.clone()
    }
}

// ─── RustValidator ──────────────────────────────────────────────────

/// Score → gate → tag → append to a JSON-lines trail.
#[pyclass(name = "RustValidator")]
struct PyValidator {
    inner: Validator,
    trail: Arc<JsonlTrail>,
    snap_in_threshold: f64,
}

#[pymethods]
impl PyValidator {
    /// Args:
    ///     category: ATOM tag category, e.g. "QR" or "PR".
    ///     trail_path: JSON-lines file; parent directories are created.
    #[new]
    #[pyo3(signature = (category, trail_path, config = None, profile = "review"))]
    fn new(
        category: &str,
        trail_path: &str,
        config: Option<PyGateConfig>,
        profile: &str,
    ) -> PyResult<Self> {
        let cfg = config.map(|c| c.inner).unwrap_or_default();
        let snap_in_threshold = cfg.snap_in_threshold;
        let trail = Arc::new(JsonlTrail::new(trail_path));
        let inner = Validator::new(category, cfg, profile_from_name(profile)?, trail.clone());
        Ok(Self {
            inner,
            trail,
            snap_in_threshold,
        })
    }

    /// Returns a dict with atom_tag, coherence, pipeline, trail_error.
    #[pyo3(signature = (
        name,
        fields,
        has_intent = false,
        has_rollback = false,
        is_production = false,
        labels = None,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn validate<'py>(
        &self,
        py: Python<'py>,
        name: &str,
        fields: Vec<String>,
        has_intent: bool,
        has_rollback: bool,
        is_production: bool,
        labels: Option<Vec<String>>,
    ) -> PyResult<Bound<'py, PyDict>> {
        let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
        let ctx = build_context(0.0, has_intent, has_rollback, is_production, false, labels);
        let validation = self.inner.validate(name, &refs, ctx);
        validation_to_dict(py, validation)
    }

    /// Aggregate health over the trail file.
    fn health<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let health = self.trail.health(self.snap_in_threshold).map_err(value_error)?;
        let dict = PyDict::new(py);
        dict.set_item("total_validations", health.total_validations)?;
        dict.set_item("average_coherence", health.average_coherence)?;
        dict.set_item("snap_in_achieved", health.snap_in_achieved)?;
        let distribution = PyDict::new(py);
        for (phase, count) in &health.phase_distribution {
            distribution.set_item(phase.as_str(), *count)?;
        }
        dict.set_item("phase_distribution", distribution)?;
        Ok(dict)
    }
}

fn validation_to_dict(py: Python<'_>, v: Validation) -> PyResult<Bound<'_, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("atom_tag", v.atom_tag)?;
    dict.set_item(
        "coherence",
        PyCoherenceResult {
            inner: v.coherence,
        },
    )?;
    dict.set_item("pipeline", PyPipelineResult { inner: v.pipeline })?;
    let trail_error = match v.trail {
        TrailStatus::Persisted => None,
        TrailStatus::Failed(msg) => Some(msg),
    };
    dict.set_item("trail_error", trail_error)?;
    Ok(dict)
}

// ─── Free functions ─────────────────────────────────────────────────

/// `ATOM-<CATEGORY>-<YYYYMMDD>-<RND>-<slug>` for today.
#[pyfunction]
fn atom_tag(category: &str, name: &str) -> String {
    spiralsafe_trail::atom_tag(category, name)
}

/// Keyword heuristic for production resources.
#[pyfunction]
fn is_production_sensitive(text: &str) -> bool {
    spiralsafe_trail::is_production_sensitive(text)
}

/// Escape hatch a label set would trigger, if any.
#[pyfunction]
fn resolve_escape(labels: Vec<String>) -> Option<&'static str> {
    let labels: BTreeSet<String> = labels.into_iter().collect();
    spiralsafe_core::EscapeHatchResolver
        .resolve(&labels)
        .map(|h| h.label())
}

// ─── Module Registration ────────────────────────────────────────────

/// SpiralSafe gate kernel — coherence scoring and phase gating.
///
/// - `GateConfig` — weights and thresholds
/// - `RustCoherenceScorer` — text → metrics → score
/// - `RustGatePipeline` — KENL → AWI → ATOM → SAIF → SPIRAL
/// - `RustValidator` — scoring + gating + ATOM trail
#[pymodule]
fn spiralsafe_kernel(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyGateConfig>()?;
    m.add_class::<PyCoherenceResult>()?;
    m.add_class::<PyGateVerdict>()?;
    m.add_class::<PyPipelineResult>()?;
    m.add_class::<PyCoherenceScorer>()?;
    m.add_class::<PyGatePipeline>()?;
    m.add_class::<PyValidator>()?;
    m.add_function(wrap_pyfunction!(atom_tag, m)?)?;
    m.add_function(wrap_pyfunction!(is_production_sensitive, m)?)?;
    m.add_function(wrap_pyfunction!(resolve_escape, m)?)?;
    Ok(())
}
