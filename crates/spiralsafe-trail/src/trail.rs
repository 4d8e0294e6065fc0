// ─────────────────────────────────────────────────────────────────────
// SpiralSafe — ATOM Trail (Append-Only Persistence)
// ─────────────────────────────────────────────────────────────────────
//! Append-only JSON-lines log of pipeline results, newest last.
//!
//! Persistence happens after the pipeline has decided. A failed write
//! never changes or discards the computed result: `persist_or_log`
//! logs the error and reports it as a secondary `TrailStatus`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use spiralsafe_types::{CoherenceResult, Marker, Phase, PipelineResult, SpiralResult};

/// Default trail directory, relative to the working directory.
pub const TRAIL_DIR: &str = ".atom-trail";

/// One line of the trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrailRecord {
    pub atom_tag: String,
    /// Decision- or dialogue-specific fields, stored at the top level.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    pub coherence: CoherenceResult,
    pub gates_passed: Vec<Phase>,
    pub markers: BTreeSet<Marker>,
    pub timestamp: String,
}

impl TrailRecord {
    pub fn new(
        atom_tag: impl Into<String>,
        coherence: CoherenceResult,
        pipeline: &PipelineResult,
    ) -> Self {
        Self {
            atom_tag: atom_tag.into(),
            fields: Map::new(),
            coherence,
            gates_passed: pipeline.passed.clone(),
            markers: pipeline.markers.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Destination for trail records.
pub trait TrailSink: Send + Sync {
    fn append(&self, record: &TrailRecord) -> SpiralResult<()>;
}

/// Outcome of a persistence attempt, independent of gate pass/fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrailStatus {
    Persisted,
    Failed(String),
}

impl TrailStatus {
    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted)
    }
}

/// Append `record`, logging instead of propagating any failure.
pub fn persist_or_log(sink: &dyn TrailSink, record: &TrailRecord) -> TrailStatus {
    match sink.append(record) {
        Ok(()) => TrailStatus::Persisted,
        Err(e) => {
            log::error!("trail append failed for {}: {e}", record.atom_tag);
            TrailStatus::Failed(e.to_string())
        }
    }
}

/// JSON-lines file sink. Appends from one process are serialized.
pub struct JsonlTrail {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlTrail {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// `<dir>/<name>.jsonl`
    pub fn in_dir(dir: impl AsRef<Path>, name: &str) -> Self {
        Self::new(dir.as_ref().join(format!("{name}.jsonl")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record, oldest first. A missing file is an empty trail.
    pub fn read_all(&self) -> SpiralResult<Vec<TrailRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| Ok(serde_json::from_str(line)?))
            .collect()
    }

    /// Aggregate health over the whole trail.
    pub fn health(&self, snap_in_threshold: f64) -> SpiralResult<VortexHealth> {
        Ok(VortexHealth::from_records(&self.read_all()?, snap_in_threshold))
    }
}

impl TrailSink for JsonlTrail {
    fn append(&self, record: &TrailRecord) -> SpiralResult<()> {
        let line = serde_json::to_string(record)?;
        let _guard = self.write_lock.lock();
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

/// In-memory sink for tests and embedding.
#[derive(Default)]
pub struct MemoryTrail {
    records: Mutex<Vec<TrailRecord>>,
}

impl MemoryTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TrailRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl TrailSink for MemoryTrail {
    fn append(&self, record: &TrailRecord) -> SpiralResult<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Aggregate view over a trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VortexHealth {
    pub total_validations: usize,
    pub average_coherence: f64,
    pub snap_in_achieved: bool,
    /// How many records passed each phase.
    pub phase_distribution: BTreeMap<Phase, usize>,
}

impl VortexHealth {
    pub fn from_records(records: &[TrailRecord], snap_in_threshold: f64) -> Self {
        let mut phase_distribution: BTreeMap<Phase, usize> =
            Phase::ALL.iter().map(|&p| (p, 0)).collect();
        let mut sum = 0.0;
        for record in records {
            sum += record.coherence.score;
            for phase in &record.gates_passed {
                *phase_distribution.entry(*phase).or_insert(0) += 1;
            }
        }
        let total = records.len();
        let average_coherence = if total > 0 { sum / total as f64 } else { 0.0 };
        Self {
            total_validations: total,
            average_coherence,
            snap_in_achieved: total > 0 && average_coherence >= snap_in_threshold,
            phase_distribution,
        }
    }
}

#[cfg(test)]
mod tests {
    use spiralsafe_types::{CoherenceMetrics, GateContext};

    use spiralsafe_core::PipelineRunner;

    use super::*;

    fn record(tag: &str, score: f64) -> TrailRecord {
        let ctx = GateContext::new(score).with_intent(true).with_rollback(true);
        let pipeline = PipelineRunner::default().run_all(&ctx);
        TrailRecord::new(tag, CoherenceResult::new(CoherenceMetrics::ideal(), score), &pipeline)
    }

    struct BrokenSink;

    impl TrailSink for BrokenSink {
        fn append(&self, _record: &TrailRecord) -> SpiralResult<()> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
        }
    }

    #[test]
    fn test_record_serializes_camel_case_with_flat_fields() {
        let r = record("ATOM-QR-20260117-ABC-cnot", 65.0).with_field("circuitName", "CNOT Gate");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["atomTag"], "ATOM-QR-20260117-ABC-cnot");
        assert_eq!(json["circuitName"], "CNOT Gate");
        assert_eq!(json["gatesPassed"], serde_json::json!(["KENL", "AWI", "ATOM"]));
        assert_eq!(json["markers"], serde_json::json!(["WAVE", "PING"]));
        assert_eq!(json["coherence"]["score"], 65.0);
    }

    #[test]
    fn test_jsonl_append_newest_last() {
        let dir = tempfile::tempdir().unwrap();
        let trail = JsonlTrail::in_dir(dir.path().join(TRAIL_DIR), "decisions");
        trail.append(&record("first", 80.0)).unwrap();
        trail.append(&record("second", 40.0)).unwrap();

        let raw = fs::read_to_string(trail.path()).unwrap();
        assert_eq!(raw.lines().count(), 2);

        let records = trail.read_all().unwrap();
        assert_eq!(records[0].atom_tag, "first");
        assert_eq!(records[1].atom_tag, "second");
        assert_eq!(records[1].gates_passed, vec![Phase::Kenl]);
    }

    #[test]
    fn test_read_missing_trail_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let trail = JsonlTrail::new(dir.path().join("nope.jsonl"));
        assert!(trail.read_all().unwrap().is_empty());
        let health = trail.health(70.0).unwrap();
        assert_eq!(health.total_validations, 0);
        assert!(!health.snap_in_achieved);
        assert_eq!(health.phase_distribution[&Phase::Spiral], 0);
    }

    #[test]
    fn test_read_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let trail = JsonlTrail::new(dir.path().join("t.jsonl"));
        trail.append(&record("a", 90.0)).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(trail.path())
            .and_then(|mut f| writeln!(f, "\n"))
            .unwrap();
        trail.append(&record("b", 90.0)).unwrap();
        assert_eq!(trail.read_all().unwrap().len(), 2);
    }

    #[test]
    fn test_corrupt_line_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        fs::write(&path, "{not json}\n").unwrap();
        assert!(JsonlTrail::new(path).read_all().is_err());
    }

    #[test]
    fn test_health_aggregates() {
        let records = vec![record("a", 80.0), record("b", 65.0), record("c", 20.0)];
        let health = VortexHealth::from_records(&records, 70.0);
        assert_eq!(health.total_validations, 3);
        assert!((health.average_coherence - 55.0).abs() < 1e-9);
        assert!(!health.snap_in_achieved);
        assert_eq!(health.phase_distribution[&Phase::Kenl], 2);
        assert_eq!(health.phase_distribution[&Phase::Atom], 2);
        assert_eq!(health.phase_distribution[&Phase::Spiral], 1);
    }

    #[test]
    fn test_persist_or_log_reports_failure() {
        let status = persist_or_log(&BrokenSink, &record("x", 90.0));
        assert!(matches!(status, TrailStatus::Failed(ref msg) if msg.contains("read-only")));
    }

    #[test]
    fn test_memory_trail() {
        let sink = MemoryTrail::new();
        assert!(sink.is_empty());
        assert!(persist_or_log(&sink, &record("x", 90.0)).is_persisted());
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.records()[0].atom_tag, "x");
    }
}
