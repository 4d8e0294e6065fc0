// ─────────────────────────────────────────────────────────────────────
// SpiralSafe — Gate Kernel Types
// (C) 2026 SpiralSafe Contributors. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Value types, configuration, and error hierarchy shared by the
//! coherence scorer, the phase-gate pipeline, and its adapters.

pub mod config;
pub mod error;
pub mod phase;
pub mod score;

pub use config::{DivergenceNormalization, GateConfig, PhaseThresholds};
pub use error::{SpiralError, SpiralResult};
pub use phase::{
    EscapeHatch, GateContext, GateVerdict, Marker, Phase, PhaseVerdict, PipelineResult,
};
pub use score::{clamp_score, CoherenceMetrics, CoherenceResult};
