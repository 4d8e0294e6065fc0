// ─────────────────────────────────────────────────────────────────────
// SpiralSafe — Gate Kernel Core Engine
// (C) 2026 SpiralSafe Contributors. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Coherence scoring and phase gating for commit messages, PR bodies
//! and decision justifications.
//!
//! Data flows one way:
//!
//! ```text
//! text → MetricExtractor → CoherenceScorer → GateContext
//!      → EscapeHatchResolver / GateEvaluator → PipelineRunner → PipelineResult
//! ```
//!
//! # Invariants
//!
//! 1. **Pure**: every component is a function of its inputs and an
//!    immutable `GateConfig`. Nothing is cached between calls, so
//!    evaluations for different requests can run in parallel freely.
//!
//! 2. **Gate failure is a value**: a blocked phase is a negative
//!    `GateVerdict` with a reason string, never an error or panic.
//!
//! 3. **Prefix semantics**: `PipelineResult::passed` is always a prefix
//!    of the requested phases. The first failure ends the run.
//!
//! 4. **Escape precedence**: `emergency-merge` beats
//!    `coherence-override`, and either passes every phase.

pub mod escape;
pub mod gate;
pub mod metrics;
pub mod pipeline;
pub mod scorer;

pub use escape::EscapeHatchResolver;
pub use gate::{DomainProfile, GateEvaluator, Precondition};
pub use metrics::{join_fields, MetricExtractor};
pub use pipeline::{derive_markers, PipelineRunner};
pub use scorer::CoherenceScorer;
