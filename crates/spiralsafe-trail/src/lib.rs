// ─────────────────────────────────────────────────────────────────────
// SpiralSafe — ATOM Trail, Tags, Execution Guard, and Ledger
// (C) 2026 SpiralSafe Contributors. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Adapters around the pure gate kernel.
//!
//! - `trail` — append-only JSON-lines persistence and vortex health
//! - `tag` — `ATOM-<CATEGORY>-<YYYYMMDD>-<RND>-<slug>` identifiers
//! - `execute` — infrastructure execution behind the gates
//! - `ledger` — cross-repository decision ledger
//! - `validate` — score, gate, tag and persist in one call
//!
//! Every failure here is reported next to the pipeline result, never
//! instead of it.

pub mod execute;
pub mod ledger;
pub mod tag;
pub mod trail;
pub mod validate;

pub use execute::{
    is_production_sensitive, ExecutionGuard, ExecutionOutcome, ExecutionReceipt, ExternalBackend,
    InfraBackend, InfraDecision,
};
pub use ledger::{Attribution, DecisionRecorder, LedgerAtom, RepoState, VortexLedger, VortexState};
pub use tag::{atom_tag, slugify, AtomTag};
pub use trail::{
    persist_or_log, JsonlTrail, MemoryTrail, TrailRecord, TrailSink, TrailStatus, VortexHealth,
    TRAIL_DIR,
};
pub use validate::{Validation, Validator};
