// ─────────────────────────────────────────────────────────────────────
// SpiralSafe — Escape-Hatch Resolver
// ─────────────────────────────────────────────────────────────────────
//! Labelled overrides that unconditionally pass every phase.
//!
//! A text whose score hovers just under a threshold can be edited
//! forever without making progress (the "Penrose step"). Escape
//! hatches are the deliberate, auditable exit from that loop.
//!
//! Precedence is fixed: `emergency-merge` wins over
//! `coherence-override` whenever both are present.

use std::collections::BTreeSet;

use spiralsafe_types::EscapeHatch;

/// Resolves request labels into at most one escape hatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct EscapeHatchResolver;

impl EscapeHatchResolver {
    pub fn resolve(&self, labels: &BTreeSet<String>) -> Option<EscapeHatch> {
        EscapeHatch::PRIORITY
            .into_iter()
            .find(|hatch| labels.contains(hatch.label()))
    }
}
