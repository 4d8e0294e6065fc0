// ─────────────────────────────────────────────────────────────────────
// SpiralSafe — Gate Kernel Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for the gate kernel and its adapters.
///
/// Gate failures are never represented here: a blocked phase is an
/// ordinary `GateVerdict { passed: false, .. }`. Only configuration
/// loading and the external-collaborator adapters produce errors.
#[derive(Error, Debug)]
pub enum SpiralError {
    /// Configuration is malformed or inconsistent.
    #[error("config error: {0}")]
    Config(String),

    /// A record handed to an adapter is invalid (empty tag, score > 100).
    #[error("validation error: {0}")]
    Validation(String),

    /// Appending to or reading from the trail failed.
    #[error("trail error: {0}")]
    Trail(#[from] std::io::Error),

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A remote collaborator (provisioning API, ledger) failed.
    #[error("external error: {0}")]
    External(String),

    /// A required collaborator or credential is absent.
    #[error("not configured: {0}")]
    NotConfigured(String),
}

pub type SpiralResult<T> = Result<T, SpiralError>;
