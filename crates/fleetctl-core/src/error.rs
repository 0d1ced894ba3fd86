//! Error taxonomy shared by every `fleetctl` crate.
//!
//! Mirrors the shape of the teacher's `CoreError`/`ErrorCategory` split
//! (`spark_core::error`): a stable `code`, a human `detail`, and a category
//! that drives the resilience fabric's retry/circuit-breaker decisions
//! instead of callers re-deriving it from string matching.

use std::fmt;

/// One entry per error kind named in spec §7.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("validation failed: {detail}")]
    Validation { code: &'static str, detail: String },

    #[error("not found: {detail}")]
    NotFound { code: &'static str, detail: String },

    #[error("conflict: {detail}")]
    Conflict { code: &'static str, detail: String },

    #[error("unauthorized: {detail}")]
    Unauthorized { code: &'static str, detail: String },

    #[error("forbidden: {detail}")]
    Forbidden { code: &'static str, detail: String },

    #[error("transient failure: {detail}")]
    Transient { code: &'static str, detail: String },

    #[error("circuit open: {detail}")]
    CircuitOpen { code: &'static str, detail: String },

    #[error("bulkhead full: {detail}")]
    BulkheadFull { code: &'static str, detail: String },

    #[error("timed out: {detail}")]
    Timeout { code: &'static str, detail: String },

    #[error("deadline exceeded: {detail}")]
    DeadlineExceeded { code: &'static str, detail: String },

    #[error("poison record: {detail}")]
    Poison { code: &'static str, detail: String },

    #[error("fatal: {detail}")]
    Fatal { code: &'static str, detail: String },
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, FleetError>;

/// Drives resilience-fabric behavior: only `Retryable` errors are eligible
/// for the retry decorator; `Fatal` should crash the worker rather than be
/// swallowed (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Retryable,
    NonRetryable,
    Fatal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Retryable => "retryable",
            ErrorCategory::NonRetryable => "non_retryable",
            ErrorCategory::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

impl FleetError {
    pub fn validation(code: &'static str, detail: impl Into<String>) -> Self {
        FleetError::Validation { code, detail: detail.into() }
    }

    pub fn not_found(code: &'static str, detail: impl Into<String>) -> Self {
        FleetError::NotFound { code, detail: detail.into() }
    }

    pub fn conflict(code: &'static str, detail: impl Into<String>) -> Self {
        FleetError::Conflict { code, detail: detail.into() }
    }

    pub fn transient(code: &'static str, detail: impl Into<String>) -> Self {
        FleetError::Transient { code, detail: detail.into() }
    }

    /// Stable `<domain>.<reason>` error code, per spec §7's structured body.
    pub fn code(&self) -> &'static str {
        match self {
            FleetError::Validation { code, .. }
            | FleetError::NotFound { code, .. }
            | FleetError::Conflict { code, .. }
            | FleetError::Unauthorized { code, .. }
            | FleetError::Forbidden { code, .. }
            | FleetError::Transient { code, .. }
            | FleetError::CircuitOpen { code, .. }
            | FleetError::BulkheadFull { code, .. }
            | FleetError::Timeout { code, .. }
            | FleetError::DeadlineExceeded { code, .. }
            | FleetError::Poison { code, .. }
            | FleetError::Fatal { code, .. } => code,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            FleetError::Validation { detail, .. }
            | FleetError::NotFound { detail, .. }
            | FleetError::Conflict { detail, .. }
            | FleetError::Unauthorized { detail, .. }
            | FleetError::Forbidden { detail, .. }
            | FleetError::Transient { detail, .. }
            | FleetError::CircuitOpen { detail, .. }
            | FleetError::BulkheadFull { detail, .. }
            | FleetError::Timeout { detail, .. }
            | FleetError::DeadlineExceeded { detail, .. }
            | FleetError::Poison { detail, .. }
            | FleetError::Fatal { detail, .. } => detail,
        }
    }

    /// The category driving the resilience fabric's retry predicate
    /// (spec §4.3: "network timeouts, connection refused, I/O errors, and
    /// broker connection failures" are retryable; everything else is not).
    pub fn category(&self) -> ErrorCategory {
        match self {
            FleetError::Transient { .. }
            | FleetError::CircuitOpen { .. }
            | FleetError::BulkheadFull { .. }
            | FleetError::Timeout { .. }
            | FleetError::DeadlineExceeded { .. } => ErrorCategory::Retryable,
            FleetError::Fatal { .. } => ErrorCategory::Fatal,
            FleetError::Validation { .. }
            | FleetError::NotFound { .. }
            | FleetError::Conflict { .. }
            | FleetError::Unauthorized { .. }
            | FleetError::Forbidden { .. }
            | FleetError::Poison { .. } => ErrorCategory::NonRetryable,
        }
    }

    /// HTTP status mapping per spec §7's taxonomy table.
    pub fn http_status(&self) -> u16 {
        match self {
            FleetError::Validation { .. } => 400,
            FleetError::Unauthorized { .. } => 401,
            FleetError::Forbidden { .. } => 403,
            FleetError::NotFound { .. } => 404,
            FleetError::Conflict { .. } => 409,
            FleetError::CircuitOpen { .. }
            | FleetError::BulkheadFull { .. }
            | FleetError::Timeout { .. }
            | FleetError::DeadlineExceeded { .. }
            | FleetError::Transient { .. } => 503,
            FleetError::Poison { .. } | FleetError::Fatal { .. } => 500,
        }
    }
}
