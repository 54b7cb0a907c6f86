use crate::queue::TaskStatus;
use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `magpie`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; the binary continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum MagpieError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Intent provider ──────────────────────────────────────────────────
    #[error("provider: {0}")]
    Provider(#[from] ProviderError),

    // ── Task queue ───────────────────────────────────────────────────────
    #[error("queue: {0}")]
    Queue(#[from] QueueError),

    // ── Security / Policy ────────────────────────────────────────────────
    #[error("security: {0}")]
    Security(#[from] SecurityError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Intent provider errors ─────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected response: {0}")]
    Response(String),

    #[error("failed to parse intent: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

// ─── Task queue errors ──────────────────────────────────────────────────────

/// Failures of the task queue and executor. Every variant leaves the queue
/// (memory and disk) exactly as it was before the rejected operation.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error("cannot transition task {id} from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("queue persistence: {0}")]
    Persistence(String),
}

impl From<std::io::Error> for QueueError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

// ─── Security errors ────────────────────────────────────────────────────────

/// The policy engine itself returns decisions as values, never errors;
/// these variants exist for callers that must surface a denial as a failure.
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("denied: {0}")]
    Denied(String),

    #[error("authorization required: {0}")]
    AuthRequired(String),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, MagpieError>;
