//! Error types shared by discovery and polling.

use thiserror::Error;

/// Why a single discovery attempt failed.
///
/// Logged per attempt. [`ProcessResolver::resolve`](crate::discovery::ProcessResolver::resolve)
/// collapses them into `None` once retries run out; `resolve_with_error`
/// hands back the last one.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// No process owned by the target application was listed
    #[error("language server process not found")]
    ProcessNotFound,

    /// A listing command could not be executed or exited with an error
    #[error("command failed: {command}: {message}")]
    CommandFailed { command: String, message: String },

    /// A listing command did not finish in time
    #[error("command timed out after {timeout_ms}ms: {command}")]
    CommandTimedOut { command: String, timeout_ms: u64 },

    /// The process was found but owns no listening TCP socket
    #[error("no listening ports for pid {pid}")]
    NoListeningPorts { pid: u32 },

    /// Every candidate port rejected the probe
    #[error("no port answered the probe for pid {pid} (tried {tried:?})")]
    NoVerifiedPort { pid: u32, tried: Vec<u16> },
}

impl DiscoveryError {
    /// The listing tool itself failed, as opposed to finding nothing
    pub fn is_command_failure(&self) -> bool {
        matches!(
            self,
            DiscoveryError::CommandFailed { .. } | DiscoveryError::CommandTimedOut { .. }
        )
    }
}

/// Why a quota fetch attempt failed.
///
/// `Clone` so the last error of a cycle can be broadcast to every subscriber.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QuotaError {
    /// The request exceeded its deadline
    #[error("request timed out")]
    Timeout,

    /// Connection-level failure (refused, reset, TLS)
    #[error("transport error: {0}")]
    Transport(String),

    /// The local service answered with a non-success status
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The body was not the expected JSON document
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for QuotaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            QuotaError::Timeout
        } else if err.is_decode() {
            QuotaError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            QuotaError::Status(status.as_u16())
        } else {
            QuotaError::Transport(err.to_string())
        }
    }
}
