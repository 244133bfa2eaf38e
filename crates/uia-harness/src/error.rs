//! Error types for the harness and the bridge client.

use std::path::PathBuf;

use uia_sync::{AggregateError, MismatchReport, WaitError};

use crate::ribbon::ButtonState;

/// Errors from the capability layer (bridge process or any other backend).
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to spawn bridge process: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("Bridge executable not found: {0}")]
    ProgramNotFound(String),

    #[error("Bridge process not running")]
    NotRunning,

    #[error("Failed to send command to bridge: {0}")]
    SendFailed(String),

    #[error("Failed to read response from bridge: {0}")]
    ReadFailed(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The backend ran the command and reported a failure.
    #[error("Bridge returned error: {0}")]
    Remote(String),

    #[error("Response id {got} does not match request id {expected}")]
    IdMismatch { expected: u64, got: u64 },

    #[error("Unexpected response data for {0}")]
    UnexpectedResponse(&'static str),
}

/// Errors surfaced to test code.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Wait(#[from] WaitError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Ribbon buttons still in the wrong state after the deadline.
    #[error(transparent)]
    ButtonStates(#[from] MismatchReport<String, ButtonState>),

    #[error("Element '{0}' is not enabled")]
    NotEnabled(String),

    #[error("Element '{0}' no longer exists")]
    ElementGone(String),

    #[error("Checkbox '{0}' is in an indeterminate state")]
    Indeterminate(String),

    #[error("Row '{0}' not found in grid")]
    RowNotFound(String),

    #[error("Failed to read config {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl From<AggregateError<String, ButtonState>> for HarnessError {
    fn from(err: AggregateError<String, ButtonState>) -> Self {
        match err {
            AggregateError::Mismatch(report) => HarnessError::ButtonStates(report),
            AggregateError::Wait(e) => HarnessError::Wait(e),
        }
    }
}

impl HarnessError {
    /// True when the error is a deadline expiry rather than a hard failure.
    pub fn is_timeout(&self) -> bool {
        match self {
            HarnessError::Wait(e) => e.is_timeout(),
            HarnessError::ButtonStates(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
