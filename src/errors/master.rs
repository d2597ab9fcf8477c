use thiserror::Error;

use super::{ExceptionCode, FrameFormatKind};

/// The client-side error taxonomy of §7: `IO`, `TIMEOUT`, `PROTOCOL`,
/// `EXCEPTION(code)` and `CONFIG` (the last lives in [`super::ConfigError`]
/// and is folded in via `#[from]` on [`super::ModbusError`]).
#[derive(Error, Debug)]
pub enum MasterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("protocol error: {kind} - {details}")]
    Protocol {
        kind: FrameFormatKind,
        details: String,
    },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("slave returned exception: {0}")]
    Exception(ExceptionCode),

    #[error("no connection open")]
    NotConnected,
}

impl MasterError {
    pub fn protocol(kind: FrameFormatKind, details: impl Into<String>) -> Self {
        Self::Protocol {
            kind,
            details: details.into(),
        }
    }

    /// `IO`/`TIMEOUT` are retried internally by the master up to its configured
    /// budget; `PROTOCOL`/`EXCEPTION` are surfaced immediately (§7).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout(_) | Self::NotConnected)
    }
}

impl From<super::FrameError> for MasterError {
    fn from(err: super::FrameError) -> Self {
        MasterError::Malformed(err.to_string())
    }
}
