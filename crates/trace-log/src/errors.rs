use thiserror::Error;

use traceview_core_types::TraceError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LogError {
    #[error("malformed record: {0}")]
    Malformed(String),
    #[error("unsupported trace version {found} (latest known {latest})")]
    UnsupportedVersion { found: u32, latest: u32 },
    #[error("internal error: {0}")]
    Internal(String),
}

impl LogError {
    /// Malformed lines are skipped; everything else aborts the log.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LogError::Malformed(_))
    }
}

impl From<serde_json::Error> for LogError {
    fn from(value: serde_json::Error) -> Self {
        LogError::Malformed(value.to_string())
    }
}

impl From<LogError> for TraceError {
    fn from(value: LogError) -> Self {
        match value {
            LogError::Malformed(msg) => TraceError::MalformedRecord(msg),
            LogError::UnsupportedVersion { found, latest } => {
                TraceError::UnsupportedVersion { found, latest }
            }
            LogError::Internal(msg) => TraceError::new(msg),
        }
    }
}

pub type LogResult<T> = Result<T, LogError>;
