use thiserror::Error;

use traceview_core_types::TraceError;
use traceview_snapshot_store::SnapError;
use traceview_trace_log::LogError;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("archive error: {0}")]
    Archive(String),
    #[error(transparent)]
    Log(#[from] LogError),
    #[error(transparent)]
    Snapshot(#[from] SnapError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RouteError {
    pub fn is_not_found(&self) -> bool {
        match self {
            RouteError::NotFound(_) => true,
            RouteError::Snapshot(err) => err.is_not_found(),
            _ => false,
        }
    }

    pub fn status_code(&self) -> u16 {
        if self.is_not_found() {
            return 404;
        }
        match self {
            RouteError::BadRequest(_) => 400,
            _ => 500,
        }
    }
}

impl From<RouteError> for TraceError {
    fn from(value: RouteError) -> Self {
        match value {
            RouteError::NotFound(what) => TraceError::NotFound(what),
            RouteError::Log(err) => err.into(),
            RouteError::Snapshot(err) => err.into(),
            other => TraceError::new(other.to_string()),
        }
    }
}

pub type RouteResult<T> = Result<T, RouteError>;
