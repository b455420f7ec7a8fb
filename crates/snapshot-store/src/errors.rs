use thiserror::Error;

use traceview_core_types::TraceError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SnapErrKind {
    #[error("frame not found: {0}")]
    FrameNotFound(String),
    #[error("snapshot not found: {0}")]
    SnapshotNotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error(transparent)]
pub struct SnapError(pub SnapErrKind);

impl SnapError {
    pub fn new(kind: SnapErrKind) -> Self {
        Self(kind)
    }

    pub fn kind(&self) -> &SnapErrKind {
        &self.0
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self.0,
            SnapErrKind::FrameNotFound(_) | SnapErrKind::SnapshotNotFound(_)
        )
    }
}

impl From<SnapError> for TraceError {
    fn from(value: SnapError) -> Self {
        if value.is_not_found() {
            TraceError::NotFound(value.to_string())
        } else {
            TraceError::new(value.to_string())
        }
    }
}

impl From<SnapErrKind> for SnapError {
    fn from(kind: SnapErrKind) -> Self {
        SnapError(kind)
    }
}

pub type SnapResult<T> = Result<T, SnapError>;
