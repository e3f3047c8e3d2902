use thiserror::Error;

use crate::engine::EngineError;

/// Error kinds surfaced to the host. Matched by kind, not by message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadArgument,
    AlreadyExists,
    Locked,
    NotSupported,
    Unspecified,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagerError {
    #[error("bad argument: {0}")]
    BadArgument(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("locked: {0}")]
    Locked(String),
    #[error("not supported: {0}")]
    NotSupported(String),
    #[error("{0}")]
    Unspecified(String),
    #[error("contact not found: {0}")]
    NotFound(String),
}

impl ManagerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadArgument(_) => ErrorKind::BadArgument,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::Locked(_) => ErrorKind::Locked,
            Self::NotSupported(_) => ErrorKind::NotSupported,
            Self::Unspecified(_) => ErrorKind::Unspecified,
            Self::NotFound(_) => ErrorKind::NotFound,
        }
    }

    /// Map an engine failure to the closest host error kind.
    pub fn from_engine(err: &EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::AddFailed(_) => Self::BadArgument(message),
            EngineError::StoreOffline => Self::Locked(message),
            EngineError::NoWriteableStore
            | EngineError::NotWriteable(_) => Self::NotSupported(message),
            EngineError::Failed(_) => Self::Unspecified(message),
        }
    }
}

impl From<EngineError> for ManagerError {
    fn from(err: EngineError) -> Self {
        Self::from_engine(&err)
    }
}
