use crate::storage::Delta;
use std::error::Error;
use std::io;
use thiserror::Error;

/// An error related to storage operations (reads, writes...).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// Error from the OS I/O layer.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Error related to data corruption.
    #[error(transparent)]
    Corruption(#[from] CorruptionError),
    /// A quad addition found the quad already present.
    #[error("quad already exists")]
    QuadExists,
    /// A quad removal found no quad to remove.
    #[error("quad does not exist")]
    QuadNotExist,
    /// A delta carried an action code the store does not know.
    #[error("invalid action code {0}")]
    InvalidAction(i32),
    /// The on-disk data format is newer than this library.
    #[error("unsupported data version {found}, expected at most {supported}")]
    VersionMismatch { found: i64, supported: i64 },
    /// A required bucket is absent from the backend.
    #[error("missing storage bucket {0}")]
    MissingBucket(&'static str),
    /// A delta could not be applied.
    #[error(transparent)]
    Delta(#[from] Box<DeltaError>),
    #[doc(hidden)]
    #[error("{0}")]
    Other(#[source] Box<dyn Error + Send + Sync + 'static>),
}

impl From<StorageError> for io::Error {
    #[inline]
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::Io(error) => error,
            StorageError::Corruption(error) => error.into(),
            error => Self::new(io::ErrorKind::InvalidData, error),
        }
    }
}

/// An error returned if some content in the database is corrupted.
#[derive(Debug, Error)]
pub enum CorruptionError {
    #[error("{0}")]
    Msg(String),
    #[error("{0}")]
    Other(#[source] Box<dyn Error + Send + Sync + 'static>),
}

impl CorruptionError {
    /// Builds an error from a printable error message.
    #[inline]
    pub(crate) fn new(error: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        Self::Other(error.into())
    }

    /// Builds an error from a printable error message.
    #[inline]
    pub(crate) fn msg(msg: impl Into<String>) -> Self {
        Self::Msg(msg.into())
    }
}

impl From<CorruptionError> for io::Error {
    #[inline]
    fn from(error: CorruptionError) -> Self {
        Self::new(io::ErrorKind::InvalidData, error)
    }
}

/// The compound error attached to the delta a batch failed on.
#[derive(Debug, Error)]
#[error("delta for {} could not be applied: {source}", .delta.quad)]
pub struct DeltaError {
    /// The offending delta.
    pub delta: Delta,
    /// The underlying cause.
    #[source]
    pub source: StorageError,
}

impl DeltaError {
    pub(crate) fn new(delta: Delta, source: StorageError) -> StorageError {
        StorageError::Delta(Box::new(Self { delta, source }))
    }
}
