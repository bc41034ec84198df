//! Error types shared by the filesystem, repository and LFS layers.

use std::io;
use thiserror::Error;

/// Error type returned by raw `ObjectBackend` implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A failed call against the object store, tagged with the operation and key.
#[derive(Error, Debug)]
#[error("{op} `{key}`: {source}")]
pub struct BackendError {
    pub op: &'static str,
    pub key: String,
    #[source]
    pub source: BoxError,
}

impl BackendError {
    pub fn new(op: &'static str, key: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            op,
            key: key.into(),
            source: source.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum FsError {
    #[error("{op} {path}: file does not exist")]
    NotFound { op: &'static str, path: String },

    #[error("{op} {path}: file already exists")]
    AlreadyExists { op: &'static str, path: String },

    #[error("{path}: file already closed")]
    Closed { path: String },

    #[error("{op}: invalid operation: {reason}")]
    InvalidOperation { op: &'static str, reason: String },

    #[error("{op}: operation not supported")]
    Unsupported { op: &'static str },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl FsError {
    pub fn not_found(op: &'static str, path: impl Into<String>) -> Self {
        Self::NotFound {
            op,
            path: path.into(),
        }
    }

    pub fn invalid(op: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            op,
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<FsError> for io::Error {
    fn from(err: FsError) -> Self {
        let kind = match &err {
            FsError::NotFound { .. } => io::ErrorKind::NotFound,
            FsError::AlreadyExists { .. } => io::ErrorKind::AlreadyExists,
            FsError::InvalidOperation { .. } => io::ErrorKind::InvalidInput,
            FsError::Unsupported { .. } => io::ErrorKind::Unsupported,
            FsError::Closed { .. } | FsError::Backend(_) => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("invalid storage path `{0}`")]
    InvalidPath(String),

    #[error("repository deletion stopped after {deleted} objects: {source}")]
    PartialDelete {
        deleted: usize,
        #[source]
        source: BackendError,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Error, Debug)]
pub enum LfsError {
    #[error("LFS object {oid} not found")]
    ObjectNotFound { oid: String },

    #[error("invalid LFS oid `{0}`")]
    InvalidOid(String),

    #[error("LFS object {oid}: expected {expected} bytes, read {actual}")]
    SizeMismatch {
        oid: String,
        expected: u64,
        actual: u64,
    },

    #[error("presigned URL expiry must be positive")]
    InvalidExpiry,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Backend(#[from] BackendError),
}
