use rusoto_core::RusotoError;
use rusoto_s3::{DeleteObjectError, PutObjectError};
use thiserror::Error;

use crate::models::UserId;

/// Enumerates high-level errors returned by this library. The domain
/// variants carry the exact message shown to clients.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Malformed numeric, timestamp or identifier input.
    #[error("{0}")]
    Parse(String),

    /// A referenced identifier does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A field-level constraint was violated.
    #[error("{0}")]
    Validation(String),

    /// An attempt to modify a record owned by something else.
    #[error("{0}")]
    Permission(String),

    /// Creation of an existing record, or edit of a missing one.
    #[error("{0}")]
    Conflict(String),

    /// Retrieval of a remote image failed.
    #[error("{0}")]
    ExternalFetch(String),

    /// Represents an SQL error.
    #[error("database error")]
    Sqlx { source: sqlx::Error },

    /// Represents a failure to upload to the store.
    #[error("failed to save file to store")]
    UploadFailed { source: RusotoError<PutObjectError> },

    /// Represents a failure to delete from the store.
    #[error("failed to delete file from store")]
    DeleteFailed {
        source: RusotoError<DeleteObjectError>,
    },

    /// Represents a failure to generate a URL for a stored file.
    #[error("failed to generate URL")]
    FailedToGenerateUrl { source: url::ParseError },
}

impl BackendError {
    pub fn parse(message: impl Into<String>) -> Self {
        BackendError::Parse(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        BackendError::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        BackendError::Validation(message.into())
    }

    pub fn permission(message: impl Into<String>) -> Self {
        BackendError::Permission(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        BackendError::Conflict(message.into())
    }

    pub fn external_fetch(message: impl Into<String>) -> Self {
        BackendError::ExternalFetch(message.into())
    }

    /// Prepends `prefix` to the message of a domain error, keeping its
    /// kind. Infrastructure errors are returned unchanged.
    pub fn with_prefix(self, prefix: impl AsRef<str>) -> Self {
        use BackendError::*;

        let prefix = prefix.as_ref();

        match self {
            Parse(m) => Parse(format!("{}{}", prefix, m)),
            NotFound(m) => NotFound(format!("{}{}", prefix, m)),
            Validation(m) => Validation(format!("{}{}", prefix, m)),
            Permission(m) => Permission(format!("{}{}", prefix, m)),
            Conflict(m) => Conflict(format!("{}{}", prefix, m)),
            ExternalFetch(m) => ExternalFetch(format!("{}{}", prefix, m)),
            other => other,
        }
    }
}

/// A failed reconciliation, optionally naming a user row that was
/// already written so the caller can remove it.
#[derive(Debug)]
pub struct Failure {
    pub error: BackendError,
    pub uid: Option<UserId>,
}

impl Failure {
    pub fn with_uid(error: BackendError, uid: UserId) -> Self {
        Failure {
            error,
            uid: Some(uid),
        }
    }
}

impl From<BackendError> for Failure {
    fn from(error: BackendError) -> Self {
        Failure { error, uid: None }
    }
}
