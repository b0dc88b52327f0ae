//! Error types shared by both document-store backends.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for document-store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for document-store operations
#[derive(Debug, Error)]
pub enum Error {
    /// A mandatory filter, document, update or pipeline was absent
    #[error("mongo: document is nil")]
    NilDocument,

    /// The caller's result type cannot hold the returned document(s)
    #[error("mongo: Decode({target}): {reason}")]
    InvalidDecodeTarget {
        /// Rust type name of the decode target
        target: &'static str,
        /// Underlying decoder message
        reason: String,
    },

    /// A find-one style operation matched nothing
    #[error("mongo: no documents in result")]
    NoDocuments,

    /// A mandatory connection field is missing
    #[error("Configuration error: {0}")]
    Config(String),

    /// The native backend has no live connection (never connected, or closed)
    #[error("mongo: client is not connected")]
    NotConnected,

    /// The per-operation deadline elapsed before the call completed
    #[error("Deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    /// Network-level failure reaching the Data API
    #[error("Transport error: {0}")]
    Transport(String),

    /// The Data API answered with a non-success status
    #[error("Data API error: {0}")]
    Status(#[from] StatusError),

    /// A string that is not a 24-character hex object id
    #[error("the provided string is not a valid ObjectID: {0:?}")]
    InvalidObjectId(String),

    /// Failure reported by the native driver
    #[error("MongoDB error: {0}")]
    Backend(#[from] mongodb::error::Error),

    /// JSON to BSON conversion failure
    #[error("BSON conversion error: {0}")]
    Bson(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An external dump/restore tool exited unsuccessfully
    #[error("failed to {action}: {stderr}\n{status}")]
    Process {
        /// `backup` or `restore`
        action: &'static str,
        /// Exit status as reported by the OS
        status: std::process::ExitStatus,
        /// The tool's diagnostic output
        stderr: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this is the expected "nothing matched" outcome
    pub fn is_no_documents(&self) -> bool {
        matches!(self, Error::NoDocuments)
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Error::DeadlineExceeded(_))
    }

    /// Build an [`Error::InvalidDecodeTarget`] for target type `T`
    pub(crate) fn decode_target<T>(reason: impl std::fmt::Display) -> Self {
        Error::InvalidDecodeTarget {
            target: std::any::type_name::<T>(),
            reason: reason.to_string(),
        }
    }
}

/// Classified non-success HTTP status from the Data API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StatusError {
    /// 400
    #[error("the request was invalid")]
    BadRequest,

    /// 401
    #[error("the request did not include an authorized and enabled Data API Key")]
    Unauthorized,

    /// 404
    #[error("the request was sent to an endpoint that does not exist")]
    NotFound,

    /// 500
    #[error("the Data API encountered an internal error and could not complete the request")]
    Internal,

    /// Anything else that is not 200/201
    #[error("unknown status code: {0}")]
    Unknown(u16),
}

impl StatusError {
    /// Classify an HTTP status code. `None` means success (200/201).
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200 | 201 => None,
            400 => Some(StatusError::BadRequest),
            401 => Some(StatusError::Unauthorized),
            404 => Some(StatusError::NotFound),
            500 => Some(StatusError::Internal),
            other => Some(StatusError::Unknown(other)),
        }
    }

    /// The numeric status this error was classified from
    pub fn code(&self) -> u16 {
        match self {
            StatusError::BadRequest => 400,
            StatusError::Unauthorized => 401,
            StatusError::NotFound => 404,
            StatusError::Internal => 500,
            StatusError::Unknown(code) => *code,
        }
    }
}
