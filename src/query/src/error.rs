use std::fmt;
use std::result;

use common::error::CommonError;
use metadata::error::MetadataError;
use serde::Serialize;
use storage::error::StoreError;
use thiserror::Error;

pub type Result<T> = result::Result<T, QueryError>;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("cancelled")]
    Cancelled,
    #[error("internal {0:?}")]
    Internal(String),
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<QueryError>,
    },
    #[error("metadata {0:?}")]
    Metadata(#[from] MetadataError),
    #[error("common {0:?}")]
    Common(#[from] CommonError),
    #[error("store {0:?}")]
    Store(#[from] StoreError),
}

/// Machine readable error class returned to callers.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidQuery,
    UpstreamUnavailable,
    Cancelled,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidQuery => "InvalidQuery",
            ErrorKind::UpstreamUnavailable => "UpstreamUnavailable",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Internal => "Internal",
        };
        write!(f, "{s}")
    }
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::InvalidQuery(_) => ErrorKind::InvalidQuery,
            QueryError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            QueryError::Cancelled => ErrorKind::Cancelled,
            QueryError::Internal(_) => ErrorKind::Internal,
            QueryError::Context { source, .. } => source.kind(),
            QueryError::Metadata(err) => match err {
                MetadataError::Unavailable(_) => ErrorKind::UpstreamUnavailable,
                _ => ErrorKind::Internal,
            },
            QueryError::Common(err) => match err {
                CommonError::InvalidQuery(_)
                | CommonError::UnknownTimezone(_)
                | CommonError::TimestampOutOfRange(_) => ErrorKind::InvalidQuery,
                _ => ErrorKind::Internal,
            },
            QueryError::Store(err) => match err {
                StoreError::Unavailable(_) | StoreError::Timeout => {
                    ErrorKind::UpstreamUnavailable
                }
                _ => ErrorKind::Internal,
            },
        }
    }

    /// The caller may retry, the engine never does.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::UpstreamUnavailable
    }

    pub fn with_context(self, context: impl Into<String>) -> Self {
        QueryError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }
}
