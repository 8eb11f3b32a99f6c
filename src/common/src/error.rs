use std::result;

use thiserror::Error;

pub type Result<T> = result::Result<T, CommonError>;

#[derive(Error, Debug)]
pub enum CommonError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("unknown timezone {0:?}")]
    UnknownTimezone(String),
    #[error("timestamp out of range: {0}")]
    TimestampOutOfRange(i64),
    #[error("serde: {0:?}")]
    Serde(#[from] serde_json::Error),
}

impl CommonError {
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        CommonError::InvalidQuery(msg.into())
    }
}
