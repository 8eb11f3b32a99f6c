use std::result;

use metadata::error::MetadataError;
use thiserror::Error;
use tracing::subscriber::SetGlobalDefaultError;

pub type Result<T> = result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("internal: {0}")]
    Internal(String),
    #[error("config: {0:?}")]
    Config(#[from] config::ConfigError),
    #[error("duration: {0:?}")]
    Duration(#[from] humantime::DurationError),
    #[error("fixtures: {0:?}")]
    Serde(#[from] serde_json::Error),
    #[error("metadata: {0:?}")]
    Metadata(#[from] MetadataError),
    #[error("StdIO: {0:?}")]
    StdIO(#[from] std::io::Error),
    #[error("set global default subscriber: {0:?}")]
    SetGlobalDefaultError(#[from] SetGlobalDefaultError),
}
