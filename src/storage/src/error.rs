use std::result;

use thiserror::Error;

pub type Result<T> = result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("internal {0:?}")]
    Internal(String),
    #[error("unavailable {0:?}")]
    Unavailable(String),
    #[error("timeout")]
    Timeout,
}
