use std::fmt::Display;
use std::fmt::Formatter;
use std::result;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use query::error::ErrorKind;
use query::error::QueryError;
use serde::Serialize;
use serde::Serializer;
use thiserror::Error;

pub type Result<T> = result::Result<T, PlatformError>;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("bad request: {0:?}")]
    BadRequest(String),
    #[error("internal: {0:?}")]
    Internal(String),
    #[error("serde: {0:?}")]
    Serde(#[from] serde_json::Error),
    #[error("query: {0}")]
    Query(#[from] QueryError),
}

impl PlatformError {
    pub fn into_api_error(self) -> ApiError {
        match self {
            // malformed payloads are invalid queries, unknown enum values included
            PlatformError::BadRequest(msg) => ApiError::bad_request(msg),
            PlatformError::Serde(err) => ApiError::bad_request(err.to_string()),
            PlatformError::Internal(msg) => ApiError::internal(msg),
            PlatformError::Query(err) => {
                let kind = err.kind();
                let status = match kind {
                    ErrorKind::InvalidQuery => StatusCode::BAD_REQUEST,
                    ErrorKind::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                    ErrorKind::Cancelled => StatusCode::REQUEST_TIMEOUT,
                    ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                ApiError::new(status, kind).with_message(err.to_string())
            }
        }
    }
}

#[derive(Error, Serialize, Debug, Clone)]
pub struct ApiError {
    #[serde(serialize_with = "serialize_http_code")]
    pub status: StatusCode,
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message.clone().unwrap_or_default())
    }
}

#[derive(Serialize)]
struct ApiErrorWrapper {
    pub error: ApiError,
}

pub fn serialize_http_code<S: Serializer>(
    status: &StatusCode,
    ser: S,
) -> std::result::Result<S::Ok, S::Error> {
    ser.serialize_u16(status.as_u16())
}

impl ApiError {
    pub fn bad_request(err: impl ToString) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, ErrorKind::InvalidQuery)
            .with_message(err.to_string())
    }

    pub fn internal(err: impl ToString) -> Self {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Internal)
            .with_message(err.to_string())
    }

    pub fn new(status: StatusCode, kind: ErrorKind) -> Self {
        Self {
            status,
            kind,
            message: None,
        }
    }

    pub fn with_message(self, message: String) -> Self {
        Self {
            message: Some(message),
            ..self
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiErrorWrapper { error: self })).into_response()
    }
}

impl IntoResponse for PlatformError {
    fn into_response(self) -> Response {
        self.into_api_error().into_response()
    }
}
