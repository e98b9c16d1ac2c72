//! Maps the core ledger's error taxonomy onto HTTP status codes (spec.md §7),
//! generalizing the teacher's `ReplyErrorKind` -> `RestJsonError` translation
//! (`common/src/types/mod.rs`) down to boskos's five-kind taxonomy.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use common_lib::error::ErrorKind;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Serialize)]
pub struct RestJsonError {
    pub kind: String,
    pub message: String,
}

#[derive(Debug)]
pub struct RestError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RestError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::BadRequest,
            message: message.into(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self.kind {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl ResponseError for RestError {
    fn status_code(&self) -> StatusCode {
        RestError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(RestJsonError {
            kind: self.kind.to_string(),
            message: self.message.clone(),
        })
    }
}

impl From<core_engine::Error> for RestError {
    fn from(source: core_engine::Error) -> Self {
        Self {
            kind: source.kind(),
            message: source.to_string(),
        }
    }
}
