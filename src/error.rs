use std::io;
use std::path::PathBuf;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Failures reading or writing one of the JSON data files.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unable to access data file {path:?}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Unable to parse contents of {path:?}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Unable to serialize data for {path:?}")]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    /// A 400 carrying a short error plus a longer explanation for the form.
    #[error("{error}: {message}")]
    Rejected { error: String, message: String },
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn rejected(error: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Rejected {
            error: error.into(),
            message: message.into(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Rejected { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::Rejected { error, message } => json!({ "error": error, "message": message }),
            ApiError::Store(err) => {
                log::error!("{err}: {:?}", std::error::Error::source(err));
                json!({ "error": "An internal error occurred while processing the request" })
            }
            ApiError::Internal(msg) => {
                log::error!("{msg}");
                json!({ "error": "An internal error occurred while processing the request" })
            }
            other => json!({ "error": other.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
