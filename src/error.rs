use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{type_name} does not describe a record")]
    NotAStruct { type_name: &'static str },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("store operation `{operation}` timed out")]
    Timeout { operation: &'static str },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CookieError {
    #[error("cookie not found")]
    NotFound,
    #[error("invalid cookie value")]
    InvalidValue,
    #[error("cookie value too long")]
    ValueTooLong,
    #[error("cookie expiry out of range")]
    InvalidExpiry,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Cookie(#[from] CookieError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Config(_)
            | AppError::Io(_)
            | AppError::Database(_)
            | AppError::Store(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Cookie(_) | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
        };

        (status, self.to_string()).into_response()
    }
}
