use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Corrupt session")]
    CorruptSession,
    #[error("Invalid identity token")]
    InvalidToken,
    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[derive(Error, Debug)]
pub enum TastingError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Only the host may do this")]
    NotHost,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Tasting not found")]
    TastingNotFound,
    #[error("No response submitted for this tasting")]
    ResponseNotFound,
    #[error("Tasting is closed")]
    TastingClosed,
    #[error("Tasting is not closed yet")]
    TastingNotClosed,
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            AuthError::CorruptSession => (StatusCode::BAD_REQUEST, "Corrupt session"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid identity token"),
            AuthError::DatabaseError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.as_str()),
        };

        let body = Json(json!({
            "error": error_message,
            "details": self.to_string()
        }));

        (status, body).into_response()
    }
}

impl IntoResponse for TastingError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            TastingError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            TastingError::NotHost => (StatusCode::FORBIDDEN, "Only the host may do this"),
            TastingError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            TastingError::TastingNotFound => (StatusCode::NOT_FOUND, "Tasting not found"),
            TastingError::ResponseNotFound => {
                (StatusCode::NOT_FOUND, "No response submitted for this tasting")
            }
            TastingError::TastingClosed => (StatusCode::CONFLICT, "Tasting is closed"),
            TastingError::TastingNotClosed => (StatusCode::CONFLICT, "Tasting is not closed yet"),
            TastingError::DatabaseError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.as_str()),
        };

        let body = Json(json!({
            "error": error_message,
            "details": self.to_string()
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for TastingError {
    fn from(error: sqlx::Error) -> Self {
        TastingError::DatabaseError(error.to_string())
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(error: sqlx::Error) -> Self {
        AuthError::DatabaseError(error.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        AuthError::InvalidToken
    }
}
