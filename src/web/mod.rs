//! Demo HTTP surface over the gateway: the `users` CRUD API.
//!
//! Each handler wraps its unit of work in exactly one session or
//! transaction scope before touching a repository; nothing here passes a
//! session around explicitly.

pub mod users;

use crate::core::DbError;
use crate::database::Database;
use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug)]
pub enum WebError {
    Database(DbError),
    NotFound(String),
}

impl From<DbError> for WebError {
    fn from(err: DbError) -> Self {
        Self::Database(err)
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, message, code) = match self {
            WebError::NotFound(message) => (StatusCode::NOT_FOUND, message, "not_found"),
            WebError::Database(err @ DbError::RowNotFound(..)) => {
                (StatusCode::NOT_FOUND, err.to_string(), "not_found")
            }
            WebError::Database(
                err @ (DbError::UnknownColumn(..) | DbError::TypeMismatch(_)),
            ) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string(), "input_error"),
            WebError::Database(err @ DbError::ConstraintViolation(_)) => {
                (StatusCode::CONFLICT, err.to_string(), "conflict")
            }
            WebError::Database(err @ DbError::TableNotFound(_)) => {
                (StatusCode::NOT_FOUND, err.to_string(), "not_found")
            }
            WebError::Database(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
                "database_error",
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

pub fn router(db: Database) -> Router {
    users::routes()
        .with_state(db)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
