//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no database url: set SQLALCHEMY_DATABASE_URI or DATABASE_URL")]
    MissingDatabaseUrl,
    #[error("invalid setting {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

/// Failure while introspecting the live schema. Discovery always recovers from these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("listing tables: {0}")]
    Listing(String),
    #[error("reflecting {table}: {message}")]
    Reflection { table: String, message: String },
}

/// Failure deriving one field of a view config. The field is left unset.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewConfigError {
    #[error("column {index} has an empty name")]
    EmptyColumnName { index: usize },
    #[error("column {column} has no declared type")]
    MissingType { column: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("table {0} has no primary key")]
    NoPrimaryKey(String),
    #[error("endpoint {endpoint} already registered for table {existing}")]
    DuplicateEndpoint { endpoint: String, existing: String },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("render: {0}")]
    Render(#[from] minijinja::Error),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// SQLSTATE class 22: the database could not convert a submitted value, e.g. `abc` cast to integer.
fn is_data_exception(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.code().is_some_and(|code| code.starts_with("22")),
        _ => false,
    }
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::Db(sqlx::Error::RowNotFound) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Db(e) if is_data_exception(e) => (StatusCode::BAD_REQUEST, "invalid_input"),
            AppError::Db(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Render(_) => (StatusCode::INTERNAL_SERVER_ERROR, "render_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
