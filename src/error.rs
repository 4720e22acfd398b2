use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// ErrorResponse
///
/// The JSON body every failed request carries.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ErrorResponse {
    pub status: u16,
    pub code: String,
    pub message: String,
}

/// ApiError
///
/// Failure taxonomy shared by the authorization gate, the user service and the
/// endpoints. Each variant maps to exactly one status code; nothing is retried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApiError {
    /// Credentials missing, malformed, expired, or naming an unknown user.
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Account is inactive")]
    AccountInactive,

    /// Authenticated, but the route requires rights the caller lacks.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Self-or-admin policy violation on a single-user route.
    #[error("Unauthorized access to this user")]
    Unauthorized,

    #[error("User not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any storage failure. Transient and permanent failures are not told apart.
    #[error("Storage failure: {0}")]
    Storage(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated | ApiError::AccountInactive => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) | ApiError::Unauthorized => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "UNAUTHENTICATED",
            ApiError::AccountInactive => "ACCOUNT_INACTIVE",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Storage(_) => "INTERNAL_ERROR",
        }
    }

    /// Builds the wire body. Storage details never leave the process.
    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            ApiError::Storage(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        ErrorResponse {
            status: self.status_code().as_u16(),
            code: self.error_code().to_string(),
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Storage(detail) = &self {
            tracing::error!(detail = %detail, "storage failure surfaced to caller");
        }

        let mut response = (self.status_code(), Json(self.to_response())).into_response();
        if self == ApiError::Unauthenticated {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ApiError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ApiError::Conflict("a user with these identifying fields already exists".into())
            }
            _ => ApiError::Storage(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Validation(errors.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}
