use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Validation(String),

    #[error("Invalid signature format")]
    InvalidSignatureFormat,

    #[error("Signature mismatch: recovered {recovered}, expected {expected}")]
    SignatureMismatch { recovered: String, expected: String },

    #[error("Akses Ditolak: {0}")]
    AuthRequired(String),

    #[error("Sesi berakhir atau token tidak valid")]
    InvalidToken,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0}")]
    BusinessRule(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Validation(_) | AppError::InvalidSignatureFormat => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::AuthRequired(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::SignatureMismatch { .. }
            | AppError::InvalidToken
            | AppError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::BusinessRule(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            AppError::Database(ref e) => {
                // Unexpected storage failures stay generic toward the client.
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            status: "error",
            message,
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn validation_maps_to_400() {
        assert_eq!(
            status_of(AppError::Validation("Cow ID is required".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::InvalidSignatureFormat),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn missing_credentials_map_to_401_but_bad_token_to_403() {
        assert_eq!(
            status_of(AppError::AuthRequired("Token tidak ditemukan".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(AppError::InvalidToken), StatusCode::FORBIDDEN);
    }

    #[test]
    fn signature_mismatch_maps_to_403() {
        let err = AppError::SignatureMismatch {
            recovered: "0xaaaa".into(),
            expected: "0xbbbb".into(),
        };
        assert_eq!(status_of(err), StatusCode::FORBIDDEN);
    }

    #[test]
    fn business_rules_map_to_422() {
        assert_eq!(
            status_of(AppError::BusinessRule("Grass tidak cukup".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn internal_errors_stay_generic() {
        let response = AppError::Internal("secret detail".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
