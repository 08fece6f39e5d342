use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use shelfscan_core::CoreError;
use shelfscan_ledger::LedgerError;
use shelfscan_pipeline::DispatchError;
use shelfscan_queue::QueueError;
use shelfscan_store::StoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps the pipeline's component errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `shelfscan_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A job ledger error.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// An object store error.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// A work queue error.
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Invalid(e) => AppError::Core(e),
            DispatchError::Storage(e) => AppError::Store(e),
            DispatchError::Ledger(e) => AppError::Ledger(e),
            DispatchError::Queue(e) => AppError::Queue(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::UnsupportedMediaType(msg) => (
                    StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    "UNSUPPORTED_MEDIA_TYPE",
                    msg.clone(),
                ),
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Ledger errors ---
            AppError::Ledger(err) => match err {
                LedgerError::NotFound(id) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("Job with id {id} not found"),
                ),
                LedgerError::Duplicate(id) => (
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    format!("Job with id {id} already exists"),
                ),
                other => {
                    tracing::error!(error = %other, "Ledger error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Store errors ---
            AppError::Store(err) => {
                tracing::error!(error = %err, "Object store error");
                if err.is_transient() {
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "STORAGE_UNAVAILABLE",
                        "Image storage is temporarily unavailable".to_string(),
                    )
                } else {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            }

            // --- Queue errors ---
            AppError::Queue(err) => {
                tracing::error!(error = %err, "Work queue error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
