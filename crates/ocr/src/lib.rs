//! The external recognition function.
//!
//! To the pipeline this is an opaque, possibly slow, possibly failing
//! black box: bytes in, a JSON document (`{"books": [...]}`) out. The
//! worker pool owns timeouts and retries; implementations here only
//! report what happened to a single invocation.

pub mod fixed;
pub mod http;

pub use fixed::FixedRecognizer;
pub use http::HttpRecognizer;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RecognizeError {
    /// The service could not be reached (connect/transport failure).
    #[error("Recognition service unavailable: {0}")]
    Unavailable(String),

    /// The service answered with a non-success status.
    #[error("Recognition service error (status {status}): {message}")]
    Service { status: u16, message: String },

    /// The service answered but the body was not the expected JSON.
    #[error("Invalid recognition response: {0}")]
    InvalidResponse(String),
}

// ---------------------------------------------------------------------------
// Recognizer
// ---------------------------------------------------------------------------

/// Turns a shelf image into a recognition document.
#[async_trait::async_trait]
pub trait Recognizer: Send + Sync {
    async fn process(&self, image: &[u8]) -> Result<serde_json::Value, RecognizeError>;
}
