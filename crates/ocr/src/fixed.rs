//! Canned recognizer for development and tests.

use crate::{RecognizeError, Recognizer};

/// Recognizer that returns the same document for every image.
///
/// Used as the default backend when no recognition endpoint is configured,
/// and by the test suites to script success paths.
pub struct FixedRecognizer {
    document: serde_json::Value,
}

impl FixedRecognizer {
    pub fn new(document: serde_json::Value) -> Self {
        Self { document }
    }

    /// An empty shelf: `{"books": []}`.
    pub fn empty_shelf() -> Self {
        Self::new(serde_json::json!({"books": []}))
    }
}

#[async_trait::async_trait]
impl Recognizer for FixedRecognizer {
    async fn process(&self, _image: &[u8]) -> Result<serde_json::Value, RecognizeError> {
        Ok(self.document.clone())
    }
}
