//! HTTP client for a remote recognition service.

use crate::{RecognizeError, Recognizer};

/// Recognizer backed by an HTTP endpoint.
///
/// Posts the raw image bytes to the configured URL and expects a JSON
/// document back. Transport-level timeouts are left to the caller's
/// processing timeout; the client itself only bounds the connect phase.
pub struct HttpRecognizer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRecognizer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl Recognizer for HttpRecognizer {
    async fn process(&self, image: &[u8]) -> Result<serde_json::Value, RecognizeError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| RecognizeError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Recognition service returned an error");
            return Err(RecognizeError::Service {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| RecognizeError::InvalidResponse(e.to_string()))
    }
}
