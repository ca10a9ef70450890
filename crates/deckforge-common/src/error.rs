//! Error types shared across the deckforge crates.
//!
//! These cover the outbound HTTP surfaces (text generation, Drive, Slides,
//! Sheets) and credential handling. Application-specific errors are defined
//! in the binary crate and wrap `CommonError` via `#[from]`.

use reqwest::StatusCode;
use tracing::warn;

/// Upstream error bodies are truncated to this many bytes before being
/// embedded in an error message.
const MAX_ERROR_BODY_BYTES: usize = 8 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{service} API error: status={status} body={body}")]
    Api {
        service: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("generation reply missing content")]
    EmptyCompletion,

    #[error("auth error: {0}")]
    Auth(String),
}

impl CommonError {
    /// Build an [`CommonError::Api`] from a non-success response, reading at
    /// most [`MAX_ERROR_BODY_BYTES`] of the body.
    pub(crate) async fn from_response(service: &'static str, resp: reqwest::Response) -> Self {
        let status = resp.status();
        let body = match resp.bytes().await {
            Ok(mut b) => {
                if b.len() > MAX_ERROR_BODY_BYTES {
                    b.truncate(MAX_ERROR_BODY_BYTES);
                }
                String::from_utf8_lossy(&b).to_string()
            }
            Err(e) => {
                warn!(service, error = %e, "failed to read upstream error body");
                "<failed to read error body>".to_string()
            }
        };
        CommonError::Api { service, status, body }
    }
}
