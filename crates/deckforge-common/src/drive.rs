//! Google Drive API v3 client.
//!
//! Covers the three Drive operations the pipeline needs: copying the template
//! presentation, exporting the finished copy, and deleting an orphaned copy
//! after a failed run. Bearer tokens come from an injected [`TokenProvider`].

use serde::Deserialize;
use tracing::debug;

use crate::auth::SharedTokenProvider;
use crate::error::CommonError;
use crate::percent_encode;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

/// MIME type Drive uses when exporting a Slides document as PowerPoint.
pub const POWERPOINT_MIME: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

#[derive(Debug, Deserialize)]
struct CopiedFile {
    id: String,
}

pub struct DriveClient {
    base_url: String,
    http: reqwest::Client,
    token: SharedTokenProvider,
}

impl DriveClient {
    pub fn new(token: SharedTokenProvider) -> Self {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    /// Point the client at a custom base URL (useful for testing).
    pub fn with_base_url(token: SharedTokenProvider, base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Copy a file and return the new file's id.
    pub async fn copy_file(&self, file_id: &str, name: &str) -> Result<String, CommonError> {
        let url = format!(
            "{}/files/{}/copy?supportsAllDrives=true",
            self.base_url, file_id
        );
        debug!(url = %url, name = %name, "copying Drive file");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.token.bearer_token().await?)
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(CommonError::from_response("drive", resp).await);
        }

        let copied: CopiedFile = resp.json().await?;
        Ok(copied.id)
    }

    /// Export a file in the given MIME type and return the raw bytes.
    pub async fn export_file(&self, file_id: &str, mime_type: &str) -> Result<Vec<u8>, CommonError> {
        let url = format!(
            "{}/files/{}/export?mimeType={}",
            self.base_url,
            file_id,
            percent_encode(mime_type)
        );
        debug!(url = %url, "exporting Drive file");

        let resp = self
            .http
            .get(&url)
            .bearer_auth(self.token.bearer_token().await?)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(CommonError::from_response("drive", resp).await);
        }

        Ok(resp.bytes().await?.to_vec())
    }

    /// Delete a file by id.
    pub async fn delete_file(&self, file_id: &str) -> Result<(), CommonError> {
        let url = format!("{}/files/{}", self.base_url, file_id);
        debug!(url = %url, "deleting Drive file");

        let resp = self
            .http
            .delete(&url)
            .bearer_auth(self.token.bearer_token().await?)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(CommonError::from_response("drive", resp).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::StaticTokenProvider;

    fn client() -> DriveClient {
        DriveClient::new(Arc::new(StaticTokenProvider::new("tok".into())))
    }

    #[test]
    fn default_base_url() {
        assert_eq!(client().base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn custom_base_url_strips_slash() {
        let c = DriveClient::with_base_url(
            Arc::new(StaticTokenProvider::new("tok".into())),
            "https://drive.test/v3/",
        );
        assert_eq!(c.base_url(), "https://drive.test/v3");
    }

    #[test]
    fn copied_file_deserializes() {
        let copied: CopiedFile =
            serde_json::from_str(r#"{"kind": "drive#file", "id": "new123", "name": "Deck"}"#)
                .unwrap();
        assert_eq!(copied.id, "new123");
    }

    #[test]
    fn export_mime_is_percent_encoded() {
        let encoded = percent_encode(POWERPOINT_MIME);
        assert!(!encoded.contains('/'));
        assert!(encoded.contains("%2F"));
    }
}
