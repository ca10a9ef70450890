//! Google Sheets API v4 client.
//!
//! The pipeline only needs spreadsheet metadata (to pick the chart data tab)
//! and a raw range write, so that is all this client exposes.

use serde::Deserialize;
use tracing::debug;

use crate::auth::SharedTokenProvider;
use crate::error::CommonError;
use crate::percent_encode;

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Clone, Deserialize)]
pub struct SpreadsheetMeta {
    #[serde(default)]
    pub sheets: Vec<Sheet>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sheet {
    pub properties: SheetProperties,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetProperties {
    pub title: String,
}

/// Pick the tab holding the chart's source data: the first sheet whose title
/// starts with `marker_prefix`, falling back to the first sheet.
pub fn chart_tab<'a>(meta: &'a SpreadsheetMeta, marker_prefix: &str) -> Option<&'a str> {
    meta.sheets
        .iter()
        .map(|s| s.properties.title.as_str())
        .find(|title| title.starts_with(marker_prefix))
        .or_else(|| meta.sheets.first().map(|s| s.properties.title.as_str()))
}

pub struct SheetsClient {
    base_url: String,
    http: reqwest::Client,
    token: SharedTokenProvider,
}

impl SheetsClient {
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

    /// Fetch spreadsheet metadata (sheet titles).
    pub async fn get_spreadsheet(&self, spreadsheet_id: &str) -> Result<SpreadsheetMeta, CommonError> {
        let url = format!("{}/{}", self.base_url, spreadsheet_id);
        debug!(url = %url, "fetching spreadsheet metadata");

        let resp = self
            .http
            .get(&url)
            .bearer_auth(self.token.bearer_token().await?)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(CommonError::from_response("sheets", resp).await);
        }

        Ok(resp.json().await?)
    }

    /// Write values to an A1-style range. `RAW` input: numbers stay numbers,
    /// nothing is re-parsed by the service.
    pub async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<serde_json::Value>],
    ) -> Result<(), CommonError> {
        let url = format!(
            "{}/{}/values/{}?valueInputOption=RAW",
            self.base_url,
            spreadsheet_id,
            percent_encode(range)
        );
        debug!(url = %url, rows = values.len(), "updating sheet values");

        let body = serde_json::json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": values,
        });

        let resp = self
            .http
            .put(&url)
            .bearer_auth(self.token.bearer_token().await?)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(CommonError::from_response("sheets", resp).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::StaticTokenProvider;

    fn meta(titles: &[&str]) -> SpreadsheetMeta {
        SpreadsheetMeta {
            sheets: titles
                .iter()
                .map(|t| Sheet {
                    properties: SheetProperties {
                        title: t.to_string(),
                    },
                })
                .collect(),
        }
    }

    #[test]
    fn chart_tab_prefers_marker_prefix() {
        let meta = meta(&["Summary", "[Chart] Market", "Raw data"]);
        assert_eq!(chart_tab(&meta, "[Chart"), Some("[Chart] Market"));
    }

    #[test]
    fn chart_tab_falls_back_to_first_sheet() {
        let meta = meta(&["Summary", "Raw data"]);
        assert_eq!(chart_tab(&meta, "[Chart"), Some("Summary"));
    }

    #[test]
    fn chart_tab_empty_spreadsheet_is_none() {
        assert_eq!(chart_tab(&meta(&[]), "[Chart"), None);
    }

    #[test]
    fn metadata_deserializes_from_api_shape() {
        let json = r#"{
            "spreadsheetId": "sheet-abc",
            "sheets": [
                { "properties": { "sheetId": 0, "title": "[Chart] Market", "index": 0 } },
                { "properties": { "sheetId": 1, "title": "Notes", "index": 1 } }
            ]
        }"#;
        let meta: SpreadsheetMeta = serde_json::from_str(json).unwrap();
        assert_eq!(meta.sheets.len(), 2);
        assert_eq!(meta.sheets[0].properties.title, "[Chart] Market");
    }

    #[test]
    fn default_base_url() {
        let client = SheetsClient::new(Arc::new(StaticTokenProvider::new("tok".into())));
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn range_is_percent_encoded_in_url() {
        let encoded = percent_encode("'[Chart] Market'!A1:B4");
        assert!(encoded.contains("%21A1%3AB4"));
        assert!(!encoded.contains('!'));
    }
}
