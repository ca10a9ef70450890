//! Google Slides API v1 client.
//!
//! Reads presentation structure to find charts linked to a Sheets document
//! and submits `batchUpdate` requests (text replacement, chart refresh).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::SharedTokenProvider;
use crate::error::CommonError;

const DEFAULT_BASE_URL: &str = "https://slides.googleapis.com/v1";

/// The subset of presentation structure the pipeline inspects.
#[derive(Debug, Clone, Deserialize)]
pub struct Presentation {
    #[serde(default)]
    pub slides: Vec<Page>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub page_elements: Vec<PageElement>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageElement {
    pub object_id: String,
    pub sheets_chart: Option<SheetsChart>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetsChart {
    pub spreadsheet_id: String,
}

/// A chart element together with the spreadsheet it renders from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedChart {
    pub object_id: String,
    pub spreadsheet_id: String,
}

/// Enumerate every Sheets-linked chart in the presentation, in slide order.
pub fn linked_charts(presentation: &Presentation) -> Vec<LinkedChart> {
    let mut charts = Vec::new();
    for slide in &presentation.slides {
        for element in &slide.page_elements {
            if let Some(chart) = &element.sheets_chart {
                charts.push(LinkedChart {
                    object_id: element.object_id.clone(),
                    spreadsheet_id: chart.spreadsheet_id.clone(),
                });
            }
        }
    }
    charts
}

/// A single `batchUpdate` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SlideRequest {
    ReplaceAllText {
        contains_text: TextMatch,
        replace_text: String,
    },
    RefreshSheetsChart {
        object_id: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMatch {
    pub text: String,
    pub match_case: bool,
}

pub struct SlidesClient {
    base_url: String,
    http: reqwest::Client,
    token: SharedTokenProvider,
}

impl SlidesClient {
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

    /// Fetch the structure of a presentation.
    pub async fn get_presentation(&self, presentation_id: &str) -> Result<Presentation, CommonError> {
        let url = format!("{}/presentations/{}", self.base_url, presentation_id);
        debug!(url = %url, "fetching presentation structure");

        let resp = self
            .http
            .get(&url)
            .bearer_auth(self.token.bearer_token().await?)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(CommonError::from_response("slides", resp).await);
        }

        Ok(resp.json().await?)
    }

    /// Submit a batch of mutation requests as one atomic call.
    pub async fn batch_update(
        &self,
        presentation_id: &str,
        requests: &[SlideRequest],
    ) -> Result<(), CommonError> {
        let url = format!(
            "{}/presentations/{}:batchUpdate",
            self.base_url, presentation_id
        );
        debug!(url = %url, requests = requests.len(), "submitting batchUpdate");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.token.bearer_token().await?)
            .json(&serde_json::json!({ "requests": requests }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(CommonError::from_response("slides", resp).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRESENTATION_WITH_CHART: &str = r#"{
        "presentationId": "pres1",
        "slides": [
            {
                "objectId": "slide1",
                "pageElements": [
                    { "objectId": "title1", "shape": {} },
                    {
                        "objectId": "chart1",
                        "sheetsChart": { "spreadsheetId": "sheet-abc", "chartId": 42 }
                    }
                ]
            },
            {
                "objectId": "slide2",
                "pageElements": [
                    {
                        "objectId": "chart2",
                        "sheetsChart": { "spreadsheetId": "sheet-abc", "chartId": 43 }
                    }
                ]
            }
        ]
    }"#;

    #[test]
    fn linked_charts_found_in_slide_order() {
        let presentation: Presentation = serde_json::from_str(PRESENTATION_WITH_CHART).unwrap();
        let charts = linked_charts(&presentation);
        assert_eq!(charts.len(), 2);
        assert_eq!(charts[0].object_id, "chart1");
        assert_eq!(charts[0].spreadsheet_id, "sheet-abc");
        assert_eq!(charts[1].object_id, "chart2");
    }

    #[test]
    fn presentation_without_charts_yields_empty_list() {
        let json = r#"{
            "slides": [
                { "pageElements": [ { "objectId": "shape1", "shape": {} } ] },
                { }
            ]
        }"#;
        let presentation: Presentation = serde_json::from_str(json).unwrap();
        assert!(linked_charts(&presentation).is_empty());
    }

    #[test]
    fn empty_presentation_parses() {
        let presentation: Presentation = serde_json::from_str("{}").unwrap();
        assert!(presentation.slides.is_empty());
    }

    #[test]
    fn replace_all_text_wire_shape() {
        let request = SlideRequest::ReplaceAllText {
            contains_text: TextMatch {
                text: "{{COMPANY_NAME}}".into(),
                match_case: true,
            },
            replace_text: "MediRide".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["replaceAllText"]["containsText"]["text"], "{{COMPANY_NAME}}");
        assert_eq!(json["replaceAllText"]["containsText"]["matchCase"], true);
        assert_eq!(json["replaceAllText"]["replaceText"], "MediRide");
    }

    #[test]
    fn refresh_chart_wire_shape() {
        let request = SlideRequest::RefreshSheetsChart {
            object_id: "chart1".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["refreshSheetsChart"]["objectId"], "chart1");
    }
}
