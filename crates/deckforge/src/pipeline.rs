//! The deck pipeline: generate text, generate market numbers, copy the
//! template, substitute placeholders, rewrite the linked chart data, export.
//!
//! Strictly sequential; the first error aborts the run. The only degraded
//! path is a template without a linked chart, which skips the chart step.

use std::collections::BTreeMap;
use std::time::Duration;

use deckforge_common::drive::{DriveClient, POWERPOINT_MIME};
use deckforge_common::gemini::GeminiClient;
use deckforge_common::sheets::{chart_tab, SheetsClient};
use deckforge_common::slides::{linked_charts, SlideRequest, SlidesClient, TextMatch};
use tracing::{info, warn};

use crate::content;
use crate::error::AppError;
use crate::market::{self, MarketData};
use crate::model::{DeckArtifact, PitchRequest};
use crate::placeholders::placeholder_map;

/// Tab title prefix marking the chart's data sheet in the linked spreadsheet.
const CHART_TAB_PREFIX: &str = "[Chart";

/// Wait after the refresh batch so the asynchronous chart re-render settles
/// before the export snapshots the document.
const REFRESH_SETTLE: Duration = Duration::from_secs(2);

/// The A1 range covering the fixed header + TAM/SAM/SOM block.
fn chart_range(tab: &str) -> String {
    format!("'{tab}'!A1:B4")
}

/// One `replaceAllText` request per placeholder, case-sensitive, whole
/// document.
fn replace_requests(map: &BTreeMap<String, String>) -> Vec<SlideRequest> {
    map.iter()
        .map(|(token, value)| SlideRequest::ReplaceAllText {
            contains_text: TextMatch {
                text: token.clone(),
                match_case: true,
            },
            replace_text: value.clone(),
        })
        .collect()
}

pub struct DeckPipeline {
    gemini: GeminiClient,
    drive: DriveClient,
    slides: SlidesClient,
    sheets: SheetsClient,
    template_id: String,
    output_name: String,
    field_overrides: BTreeMap<String, String>,
}

impl DeckPipeline {
    pub fn new(
        gemini: GeminiClient,
        drive: DriveClient,
        slides: SlidesClient,
        sheets: SheetsClient,
        template_id: String,
        output_name: String,
        field_overrides: BTreeMap<String, String>,
    ) -> Self {
        Self {
            gemini,
            drive,
            slides,
            sheets,
            template_id,
            output_name,
            field_overrides,
        }
    }

    /// Run the full pipeline for one request.
    ///
    /// If any step after the template copy fails, the orphaned working copy
    /// is deleted best-effort before the error propagates.
    pub async fn run(&self, request: &PitchRequest) -> Result<DeckArtifact, AppError> {
        info!(idea = %request.idea, "generating deck content");
        let mut deck_content = content::generate_deck_content(&self.gemini, request).await?;
        deck_content.apply_overrides(&self.field_overrides);
        if !self.field_overrides.is_empty() {
            info!(overrides = self.field_overrides.len(), "field overrides applied");
        }
        let market_data = market::generate_market_data(&self.gemini, request).await?;
        info!(
            fields = deck_content.len(),
            tam = market_data.tam,
            sam = market_data.sam,
            som = market_data.som,
            "generation complete"
        );

        let presentation_id = self
            .drive
            .copy_file(&self.template_id, &self.output_name)
            .await?;
        info!(presentation_id = %presentation_id, "template copied");

        match self.fill(&presentation_id, &deck_content, &market_data).await {
            Ok(bytes) => Ok(DeckArtifact {
                presentation_id,
                bytes,
            }),
            Err(e) => {
                warn!(
                    presentation_id = %presentation_id,
                    error = %e,
                    "pipeline failed after copy, deleting working copy"
                );
                if let Err(delete_err) = self.drive.delete_file(&presentation_id).await {
                    warn!(error = %delete_err, "failed to delete orphaned working copy");
                }
                Err(e)
            }
        }
    }

    async fn fill(
        &self,
        presentation_id: &str,
        deck_content: &content::DeckContent,
        market_data: &MarketData,
    ) -> Result<Vec<u8>, AppError> {
        let map = placeholder_map(deck_content);
        let requests = replace_requests(&map);
        self.slides.batch_update(presentation_id, &requests).await?;
        info!(placeholders = requests.len(), "text placeholders replaced");

        self.update_chart(presentation_id, market_data).await?;

        let bytes = self
            .drive
            .export_file(presentation_id, POWERPOINT_MIME)
            .await?;
        info!(bytes = bytes.len(), "presentation exported");
        Ok(bytes)
    }

    /// Rewrite the linked chart's data tab and refresh every linked chart.
    /// A template without a linked chart is a non-fatal skip.
    async fn update_chart(
        &self,
        presentation_id: &str,
        market_data: &MarketData,
    ) -> Result<(), AppError> {
        let presentation = self.slides.get_presentation(presentation_id).await?;
        let charts = linked_charts(&presentation);

        let Some(first) = charts.first() else {
            warn!("no linked Sheets charts found in presentation, skipping chart update");
            return Ok(());
        };
        let spreadsheet_id = first.spreadsheet_id.clone();
        info!(spreadsheet_id = %spreadsheet_id, charts = charts.len(), "found linked sheet");

        let meta = self.sheets.get_spreadsheet(&spreadsheet_id).await?;
        let tab = chart_tab(&meta, CHART_TAB_PREFIX)
            .ok_or_else(|| AppError::Chart("linked spreadsheet has no sheets".to_string()))?;
        info!(tab = %tab, "using chart tab");

        self.sheets
            .update_values(&spreadsheet_id, &chart_range(tab), &market_data.chart_rows())
            .await?;

        let refreshes: Vec<SlideRequest> = charts
            .iter()
            .map(|c| SlideRequest::RefreshSheetsChart {
                object_id: c.object_id.clone(),
            })
            .collect();
        self.slides.batch_update(presentation_id, &refreshes).await?;
        info!(charts = refreshes.len(), "chart refresh requested");

        tokio::time::sleep(REFRESH_SETTLE).await;
        Ok(())
    }
}
