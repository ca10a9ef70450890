//! Market sizing: the TAM/SAM/SOM prompt and the numeric triple that feeds
//! the linked chart.
//!
//! Unit convention: generated values are **billions of USD**. The chart block
//! converts to millions, which is what the template's chart format expects.

use deckforge_common::gemini::GeminiClient;
use serde::Deserialize;
use tracing::warn;

use crate::content::strip_code_fences;
use crate::error::AppError;
use crate::model::PitchRequest;

const MARKET_SYSTEM_PROMPT: &str = "You are a Market Sizing AI for startup pitch decks.
Output ONLY a valid JSON object with realistic market size estimates.
Values should be in BILLIONS of dollars (e.g., 50 means $50 billion).

Guidelines:
- TAM (Total Addressable Market): The entire global market opportunity. Usually $10B-$500B+
- SAM (Serviceable Addressable Market): The segment you can realistically target. Usually 10-30% of TAM.
- SOM (Serviceable Obtainable Market): What you can capture in 3-5 years. Usually 1-5% of SAM.

Return NUMBERS ONLY (no strings, no $, no 'B').

Example output for a B2B SaaS:
{\"TAM\": 150, \"SAM\": 25, \"SOM\": 0.5}";

fn market_user_prompt(request: &PitchRequest) -> String {
    format!(
        "Estimate realistic market sizes for this startup:\n\
         Idea: {}\n\
         Region: {}\n\
         Target: {}",
        request.idea, request.region, request.customer
    )
}

/// Market sizes in billions of USD.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct MarketData {
    #[serde(rename = "TAM")]
    pub tam: f64,
    #[serde(rename = "SAM")]
    pub sam: f64,
    #[serde(rename = "SOM")]
    pub som: f64,
}

impl MarketData {
    pub fn is_positive(&self) -> bool {
        self.tam > 0.0 && self.sam > 0.0 && self.som > 0.0
    }

    /// Nesting sanity check: SOM <= SAM <= TAM.
    pub fn is_ordered(&self) -> bool {
        self.som <= self.sam && self.sam <= self.tam
    }

    /// The fixed 4-row block written to the chart's data tab: a header plus
    /// one row per metric, values converted from billions to millions.
    pub fn chart_rows(&self) -> Vec<Vec<serde_json::Value>> {
        let row = |metric: &str, billions: f64| {
            vec![
                serde_json::Value::from(metric),
                serde_json::Value::from(billions * 1000.0),
            ]
        };
        vec![
            vec![
                serde_json::Value::from("Metric"),
                serde_json::Value::from("Value"),
            ],
            row("TAM", self.tam),
            row("SAM", self.sam),
            row("SOM", self.som),
        ]
    }
}

/// Parse a market-sizing reply. Malformed replies are hard errors; a triple
/// that fails the sanity checks is kept but logged.
pub fn parse_market_data(raw: &str) -> Result<MarketData, AppError> {
    let stripped = strip_code_fences(raw);
    let market: MarketData = serde_json::from_str(stripped)
        .map_err(|e| AppError::Generation(format!("market reply is not a valid triple: {e}")))?;

    if !market.is_positive() {
        warn!(tam = market.tam, sam = market.sam, som = market.som, "non-positive market size");
    } else if !market.is_ordered() {
        warn!(
            tam = market.tam,
            sam = market.sam,
            som = market.som,
            "market sizes are not nested (SOM <= SAM <= TAM)"
        );
    }
    Ok(market)
}

/// Generate the market-size triple. Fails loudly on call or parse failure,
/// matching the content generator; there is no fabricated fallback.
pub async fn generate_market_data(
    gemini: &GeminiClient,
    request: &PitchRequest,
) -> Result<MarketData, AppError> {
    let reply = gemini
        .generate(MARKET_SYSTEM_PROMPT, &market_user_prompt(request))
        .await?;
    parse_market_data(&reply)
}
