//! Deck content generation: the fixed field schema, the prompts, and the
//! projection of the model's JSON reply onto that schema.

use std::collections::BTreeMap;

use deckforge_common::gemini::GeminiClient;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::model::PitchRequest;

/// Every text placeholder in the template, with the value hint embedded in
/// the generation prompt. Word-count limits are advisory; only the prompt
/// enforces them.
pub const DECK_SCHEMA: &[(&str, &str)] = &[
    ("COMPANY_NAME", "String"),
    ("TAGLINE", "String (max 8 words)"),
    ("SUBTITLE", "String (max 8 words)"),
    ("PROBLEM_1", "String (max 8 words)"),
    ("PROBLEM_2", "String (max 8 words)"),
    ("PROBLEM_3", "String (max 8 words)"),
    ("PROBLEM_4", "String (max 8 words)"),
    ("INSIGHT_1", "String (max 8 words)"),
    ("INSIGHT_2", "String (max 8 words)"),
    ("INSIGHT_3", "String (max 8 words)"),
    ("SOLUTION_1", "String (max 8 words)"),
    ("SOLUTION_2", "String (max 8 words)"),
    ("SOLUTION_3", "String (max 8 words)"),
    ("SOLUTION_4", "String (max 8 words)"),
    ("FLOW_1", "String (max 8 words)"),
    ("FLOW_2", "String (max 8 words)"),
    ("FLOW_3", "String (max 8 words)"),
    ("FLOW_4", "String (max 8 words)"),
    (
        "TAM_VALUE",
        "String with $ and B/M suffix (e.g. '$150B'). Must include B for billions or M for millions.",
    ),
    (
        "SAM_VALUE",
        "String with $ and B/M suffix (e.g. '$25B'). Must include B for billions or M for millions.",
    ),
    (
        "SOM_VALUE",
        "String with $ and M suffix (e.g. '$500M'). Must include M for millions.",
    ),
    ("WHY_NOW_1", "String (max 8 words)"),
    ("WHY_NOW_2", "String (max 8 words)"),
    ("WHY_NOW_3", "String (max 8 words)"),
    ("WHY_NOW_4", "String (max 8 words)"),
    ("BUSINESS_MODEL_1", "String (max 8 words)"),
    ("BUSINESS_MODEL_2", "String (max 8 words)"),
    ("BUSINESS_MODEL_3", "String (max 8 words)"),
    ("GTM_1", "String (max 8 words)"),
    ("GTM_2", "String (max 8 words)"),
    ("GTM_3", "String (max 8 words)"),
    ("GTM_4", "String (max 8 words)"),
    ("COMPETITION_1", "String (max 8 words)"),
    ("COMPETITION_2", "String (max 8 words)"),
    ("COMPETITION_3", "String (max 8 words)"),
    ("RISK_1", "String (max 8 words)"),
    ("RISK_2", "String (max 8 words)"),
    ("RISK_3", "String (max 8 words)"),
    ("VISION_STATEMENT", "String (max 12 words)"),
];

const SYSTEM_RULES: &str = "You are a specialized Pitch Deck Metadata Generator.
Your ONLY job is to generate structured JSON data for a startup pitch deck based on a provided idea.

RULES:
1. Output ONLY valid JSON. No markdown formatting, no code blocks, no introductory text, no explanations.
2. The output must be a single flat JSON object.
3. Keys must EXACTLY match the provided schema.
4. Do NOT include any keys not present in the schema.
5. All values must be strings.
6. Enforce concise, investor-style language:
   - Bullet points: MAX 8 words.
   - Vision statement: MAX 12 words.
   - Be punchy, direct, and professional. Avoid fluff.
7. If you violate the format or schema, you have FAILED.";

/// The schema rendered as a JSON object of field -> hint.
fn schema_json() -> String {
    let mut out = String::from("{\n");
    for (i, (name, hint)) in DECK_SCHEMA.iter().enumerate() {
        out.push_str(&format!("  \"{name}\": \"{hint}\""));
        if i + 1 < DECK_SCHEMA.len() {
            out.push(',');
        }
        out.push('\n');
    }
    out.push('}');
    out
}

pub fn system_prompt() -> String {
    format!("{SYSTEM_RULES}\n\nSCHEMA:\n{}", schema_json())
}

pub fn user_prompt(request: &PitchRequest) -> String {
    format!(
        "Generate pitch deck metadata for the following startup idea.\n\
         Fill the schema conservatively and realistically.\n\n\
         STARTUP IDEA:\n{}\n\n\
         TARGET CUSTOMER:\n{}\n\n\
         REGION:\n{}\n\n\
         ADDITIONAL CONSTRAINTS:\n{}",
        request.idea, request.customer, request.region, request.constraints
    )
}

/// Generated text for every schema field, keyed by field name.
#[derive(Debug, Clone)]
pub struct DeckContent {
    fields: BTreeMap<String, String>,
}

impl DeckContent {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Force operator-supplied values over the generated ones. Override names
    /// outside the schema are ignored; the key set never changes.
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, String>) {
        for (name, value) in overrides {
            if let Some(slot) = self.fields.get_mut(name) {
                *slot = value.clone();
            }
        }
    }
}

/// Strip Markdown code fences some models wrap JSON replies in.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parse a generation reply and project it onto [`DECK_SCHEMA`].
///
/// Every schema field appears in the result; fields the model omitted become
/// empty strings (logged), keys outside the schema are dropped.
pub fn parse_deck_content(raw: &str) -> Result<DeckContent, AppError> {
    let stripped = strip_code_fences(raw);
    let value: serde_json::Value = serde_json::from_str(stripped)
        .map_err(|e| AppError::Generation(format!("content reply is not valid JSON: {e}")))?;
    let object = value
        .as_object()
        .ok_or_else(|| AppError::Generation("content reply is not a JSON object".to_string()))?;

    let mut fields = BTreeMap::new();
    for (name, _) in DECK_SCHEMA {
        let text = match object.get(*name) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => {
                warn!(field = name, "content reply missing schema field");
                String::new()
            }
        };
        fields.insert(name.to_string(), text);
    }

    let extras = object.keys().filter(|k| !fields.contains_key(*k)).count();
    if extras > 0 {
        debug!(extras, "dropped keys outside the deck schema");
    }

    Ok(DeckContent { fields })
}

/// Generate the deck's text content. A failed call or a malformed reply is a
/// hard error; the pipeline never proceeds with an empty deck.
pub async fn generate_deck_content(
    gemini: &GeminiClient,
    request: &PitchRequest,
) -> Result<DeckContent, AppError> {
    let reply = gemini
        .generate(&system_prompt(), &user_prompt(request))
        .await?;
    parse_deck_content(&reply)
}
