//! Placeholder tokens: schema field names wrapped in double braces, mapped to
//! their generated values.

use std::collections::BTreeMap;

use crate::content::{DeckContent, DECK_SCHEMA};

/// Wrap a schema field name in the template's token delimiter.
pub fn placeholder_token(field: &str) -> String {
    format!("{{{{{field}}}}}")
}

/// Build the substitution map. The key set is exactly the schema's field
/// names wrapped in `{{...}}`, regardless of what the generation reply held.
pub fn placeholder_map(content: &DeckContent) -> BTreeMap<String, String> {
    DECK_SCHEMA
        .iter()
        .map(|(name, _)| {
            (
                placeholder_token(name),
                content.get(name).unwrap_or_default().to_string(),
            )
        })
        .collect()
}
