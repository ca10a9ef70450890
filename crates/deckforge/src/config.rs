use std::collections::BTreeMap;
use std::time::Duration;

use deckforge_common::gemini::{self, GeminiConfig};

use crate::content::DECK_SCHEMA;
use crate::error::AppError;

/// Application configuration, loaded explicitly once at startup and passed
/// into each component at construction time.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the text-generation service.
    pub gemini_api_key: String,
    /// Model id, e.g. "gemini-2.5-flash-lite".
    pub gemini_model: String,
    /// Override for the generation endpoint (tests, proxies).
    pub gemini_base_url: Option<String>,
    pub gemini_timeout: Duration,
    /// Identifier of the template presentation to copy.
    pub template_presentation_id: String,
    /// Name given to the working copy in Drive.
    pub output_presentation_name: String,
    /// Path the CLI writes the exported .pptx to.
    pub output_file: String,
    /// Static bearer token; bypasses the OAuth token file when set.
    pub google_access_token: Option<String>,
    pub oauth_client_id: Option<String>,
    pub oauth_client_secret: Option<String>,
    /// Path of the persisted token JSON.
    pub token_file: String,
    /// Listen address for `deckforge serve`.
    pub bind_addr: String,
    /// Fixed values forced over the generated content, keyed by schema field
    /// name.
    pub field_overrides: BTreeMap<String, String>,
}

impl Config {
    /// Required:
    /// - `GEMINI_API_KEY`
    /// - `TEMPLATE_PRESENTATION_ID`
    /// - one of `GOOGLE_ACCESS_TOKEN` or `GOOGLE_OAUTH_CLIENT_ID`
    ///
    /// Optional:
    /// - `GEMINI_MODEL`, `GEMINI_BASE_URL`, `GEMINI_TIMEOUT_SECS`
    /// - `OUTPUT_PRESENTATION_NAME`, `OUTPUT_FILE_NAME`
    /// - `GOOGLE_OAUTH_CLIENT_SECRET`, `GOOGLE_TOKEN_FILE`, `BIND_ADDR`
    /// - `DECK_FIELD_<NAME>` — one per schema field (e.g.
    ///   `DECK_FIELD_COMPANY_NAME`); forces that field's value instead of the
    ///   generated one
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| {
                AppError::Config(format!("{key} environment variable is required"))
            })
        };

        let google_access_token = lookup("GOOGLE_ACCESS_TOKEN");
        let oauth_client_id = lookup("GOOGLE_OAUTH_CLIENT_ID");
        if google_access_token.is_none() && oauth_client_id.is_none() {
            return Err(AppError::Config(
                "either GOOGLE_ACCESS_TOKEN or GOOGLE_OAUTH_CLIENT_ID is required".to_string(),
            ));
        }

        let field_overrides = DECK_SCHEMA
            .iter()
            .filter_map(|(name, _)| {
                lookup(&format!("DECK_FIELD_{name}")).map(|value| (name.to_string(), value))
            })
            .collect();

        let gemini_timeout = lookup("GEMINI_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(30));

        Ok(Self {
            gemini_api_key: required("GEMINI_API_KEY")?,
            gemini_model: lookup("GEMINI_MODEL")
                .unwrap_or_else(|| gemini::DEFAULT_MODEL.to_string()),
            gemini_base_url: lookup("GEMINI_BASE_URL"),
            gemini_timeout,
            template_presentation_id: required("TEMPLATE_PRESENTATION_ID")?,
            output_presentation_name: lookup("OUTPUT_PRESENTATION_NAME")
                .unwrap_or_else(|| "Generated Pitch Deck".to_string()),
            output_file: lookup("OUTPUT_FILE_NAME")
                .unwrap_or_else(|| "output_pitch_deck.pptx".to_string()),
            google_access_token,
            oauth_client_id,
            oauth_client_secret: lookup("GOOGLE_OAUTH_CLIENT_SECRET"),
            token_file: lookup("GOOGLE_TOKEN_FILE").unwrap_or_else(|| "token.json".to_string()),
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string()),
            field_overrides,
        })
    }

    pub fn gemini_config(&self) -> GeminiConfig {
        let mut config = GeminiConfig::new(self.gemini_api_key.clone());
        config.model = self.gemini_model.clone();
        config.timeout = self.gemini_timeout;
        if let Some(base_url) = &self.gemini_base_url {
            config.base_url = base_url.clone();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from<'a>(map: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| map.get(key).map(|v| v.to_string())
    }

    fn minimal_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("GEMINI_API_KEY", "AIza-test"),
            ("TEMPLATE_PRESENTATION_ID", "template123"),
            ("GOOGLE_ACCESS_TOKEN", "ya29.tok"),
        ])
    }

    #[test]
    fn minimal_config_loads_with_defaults() {
        let env = minimal_env();
        let config = Config::from_lookup(lookup_from(&env)).unwrap();
        assert_eq!(config.template_presentation_id, "template123");
        assert_eq!(config.gemini_model, gemini::DEFAULT_MODEL);
        assert_eq!(config.output_presentation_name, "Generated Pitch Deck");
        assert_eq!(config.output_file, "output_pitch_deck.pptx");
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.gemini_timeout, Duration::from_secs(30));
        assert!(config.field_overrides.is_empty());
    }

    #[test]
    fn field_overrides_collect_schema_named_vars() {
        let mut env = minimal_env();
        env.insert("DECK_FIELD_COMPANY_NAME", "Acme Health");
        env.insert("DECK_FIELD_TAGLINE", "Care on wheels");
        env.insert("DECK_FIELD_NOT_A_FIELD", "dropped");
        let config = Config::from_lookup(lookup_from(&env)).unwrap();
        assert_eq!(config.field_overrides.len(), 2);
        assert_eq!(
            config.field_overrides.get("COMPANY_NAME").map(String::as_str),
            Some("Acme Health")
        );
        assert_eq!(
            config.field_overrides.get("TAGLINE").map(String::as_str),
            Some("Care on wheels")
        );
        assert!(!config.field_overrides.contains_key("NOT_A_FIELD"));
    }

    #[test]
    fn missing_template_id_fails() {
        let mut env = minimal_env();
        env.remove("TEMPLATE_PRESENTATION_ID");
        let err = Config::from_lookup(lookup_from(&env)).unwrap_err();
        assert!(err.to_string().contains("TEMPLATE_PRESENTATION_ID"));
    }

    #[test]
    fn missing_gemini_key_fails() {
        let mut env = minimal_env();
        env.remove("GEMINI_API_KEY");
        assert!(Config::from_lookup(lookup_from(&env)).is_err());
    }

    #[test]
    fn needs_some_google_credential() {
        let mut env = minimal_env();
        env.remove("GOOGLE_ACCESS_TOKEN");
        let err = Config::from_lookup(lookup_from(&env)).unwrap_err();
        assert!(err.to_string().contains("GOOGLE_OAUTH_CLIENT_ID"));

        env.insert("GOOGLE_OAUTH_CLIENT_ID", "client-id");
        assert!(Config::from_lookup(lookup_from(&env)).is_ok());
    }

    #[test]
    fn overrides_apply() {
        let mut env = minimal_env();
        env.insert("GEMINI_MODEL", "gemini-2.0-flash-lite");
        env.insert("GEMINI_TIMEOUT_SECS", "5");
        env.insert("OUTPUT_FILE_NAME", "deck.pptx");
        let config = Config::from_lookup(lookup_from(&env)).unwrap();
        assert_eq!(config.gemini_model, "gemini-2.0-flash-lite");
        assert_eq!(config.gemini_timeout, Duration::from_secs(5));
        assert_eq!(config.output_file, "deck.pptx");

        let gemini = config.gemini_config();
        assert_eq!(gemini.model, "gemini-2.0-flash-lite");
        assert_eq!(gemini.timeout, Duration::from_secs(5));
    }
}
