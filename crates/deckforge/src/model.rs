use serde::Deserialize;

/// One pitch-deck generation request. The optional context fields default to
/// the same values the prompt treats as "unspecified".
#[derive(Debug, Clone, Deserialize)]
pub struct PitchRequest {
    pub idea: String,
    #[serde(default = "default_customer")]
    pub customer: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_constraints")]
    pub constraints: String,
}

impl PitchRequest {
    pub fn new(idea: impl Into<String>) -> Self {
        Self {
            idea: idea.into(),
            customer: default_customer(),
            region: default_region(),
            constraints: default_constraints(),
        }
    }
}

fn default_customer() -> String {
    "General".to_string()
}

fn default_region() -> String {
    "Global".to_string()
}

fn default_constraints() -> String {
    "None".to_string()
}

/// The finished deck: exported bytes plus the working copy's identifier,
/// so callers can link to the editable document.
#[derive(Debug, Clone)]
pub struct DeckArtifact {
    pub presentation_id: String,
    pub bytes: Vec<u8>,
}

impl DeckArtifact {
    pub fn slides_url(&self) -> String {
        format!(
            "https://docs.google.com/presentation/d/{}",
            self.presentation_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_fields_default_when_omitted() {
        let req: PitchRequest = serde_json::from_str(r#"{"idea": "Uber for Doctors"}"#).unwrap();
        assert_eq!(req.idea, "Uber for Doctors");
        assert_eq!(req.customer, "General");
        assert_eq!(req.region, "Global");
        assert_eq!(req.constraints, "None");
    }

    #[test]
    fn request_fields_override_defaults() {
        let req: PitchRequest = serde_json::from_str(
            r#"{"idea": "Uber for Doctors", "customer": "Remote Doctors", "region": "North America"}"#,
        )
        .unwrap();
        assert_eq!(req.customer, "Remote Doctors");
        assert_eq!(req.region, "North America");
        assert_eq!(req.constraints, "None");
    }

    #[test]
    fn request_without_idea_fails() {
        assert!(serde_json::from_str::<PitchRequest>(r#"{"customer": "x"}"#).is_err());
    }

    #[test]
    fn slides_url_embeds_presentation_id() {
        let artifact = DeckArtifact {
            presentation_id: "pres-123".into(),
            bytes: vec![],
        };
        assert_eq!(
            artifact.slides_url(),
            "https://docs.google.com/presentation/d/pres-123"
        );
    }
}
