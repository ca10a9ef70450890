//! HTTP wrapper around the pipeline: one generation endpoint returning the
//! exported file, plus a health check.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use deckforge_common::error::CommonError;
use tracing::{error, info};

use crate::error::AppError;
use crate::model::PitchRequest;
use crate::pipeline::DeckPipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DeckPipeline>,
    /// Filename advertised in the Content-Disposition header.
    pub file_name: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/generate", post(generate))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn serve(state: AppState, bind_addr: &str) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "HTTP server listening");
    axum::serve(listener, router(state)).await
}

async fn health() -> Json<serde_json::Value> {
    Json(health_payload())
}

fn health_payload() -> serde_json::Value {
    serde_json::json!({ "status": "healthy" })
}

/// A failed call to one of the external services is a bad gateway; anything
/// local (config, parsing, chart bookkeeping) is an internal error.
fn error_status(err: &AppError) -> StatusCode {
    match err {
        AppError::Common(CommonError::Api { .. } | CommonError::Http(_)) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn generate(
    State(state): State<AppState>,
    Json(request): Json<PitchRequest>,
) -> Result<Response, (StatusCode, String)> {
    let artifact = state.pipeline.run(&request).await.map_err(|e| {
        error!(error = %e, "deck generation failed");
        (error_status(&e), e.to_string())
    })?;

    info!(
        presentation_id = %artifact.presentation_id,
        bytes = artifact.bytes.len(),
        "deck generated"
    );

    Ok((
        [
            (
                header::CONTENT_TYPE,
                deckforge_common::drive::POWERPOINT_MIME.to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", state.file_name),
            ),
        ],
        artifact.bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_reports_healthy() {
        assert_eq!(health_payload()["status"], "healthy");
    }

    #[test]
    fn generate_request_body_accepts_idea_only() {
        let request: PitchRequest = serde_json::from_str(r#"{"idea": "Uber for Doctors"}"#).unwrap();
        assert_eq!(request.customer, "General");
    }

    #[test]
    fn upstream_api_failure_is_bad_gateway() {
        let err = AppError::Common(CommonError::Api {
            service: "slides",
            status: StatusCode::FORBIDDEN,
            body: "quota exceeded".into(),
        });
        assert_eq!(error_status(&err), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn local_failures_are_internal_errors() {
        assert_eq!(
            error_status(&AppError::Generation("reply is not valid JSON".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            error_status(&AppError::Chart("linked spreadsheet has no sheets".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            error_status(&AppError::Common(CommonError::EmptyCompletion)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
