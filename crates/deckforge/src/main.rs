mod config;
mod content;
mod error;
mod market;
mod model;
mod pipeline;
mod placeholders;
mod server;

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::EnvFilter;

use deckforge_common::auth::{
    save_token, OAuthClient, OAuthConfig, RefreshingTokenProvider, SharedTokenProvider,
    StaticTokenProvider,
};
use deckforge_common::drive::DriveClient;
use deckforge_common::gemini::GeminiClient;
use deckforge_common::sheets::SheetsClient;
use deckforge_common::slides::SlidesClient;

use config::Config;
use model::PitchRequest;
use pipeline::DeckPipeline;
use server::AppState;

const USAGE: &str = "usage:
  deckforge generate <idea> [customer] [region] [constraints]
  deckforge serve
  deckforge auth-url
  deckforge auth <code>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("generate") => {
            let idea = args.get(1).cloned();
            let Some(idea) = idea else {
                bail!("generate needs an idea argument\n{USAGE}");
            };
            let mut request = PitchRequest::new(idea);
            if let Some(customer) = args.get(2) {
                request.customer = customer.clone();
            }
            if let Some(region) = args.get(3) {
                request.region = region.clone();
            }
            if let Some(constraints) = args.get(4) {
                request.constraints = constraints.clone();
            }
            run_generate(&request).await
        }
        Some("serve") => run_serve().await,
        Some("auth-url") => print_auth_url(),
        Some("auth") => {
            let Some(code) = args.get(1).cloned() else {
                bail!("auth needs the authorization code\n{USAGE}");
            };
            exchange_auth_code(&code).await
        }
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }
}

async fn run_generate(request: &PitchRequest) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let pipeline = build_pipeline(&config)?;

    let artifact = pipeline.run(request).await?;
    std::fs::write(&config.output_file, &artifact.bytes)
        .with_context(|| format!("failed to write {}", config.output_file))?;

    info!(
        file = %config.output_file,
        url = %artifact.slides_url(),
        "pitch deck ready"
    );
    println!("File: {}", config.output_file);
    println!("Google Slides: {}", artifact.slides_url());
    Ok(())
}

async fn run_serve() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    info!(
        template = %config.template_presentation_id,
        model = %config.gemini_model,
        "configuration loaded"
    );
    let state = AppState {
        pipeline: Arc::new(build_pipeline(&config)?),
        file_name: config.output_file.clone(),
    };
    server::serve(state, &config.bind_addr).await?;
    Ok(())
}

fn build_pipeline(config: &Config) -> anyhow::Result<DeckPipeline> {
    let token = token_provider(config)?;
    Ok(DeckPipeline::new(
        GeminiClient::new(config.gemini_config())?,
        DriveClient::new(Arc::clone(&token)),
        SlidesClient::new(Arc::clone(&token)),
        SheetsClient::new(token),
        config.template_presentation_id.clone(),
        config.output_presentation_name.clone(),
        config.field_overrides.clone(),
    ))
}

fn token_provider(config: &Config) -> anyhow::Result<SharedTokenProvider> {
    if let Some(token) = &config.google_access_token {
        return Ok(Arc::new(StaticTokenProvider::new(token.clone())));
    }
    let oauth = OAuthClient::new(oauth_config(config)?);
    Ok(Arc::new(RefreshingTokenProvider::new(
        oauth,
        config.token_file.clone(),
    )))
}

fn oauth_config(config: &Config) -> anyhow::Result<OAuthConfig> {
    let client_id = config
        .oauth_client_id
        .clone()
        .context("GOOGLE_OAUTH_CLIENT_ID is required for the OAuth flow")?;
    Ok(OAuthConfig::google(
        client_id,
        config.oauth_client_secret.clone(),
    ))
}

/// Path where the PKCE verifier waits between `auth-url` and `auth <code>`.
fn pending_verifier_path(config: &Config) -> String {
    format!("{}.pending", config.token_file)
}

fn print_auth_url() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let oauth = OAuthClient::new(oauth_config(&config)?);

    let pending = pending_verifier_path(&config);
    std::fs::write(&pending, oauth.code_verifier())
        .with_context(|| format!("failed to write {pending}"))?;

    let (url, _state) = oauth.authorization_url();
    println!("Visit this URL to authorize deckforge:\n\n{url}\n");
    println!("Then run: deckforge auth <code>");
    Ok(())
}

async fn exchange_auth_code(code: &str) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let pending = pending_verifier_path(&config);
    let verifier = std::fs::read_to_string(&pending)
        .with_context(|| format!("no pending auth flow ({pending} missing); run auth-url first"))?;

    let oauth = OAuthClient::with_verifier(oauth_config(&config)?, verifier.trim().to_string());
    let token = oauth.exchange_code(code).await?;
    save_token(std::path::Path::new(&config.token_file), &token)?;
    std::fs::remove_file(&pending).ok();

    info!(file = %config.token_file, "token saved");
    println!("Token saved to {}", config.token_file);
    Ok(())
}
