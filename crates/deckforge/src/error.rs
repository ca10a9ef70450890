use deckforge_common::error::CommonError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("config error: {0}")]
    Config(String),

    #[error("generation error: {0}")]
    Generation(String),

    #[error("chart update error: {0}")]
    Chart(String),
}
