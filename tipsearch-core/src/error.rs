use thiserror::Error;

/// Request-level error taxonomy for the AI search pipeline.
///
/// The first four variants map directly onto HTTP classes at the handler:
/// `Validation` and `UnsafeQuery` are 400-class, `GenerationUnavailable` and
/// `QueryExecution` are 500-class. `UnsafeQuery` is deliberately distinct
/// from `Validation` so operators can monitor generation-quality drift.
#[derive(Error, Debug)]
pub enum TipsearchError {
    #[error("{0}")]
    Validation(String),

    #[error("generated statement rejected: {0}")]
    UnsafeQuery(String),

    #[error("generation unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("query execution failed: {0}")]
    QueryExecution(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TipsearchError {
    /// True for caller-attributable failures (400-class).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TipsearchError::Validation(_) | TipsearchError::UnsafeQuery(_)
        )
    }
}
