pub mod config;
pub mod db;
pub mod error;
pub mod execute;
pub mod gate;
pub mod generate;
pub mod prompt;
pub mod search;

pub use config::TipsearchConfig;
pub use error::TipsearchError;
pub use execute::{PgQueryExecutor, QueryExecutor};
pub use generate::{ClaudeClient, GenerationError, SqlGenerator};
pub use prompt::{build_prompt, Prompt};
pub use search::{run_search, SearchOutcome};
