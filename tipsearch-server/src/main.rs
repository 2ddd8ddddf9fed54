use std::sync::Arc;

use clap::Parser;
use tipsearch_core::{ClaudeClient, PgQueryExecutor, TipsearchConfig};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use tipsearch_server::http::{self, HttpState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "tipsearch.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Init logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Load config
    let config = match TipsearchConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Connect to the read-only search database
    let pool = match tipsearch_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match tipsearch_core::db::health_check(&pool).await {
            Ok(v) => println!("PostgreSQL connected: {}", v),
            Err(e) => {
                println!("PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // Generation client — API key comes from the environment only
    let api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_default();
    let generator = match ClaudeClient::new(api_key, config.model.clone()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create generation client: {}", e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(HttpState {
        pool: pool.clone(),
        generator: Arc::new(generator),
        executor: Arc::new(PgQueryExecutor::new(pool)),
    });

    // Shutdown signal
    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    http::start_http_server(state, &config.http.host, config.http.port, tx.subscribe()).await?;

    Ok(())
}
