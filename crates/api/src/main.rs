//! Chiron API server binary.
//!
//! Usage:
//!   chiron-api --config config.toml
//!   chiron-api --port 5001
//!   chiron-api --port 5001 --bind 0.0.0.0
//!
//! # Environment Variables
//!
//! - `QWEN_API_KEY` - LLM API key (`OPENAI_API_KEY` also accepted)
//! - `CHIRON_BIND_ADDR` - Server bind address (default: 127.0.0.1)
//! - `CHIRON_CORS_ORIGINS` - CORS allowed origins (comma-separated)

use chiron_api::{serve, AppState};
use chiron_pipeline::PipelineConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chiron_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command line arguments (simple for now)
    let args: Vec<String> = std::env::args().collect();
    let mut port: u16 = 5001;
    let mut config_path: Option<String> = None;
    let mut bind_addr: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    port = args[i + 1].parse().expect("Invalid port number");
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    bind_addr = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Chiron API Server");
                println!();
                println!("Usage: chiron-api [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -p, --port <PORT>     Port to listen on (default: 5001)");
                println!(
                    "  -b, --bind <ADDR>     Bind address (default: 127.0.0.1, env: CHIRON_BIND_ADDR)"
                );
                println!("  -c, --config <FILE>   Path to config.toml file");
                println!("  -h, --help            Show this help message");
                println!();
                println!("Environment variables:");
                println!("  QWEN_API_KEY          LLM API key (OPENAI_API_KEY also accepted)");
                println!("  CHIRON_BIND_ADDR      Server bind address (overridden by --bind flag)");
                println!("  CHIRON_CORS_ORIGINS   CORS allowed origins (comma-separated)");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    // Determine bind address (CLI flag > env var > default 127.0.0.1)
    let host = bind_addr
        .or_else(|| std::env::var("CHIRON_BIND_ADDR").ok())
        .unwrap_or_else(|| "127.0.0.1".to_string());

    if host == "0.0.0.0" {
        tracing::warn!(
            "Server binding to 0.0.0.0 — this exposes the API to all network interfaces. \
             Put a reverse proxy or firewall in front of it."
        );
    }

    // Read CORS origins from environment
    let cors_origins: Option<Vec<String>> = std::env::var("CHIRON_CORS_ORIGINS")
        .ok()
        .map(|s| s.split(',').map(|o| o.trim().to_string()).collect());

    // Load pipeline configuration
    let config = if let Some(path) = config_path {
        tracing::info!(path = %path, "Loading configuration");
        PipelineConfig::from_file(&path)?
    } else {
        tracing::info!("Using default configuration");
        PipelineConfig::default()
    };

    if config.llm.resolve_api_key().is_none() {
        tracing::warn!(
            "No LLM API key found — set QWEN_API_KEY or OPENAI_API_KEY. \
             The server will start, but analysis requests will fail."
        );
    }

    // Create application state
    let state = AppState::new(&config)?;

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    serve(Arc::new(state), addr, cors_origins).await?;

    Ok(())
}
