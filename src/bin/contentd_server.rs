//!
//! contentd server binary
//! ----------------------
//! Command-line entry point for starting the contentd HTTP server.
//! Supports configuration via CLI flags and environment variables.

use anyhow::Result;
use std::env;

use contentd::config::{wants_help, ServerConfig, USAGE};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber with env filter, defaulting to info
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))?;
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let args: Vec<String> = env::args().skip(1).collect();
    if wants_help(&args) {
        println!("{}", USAGE);
        return Ok(());
    }

    // CLI arguments override environment
    let cfg = ServerConfig::from_env().apply_args(&args)?;
    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    println!("contentd starting: http={}:{}, root={}", cfg.bind_addr, cfg.http_port, cfg.root.display());
    tracing::info!(
        target: "startup",
        "contentd starting: RUST_LOG='{}', bind={}, http_port={}, root='{}'",
        rust_log, cfg.bind_addr, cfg.http_port, cfg.root.display()
    );

    contentd::server::run_with_config(cfg).await
}
