//! spa-gateway
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────────┐
//!                        │                     SPA GATEWAY                      │
//!                        │                                                      │
//!   Browser request      │  ┌──────────┐    ┌──────────┐    ┌──────────────┐    │
//!   /app/x?acc=2  ───────┼─▶│  http    │───▶│ session  │───▶│   upstream   │    │
//!                        │  │ request  │    │namespace │    │headers/auth  │    │
//!                        │  └──────────┘    └──────────┘    └──────┬───────┘    │
//!                        │                                         │            │
//!                        │                           GET ──────────┤ POST/PUT   │
//!                        │                                         ▼            │
//!                        │                                 ┌──────────────┐     │
//!                        │                                 │redirect walk │◀────┼──── Upstream
//!                        │                                 └──────┬───────┘     │     SPA
//!   Browser response     │  ┌──────────┐    ┌──────────┐          │            │
//!   ◀────────────────────┼──│ rewrite  │◀───│ response │◀─────────┘            │
//!                        │  │  (HTML)  │    │normalize │                       │
//!                        │  └──────────┘    └──────────┘                       │
//!                        │                                                      │
//!                        │  config (TOML, hot reload) · observability · lifecycle│
//!                        └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use spa_gateway::lifecycle::startup::{self, StartupOptions};

/// Multiplexed reverse proxy for an embedded single-page application.
#[derive(Parser, Debug)]
#[command(name = "spa-gateway", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the configuration file when it changes.
    #[arg(short, long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    startup::run(StartupOptions {
        config_path: cli.config,
        watch: cli.watch,
    })
    .await?;

    Ok(())
}
