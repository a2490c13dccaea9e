//! geoacl command-line entry point.
//!
//! # Purpose
//! Loads configuration, seeds the in-memory stores from YAML, evaluates one
//! query and prints the answer as JSON on stdout.
use anyhow::Context;
use clap::Parser;
use geoacl::app::AppState;
use geoacl::cli::{Cli, execute};
use geoacl::config::AclConfig;
use geoacl::observability;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init_observability("geoacl");
    let cli = Cli::parse();

    let mut config =
        AclConfig::from_env_or_yaml(cli.config.as_deref()).context("geoacl config")?;
    if let Some(path) = cli.rules {
        config.rules_file = Some(PathBuf::from(path));
    }
    tracing::debug!(?config, "configuration loaded");

    let state = AppState::build(&config).await?;
    let output = execute(cli.command, &state).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    state.shutdown();
    Ok(())
}
