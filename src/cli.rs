//! # CLI Execution Functions
//!
//! Execution logic for each subcommand, kept out of `main.rs` so the entry
//! point stays a plain dispatch table.

use anyhow::{Context, Result};
use pluginhub::config::AppConfig;
use pluginhub::db;
use pluginhub::release::AccessLevel;
use pluginhub::server;
use pluginhub::server::middleware_auth::encode_session_token;
use std::time::Duration;
use tracing::info;

use super::Cli;

/// Load the config file and environment, then apply CLI flags on top.
pub fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(url) = &cli.database_url {
        config.database.url = Some(url.clone());
    }
    Ok(config)
}

fn database_url(config: &AppConfig) -> Result<&str> {
    config.database.url.as_deref().ok_or_else(|| {
        anyhow::anyhow!("DATABASE_URL is required (set via --database-url or env)")
    })
}

pub fn run_serve(mut config: AppConfig, port: Option<u16>) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate()?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(server::run(&config))
}

pub fn run_migrate(config: &AppConfig) -> Result<()> {
    let url = database_url(config)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let database = db::Database::connect(url).await?;
        database.apply_schema().await?;
        info!("schema applied");
        Ok(())
    })
}

pub fn run_grant(config: &AppConfig, user: &str, level: &str) -> Result<()> {
    let level: AccessLevel = level.parse()?;
    let url = database_url(config)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let database = db::Database::connect(url).await?;
        database.set_access_level(user, level).await?;
        info!(user, level = level.as_str(), "access level updated");
        Ok(())
    })
}

pub fn run_token(config: &AppConfig, user: &str, gh_token: &str, hours: u64) -> Result<()> {
    let secret = config
        .auth
        .jwt_secret
        .as_deref()
        .context("JWT_SECRET is required to issue session tokens")?;
    let token = encode_session_token(secret, user, gh_token, Duration::from_secs(hours * 3600))?;
    println!("{}", token);
    Ok(())
}
