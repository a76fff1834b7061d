//! # Main — CLI Entry Point
//!
//! Routes CLI subcommands to the server and to the small maintenance commands
//! around it. Shared concerns handled here: `.env` loading, logging setup,
//! and config resolution.
//!
//! ## Subcommands
//!
//! - `serve`: run the HTTP server.
//! - `migrate`: apply the database schema.
//! - `grant`: set a user's access level (`none`, `moderator`, `admin`).
//! - `token`: issue a session token for a GitHub login.
//!
//! ## Global Options
//!
//! - `--config`: TOML config file. Optional; defaults apply otherwise.
//! - `--database-url` / `DATABASE_URL`: PostgreSQL connection.

mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "pluginhub", about = "Build history and release review API for a plugin host")]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(long, env = "PLUGINHUB_CONFIG")]
    config: Option<PathBuf>,

    /// PostgreSQL connection URL (or set DATABASE_URL env var)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (overrides config and PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Apply the database schema
    Migrate,
    /// Set the access level of a user
    Grant {
        /// GitHub login
        #[arg(long)]
        user: String,
        /// none, moderator or admin
        #[arg(long)]
        level: String,
    },
    /// Issue a session token (for local testing and service accounts)
    Token {
        /// GitHub login
        #[arg(long)]
        user: String,
        /// GitHub access token embedded in the session
        #[arg(long, env = "GITHUB_USER_TOKEN")]
        gh_token: String,
        /// Token lifetime in hours
        #[arg(long, default_value_t = 24)]
        hours: u64,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // LOG_FORMAT=json for log shippers, human-readable otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();
    let config = cli::resolve_config(&cli)?;

    match &cli.command {
        Commands::Serve { port } => cli::run_serve(config, *port),
        Commands::Migrate => cli::run_migrate(&config),
        Commands::Grant { user, level } => cli::run_grant(&config, user, level),
        Commands::Token {
            user,
            gh_token,
            hours,
        } => cli::run_token(&config, user, gh_token, *hours),
    }
}
