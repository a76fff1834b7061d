//! Server configuration: TOML structs, environment overrides, and validation.
//!
//! A config file is optional. Every section has defaults, and the secrets
//! (`DATABASE_URL`, `JWT_SECRET`, `GITHUB_BOT_TOKEN`) are normally supplied
//! through the environment rather than written to disk.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::github::DEFAULT_API_BASE;
use crate::release::notify::AnnounceSettings;

// ── TOML Configuration Structs ──────────────────────────────────

/// Maps to the `[server]`, `[database]`, `[resources]`, `[github]` and
/// `[auth]` sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub resources: ResourceConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: default_port(),
        }
    }
}

fn default_port() -> u16 {
    7001
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

/// The `[resources]` section: where stored blobs live on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    #[serde(default = "default_resource_root")]
    pub root: PathBuf,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        ResourceConfig {
            root: default_resource_root(),
        }
    }
}

fn default_resource_root() -> PathBuf {
    PathBuf::from("resources")
}

/// The `[github]` section: API endpoint and announcement target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    pub bot_token: Option<String>,
    #[serde(default = "default_announce_repo")]
    pub announce_repo: String,
    #[serde(default = "default_master_issue")]
    pub master_issue: u64,
    #[serde(default = "default_site_url")]
    pub site_url: String,
    #[serde(default = "default_site_name")]
    pub site_name: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        GitHubConfig {
            api_base: default_api_base(),
            bot_token: None,
            announce_repo: default_announce_repo(),
            master_issue: default_master_issue(),
            site_url: default_site_url(),
            site_name: default_site_name(),
        }
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_announce_repo() -> String {
    "poggit/plugins".to_string()
}

fn default_master_issue() -> u64 {
    16
}

fn default_site_url() -> String {
    "https://poggit.pmmp.io".to_string()
}

fn default_site_name() -> String {
    "Poggit".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret used to verify session tokens.
    pub jwt_secret: Option<String>,
}

// ── Loading ─────────────────────────────────────────────────────

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Read the file if one is given, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                Self::from_toml_str(&content)
                    .with_context(|| format!("invalid config {}", path.display()))?
            }
            None => AppConfig::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `DATABASE_URL`, `JWT_SECRET`, `GITHUB_BOT_TOKEN`, `RESOURCE_DIR`
    /// and `PORT` from `lookup`. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(url) = get("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(secret) = get("JWT_SECRET") {
            self.auth.jwt_secret = Some(secret);
        }
        if let Some(token) = get("GITHUB_BOT_TOKEN") {
            self.github.bot_token = Some(token);
        }
        if let Some(dir) = get("RESOURCE_DIR") {
            self.resources.root = PathBuf::from(dir);
        }
        if let Some(port) = get("PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("PORT must be a port number, got {:?}", port))?;
        }
        Ok(())
    }

    /// Check everything `serve` needs is present.
    pub fn validate(&self) -> Result<()> {
        if self.database.url.as_deref().map_or(true, str::is_empty) {
            anyhow::bail!("DATABASE_URL is required (set via --database-url, env, or [database] url)");
        }
        if self.auth.jwt_secret.as_deref().map_or(true, str::is_empty) {
            anyhow::bail!("JWT_SECRET is required (set via env or [auth] jwt_secret)");
        }
        if !self.github.announce_repo.contains('/') {
            anyhow::bail!(
                "github.announce_repo must be owner/name, got {:?}",
                self.github.announce_repo
            );
        }
        Ok(())
    }

    pub fn announce_settings(&self) -> AnnounceSettings {
        AnnounceSettings {
            repo: self.github.announce_repo.clone(),
            master_issue: self.github.master_issue,
            bot_token: self.github.bot_token.clone(),
            site_url: self.github.site_url.trim_end_matches('/').to_string(),
            site_name: self.github.site_name.clone(),
        }
    }
}
