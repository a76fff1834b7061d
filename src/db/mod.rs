//! # Database — PostgreSQL Storage Layer
//!
//! Provides async database operations for CI builds, releases and stored
//! resources via `sqlx::PgPool`.
//!
//! ## Schema
//!
//! - `builds`, `build_statuses`, `virion_builds`, `virion_usages`: CI output
//! - `releases`, `release_categories`, `release_timeline`: review workflow
//! - `resources`: metadata for files under the resource root
//! - `repos`, `projects`: ownership
//! - `user_roles`: moderator/admin privilege levels
//!
//! ## Module Structure
//!
//! - [`builds`] — paginated build history
//! - [`releases`] — release lookup, deletion, state transitions
//! - [`resources`] — resource metadata rows
//! - [`timeline`] — append-only release timeline
//! - [`roles`] — user privilege levels

mod builds;
mod releases;
mod resources;
mod roles;
mod timeline;

pub use builds::BuildHistoryRow;
pub use releases::{AnnouncementRow, ReleaseDeleteMeta, TransitionOutcome};
pub use timeline::TimelineEventRow;

use anyhow::Result;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};

const SCHEMA_SQL: &str = include_str!("../../migrations/001_schema.sql");

pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL using the provided database URL.
    ///
    /// The URL is parsed by hand so percent-encoded credentials survive intact.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let url = url::Url::parse(database_url)?;
        let username = urlencoding::decode(url.username())?.into_owned();
        let password = url
            .password()
            .map(|p| urlencoding::decode(p).map(|s| s.into_owned()))
            .transpose()?;
        let mut opts = PgConnectOptions::new()
            .host(url.host_str().unwrap_or("localhost"))
            .port(url.port().unwrap_or(5432))
            .database(url.path().trim_start_matches('/'))
            .username(&username);
        if let Some(ref pw) = password {
            opts = opts.password(pw);
        }
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect_with(opts)
            .await?;
        Ok(Database { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Database { pool }
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create all tables and indexes. Idempotent.
    pub async fn apply_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Health check: execute `SELECT 1` to verify database connectivity.
    ///
    /// Used by the `/readyz` readiness probe.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
