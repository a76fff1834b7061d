//! Shared test helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use pluginhub::db::Database;
use pluginhub::github::{GitHubApi, RepoPermission};
use pluginhub::release::notify::AnnounceSettings;
use pluginhub::resource::ResourceStore;
use pluginhub::server::{self, middleware_auth, AppState};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;

pub const TEST_JWT_SECRET: &str = "integration-test-secret";
pub const ANNOUNCE_REPO: &str = "poggit/plugins";
pub const MASTER_ISSUE: u64 = 16;

/// Returns the test database URL from the `TEST_DATABASE_URL` environment variable.
/// Panics if the variable is not set.
pub fn test_db_url() -> String {
    std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set for integration tests")
}

/// Returns true if the test database URL is configured.
pub fn has_test_db() -> bool {
    std::env::var("TEST_DATABASE_URL").is_ok()
}

static SCHEMA_INIT: OnceCell<()> = OnceCell::const_new();

/// Connect to the test database, apply the schema once, and empty every table.
pub async fn setup_test_db() -> Database {
    let db = Database::connect(&test_db_url())
        .await
        .expect("Failed to connect to test database");
    SCHEMA_INIT
        .get_or_init(|| async {
            db.apply_schema().await.expect("schema failed to apply");
        })
        .await;
    truncate_all_tables(db.pool()).await;
    db
}

/// Truncate all tables to ensure test isolation.
pub async fn truncate_all_tables(pool: &sqlx::PgPool) {
    sqlx::raw_sql(
        "TRUNCATE TABLE release_timeline, release_categories, releases,
                       virion_usages, virion_builds, build_statuses, builds,
                       resources, projects, repos, user_roles
         RESTART IDENTITY CASCADE",
    )
    .execute(pool)
    .await
    .unwrap();
}

/// GitHub double: grants push on a fixed set of repositories and records
/// every call.
#[derive(Default)]
pub struct RecordingGitHub {
    pub push_repos: Mutex<HashSet<i64>>,
    pub permission_checks: Mutex<Vec<i64>>,
    pub comments: Mutex<Vec<PostedComment>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedComment {
    pub repo: String,
    pub issue: u64,
    pub body: String,
}

impl RecordingGitHub {
    pub fn grant_push(&self, repo_id: i64) {
        self.push_repos.lock().unwrap().insert(repo_id);
    }

    pub fn comments(&self) -> Vec<PostedComment> {
        self.comments.lock().unwrap().clone()
    }

    pub fn permission_checks(&self) -> Vec<i64> {
        self.permission_checks.lock().unwrap().clone()
    }

    /// Wait until at least `n` comments were posted, or give up after 2 s.
    pub async fn wait_for_comments(&self, n: usize) -> Vec<PostedComment> {
        for _ in 0..40 {
            let posted = self.comments();
            if posted.len() >= n {
                return posted;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.comments()
    }
}

#[async_trait]
impl GitHubApi for RecordingGitHub {
    async fn has_repo_permission(
        &self,
        repo_id: i64,
        _access_token: &str,
        permission: RepoPermission,
    ) -> anyhow::Result<bool> {
        self.permission_checks.lock().unwrap().push(repo_id);
        Ok(permission == RepoPermission::Push && self.push_repos.lock().unwrap().contains(&repo_id))
    }

    async fn post_issue_comment(
        &self,
        repo: &str,
        issue: u64,
        body: &str,
        _token: &str,
    ) -> anyhow::Result<()> {
        self.comments.lock().unwrap().push(PostedComment {
            repo: repo.to_string(),
            issue,
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Router plus the handles a test needs to arrange data and inspect effects.
pub struct TestApp {
    pub router: axum::Router,
    pub db: Database,
    pub github: Arc<RecordingGitHub>,
    pub resources: ResourceStore,
    pub resource_dir: tempfile::TempDir,
}

pub fn announce_settings() -> AnnounceSettings {
    AnnounceSettings {
        repo: ANNOUNCE_REPO.to_string(),
        master_issue: MASTER_ISSUE,
        bot_token: Some("bot-token".to_string()),
        site_url: "https://poggit.pmmp.io".to_string(),
        site_name: "Poggit".to_string(),
    }
}

/// Build an Axum test app router connected to the test database.
pub async fn build_test_app() -> TestApp {
    let db = setup_test_db().await;
    let resource_dir = tempfile::tempdir().unwrap();
    let github = Arc::new(RecordingGitHub::default());
    let state = AppState::new(
        Database::from_pool(db.pool().clone()),
        ResourceStore::new(resource_dir.path()),
        github.clone(),
        announce_settings(),
        TEST_JWT_SECRET,
    );
    TestApp {
        router: server::build_router(state),
        db,
        github,
        resources: ResourceStore::new(resource_dir.path()),
        resource_dir,
    }
}

pub fn session_token(login: &str) -> String {
    middleware_auth::encode_session_token(
        TEST_JWT_SECRET,
        login,
        "gho_test",
        Duration::from_secs(3600),
    )
    .unwrap()
}

// ── Fixtures ────────────────────────────────────────────────────

pub async fn insert_repo_project(pool: &sqlx::PgPool, repo_id: i64, owner: &str, name: &str) -> i64 {
    sqlx::query("INSERT INTO repos (repo_id, owner, name) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING")
        .bind(repo_id)
        .bind(owner)
        .bind(name)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query_scalar("INSERT INTO projects (repo_id, name) VALUES ($1, $2) RETURNING project_id")
        .bind(repo_id)
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Insert a resource row and write its file under `dir`.
pub async fn insert_resource(pool: &sqlx::PgPool, dir: &Path, kind: &str, content: &[u8]) -> i64 {
    let id: i64 = sqlx::query_scalar("INSERT INTO resources (kind) VALUES ($1) RETURNING resource_id")
        .bind(kind)
        .fetch_one(pool)
        .await
        .unwrap();
    std::fs::write(dir.join(format!("{}.{}", id, kind)), content).unwrap();
    id
}

pub struct BuildFixture<'a> {
    pub project_id: i64,
    pub class: i16,
    pub branch: &'a str,
    pub internal: i64,
    pub cause: &'a str,
}

pub async fn insert_build(pool: &sqlx::PgPool, dir: &Path, build: BuildFixture<'_>) -> i64 {
    let artifact = insert_resource(pool, dir, "phar", &vec![0u8; 100 + build.internal as usize]).await;
    sqlx::query_scalar(
        "INSERT INTO builds (project_id, resource_id, class, branch, sha, cause, internal)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING build_id",
    )
    .bind(build.project_id)
    .bind(artifact)
    .bind(build.class)
    .bind(build.branch)
    .bind(format!("{:040x}", build.internal))
    .bind(build.cause)
    .bind(build.internal)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub struct ReleaseFixture {
    pub release_id: i64,
    pub project_id: i64,
    pub state: i16,
    pub flags: i32,
    pub description: i64,
    pub changelog: Option<i64>,
    pub license_res: Option<i64>,
}

pub async fn insert_release(pool: &sqlx::PgPool, r: ReleaseFixture) {
    sqlx::query(
        "INSERT INTO releases (release_id, project_id, name, version, state, flags,
                               description, changelog, license_res)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(r.release_id)
    .bind(r.project_id)
    .bind("EconomyAPI")
    .bind(format!("1.0.{}", r.release_id))
    .bind(r.state)
    .bind(r.flags)
    .bind(r.description)
    .bind(r.changelog)
    .bind(r.license_res)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn set_main_category(pool: &sqlx::PgPool, project_id: i64, category: i32) {
    sqlx::query(
        "INSERT INTO release_categories (project_id, category, is_main_category) VALUES ($1, $2, TRUE)",
    )
    .bind(project_id)
    .bind(category)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn release_flags(pool: &sqlx::PgPool, release_id: i64) -> i32 {
    sqlx::query_scalar("SELECT flags FROM releases WHERE release_id = $1")
        .bind(release_id)
        .fetch_one(pool)
        .await
        .unwrap()
}
