//! # GitHub — REST Client for Permissions and Issue Comments
//!
//! Two calls are needed by the release workflow:
//!
//! - repository permission checks on behalf of the signed-in user
//!   (`GET /repositories/{id}` → `permissions.{pull,push,admin}`)
//! - issue comments posted by the bot account for release announcements
//!   (`POST /repos/{owner}/{repo}/issues/{n}/comments`)
//!
//! Neither call retries. The [`GitHubApi`] trait is the seam the server
//! holds, so tests can swap in a recording double.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Repository permission names as reported in `permissions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoPermission {
    Pull,
    Push,
    Admin,
}

impl RepoPermission {
    pub fn as_str(self) -> &'static str {
        match self {
            RepoPermission::Pull => "pull",
            RepoPermission::Push => "push",
            RepoPermission::Admin => "admin",
        }
    }
}

#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// Whether the token's user holds `permission` on the repository.
    async fn has_repo_permission(
        &self,
        repo_id: i64,
        access_token: &str,
        permission: RepoPermission,
    ) -> Result<bool>;

    /// Post a comment to `repo` (`owner/name`) issue `issue`.
    async fn post_issue_comment(
        &self,
        repo: &str,
        issue: u64,
        body: &str,
        token: &str,
    ) -> Result<()>;
}

#[derive(Deserialize)]
struct RepositoryResponse {
    #[serde(default)]
    permissions: Option<Permissions>,
}

#[derive(Deserialize, Default)]
struct Permissions {
    #[serde(default)]
    admin: bool,
    #[serde(default)]
    push: bool,
    #[serde(default)]
    pull: bool,
}

impl Permissions {
    fn grants(&self, permission: RepoPermission) -> bool {
        match permission {
            RepoPermission::Pull => self.pull,
            RepoPermission::Push => self.push,
            RepoPermission::Admin => self.admin,
        }
    }
}

pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
}

impl GitHubClient {
    pub fn new(api_base: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("pluginhub/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build GitHub HTTP client")?;
        Ok(GitHubClient {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn has_repo_permission(
        &self,
        repo_id: i64,
        access_token: &str,
        permission: RepoPermission,
    ) -> Result<bool> {
        let resp = self
            .http
            .get(self.url(&format!("repositories/{}", repo_id)))
            .bearer_auth(access_token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .context("GitHub repository lookup failed")?;

        let status = resp.status();
        // A private repository the user cannot see answers 404.
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::FORBIDDEN {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(anyhow!(
                "GitHub repository lookup for {} returned {}",
                repo_id,
                status
            ));
        }
        let repo: RepositoryResponse = resp.json().await?;
        Ok(repo
            .permissions
            .unwrap_or_default()
            .grants(permission))
    }

    async fn post_issue_comment(
        &self,
        repo: &str,
        issue: u64,
        body: &str,
        token: &str,
    ) -> Result<()> {
        let resp = self
            .http
            .post(self.url(&format!("repos/{}/issues/{}/comments", repo, issue)))
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await
            .context("GitHub comment request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "GitHub comment on {}#{} returned {}: {}",
                repo,
                issue,
                status,
                text
            ));
        }
        Ok(())
    }
}
