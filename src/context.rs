//! Per-request context: who is acting, and the handles a flow may touch.

use crate::db::Database;
use crate::github::GitHubApi;
use crate::prom_metrics::Metrics;
use crate::release::notify::Notifier;
use crate::release::AccessLevel;
use crate::resource::ResourceStore;

/// Authenticated user behind a request.
#[derive(Debug, Clone)]
pub struct Actor {
    /// GitHub login.
    pub login: String,
    /// GitHub OAuth token of the user, used for repository permission checks.
    pub access_token: String,
    pub level: AccessLevel,
}

impl Actor {
    /// How the actor is credited in timeline events and announcements.
    pub fn mention(&self) -> String {
        format!("@{}", self.login)
    }
}

pub struct RequestContext<'a> {
    pub actor: &'a Actor,
    pub db: &'a Database,
    pub resources: &'a ResourceStore,
    pub github: &'a dyn GitHubApi,
    pub notifier: &'a Notifier,
    pub metrics: &'a Metrics,
}
