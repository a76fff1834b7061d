//! Release announcements.
//!
//! When a release first becomes public, the transition transaction records a
//! timeline event and hands back the details needed for an announcement. The
//! announcement is queued only after commit; a background worker posts it to
//! the master thread and the category thread of the announcement repository.
//!
//! Delivery is at most once: a failed post is logged and counted, never
//! retried, and never reported back to the request that caused it.

use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{Category, ReleaseState};
use crate::db::AnnouncementRow;
use crate::github::GitHubApi;
use crate::prom_metrics::OutcomeLabel;

/// Where and as whom announcements are posted.
#[derive(Debug, Clone)]
pub struct AnnounceSettings {
    /// `owner/name` of the repository holding the announcement issues.
    pub repo: String,
    pub master_issue: u64,
    pub bot_token: Option<String>,
    /// Public site base URL, without trailing slash.
    pub site_url: String,
    pub site_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub release_id: i64,
    pub name: String,
    pub version: String,
    pub owner: String,
    pub category: Option<Category>,
    pub state: ReleaseState,
    pub changed_by: String,
}

impl Announcement {
    /// Build an announcement for a release that just became public.
    ///
    /// Returns `None` when earlier releases of the project already reached the
    /// same state: only a project's first release at that level is announced.
    pub fn for_transition(
        release_id: i64,
        row: AnnouncementRow,
        state: ReleaseState,
        changed_by: &str,
    ) -> Option<Self> {
        if row.earlier_releases != 0 {
            return None;
        }
        Some(Announcement {
            release_id,
            name: row.name,
            version: row.version,
            owner: row.owner,
            category: row.main_category.map(Category),
            state,
            changed_by: changed_by.to_string(),
        })
    }

    pub fn body(&self, settings: &AnnounceSettings) -> String {
        let heading = match self.category.and_then(Category::name) {
            Some(category) => format!("**A new {} plugin has been released!**", category),
            None => "**A new plugin has been released!**".to_string(),
        };
        let page = format!("{}/p/{}/{}", settings.site_url, self.name, self.version);
        format!(
            "{heading}\n\n**[{name} v{version}]({page})** by @{owner} has been **{state}** by {by} on {site}. Don't forget to [review]({page}#review-anchor) it!",
            heading = heading,
            name = self.name,
            version = self.version,
            page = page,
            owner = self.owner,
            state = self.state.human_name(),
            by = self.changed_by,
            site = settings.site_name,
        )
    }

    /// Issue threads to post to: the master thread, then the category thread.
    /// Each thread appears once even if the numbers coincide.
    pub fn threads(&self, master_issue: u64) -> Vec<u64> {
        let mut threads = vec![master_issue];
        if let Some(issue) = self.category.and_then(Category::issue_number) {
            if issue != master_issue {
                threads.push(issue);
            }
        }
        threads
    }
}

/// Post an announcement to every thread. Returns the number of successful posts.
pub async fn deliver(
    github: &dyn GitHubApi,
    settings: &AnnounceSettings,
    announcement: &Announcement,
    outcomes: &Family<OutcomeLabel, Counter>,
) -> usize {
    let Some(token) = settings.bot_token.as_deref() else {
        warn!(
            release_id = announcement.release_id,
            "no bot token configured, skipping release announcement"
        );
        outcomes
            .get_or_create(&OutcomeLabel {
                outcome: "skipped".to_string(),
            })
            .inc();
        return 0;
    };

    let body = announcement.body(settings);
    let mut posted = 0;
    for issue in announcement.threads(settings.master_issue) {
        match github
            .post_issue_comment(&settings.repo, issue, &body, token)
            .await
        {
            Ok(()) => {
                posted += 1;
                outcomes
                    .get_or_create(&OutcomeLabel {
                        outcome: "ok".to_string(),
                    })
                    .inc();
                info!(
                    release_id = announcement.release_id,
                    repo = %settings.repo,
                    issue,
                    "posted release announcement"
                );
            }
            Err(e) => {
                outcomes
                    .get_or_create(&OutcomeLabel {
                        outcome: "failed".to_string(),
                    })
                    .inc();
                warn!(
                    release_id = announcement.release_id,
                    repo = %settings.repo,
                    issue,
                    error = %e,
                    "failed to post release announcement"
                );
            }
        }
    }
    posted
}

/// Post-commit announcement queue.
///
/// `enqueue` never blocks the request; the worker task owns delivery.
pub struct Notifier {
    tx: mpsc::UnboundedSender<Announcement>,
}

impl Notifier {
    /// Start the delivery worker on the current Tokio runtime.
    pub fn spawn(
        github: Arc<dyn GitHubApi>,
        settings: AnnounceSettings,
        outcomes: Family<OutcomeLabel, Counter>,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Announcement>();
        tokio::spawn(async move {
            while let Some(announcement) = rx.recv().await {
                deliver(github.as_ref(), &settings, &announcement, &outcomes).await;
            }
            info!("announcement queue closed");
        });
        Notifier { tx }
    }

    pub fn enqueue(&self, announcement: Announcement) {
        let release_id = announcement.release_id;
        if self.tx.send(announcement).is_err() {
            warn!(release_id, "announcement worker stopped, dropping announcement");
        }
    }
}
