//! Release delete and state-transition flows.
//!
//! All validation happens before the first write. GitHub is consulted for
//! repository permissions before any transaction opens, and announcements are
//! queued only after the transition has committed.

use serde_json::Value;
use tracing::{info, warn};

use super::notify::Announcement;
use super::{AccessLevel, ReleaseState, DELETED_STATE};
use crate::context::RequestContext;
use crate::error::ApiError;
use crate::github::RepoPermission;
use crate::prom_metrics::StateLabel;
use crate::resource::RemoveOutcome;

/// Interpret a JSON value as an integer: numbers and numeric strings qualify.
pub fn parse_integer(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn parse_state(value: Option<&Value>) -> Result<ReleaseState, ApiError> {
    let raw = parse_integer(value).ok_or_else(|| ApiError::bad_request("state must be numeric"))?;
    ReleaseState::from_i64(raw)
        .ok_or_else(|| ApiError::bad_request(format!("unknown release state {}", raw)))
}

/// Delete a draft or submitted release together with its stored resources.
///
/// Returns [`DELETED_STATE`].
pub async fn delete_release(ctx: &RequestContext<'_>, release_id: i64) -> Result<i64, ApiError> {
    let meta = ctx
        .db
        .get_release_delete_meta(release_id)
        .await?
        .ok_or_else(|| ApiError::not_found("release not found"))?;

    let has_push = if super::requires_push_check(meta.state, ctx.actor.level) {
        ctx.github
            .has_repo_permission(meta.repo_id, &ctx.actor.access_token, RepoPermission::Push)
            .await?
    } else {
        false
    };
    if !super::may_delete(meta.state, has_push, ctx.actor.level) {
        return Err(ApiError::access_denied("You cannot delete this release."));
    }

    if !ctx.db.delete_release_in_state(release_id, meta.state).await? {
        return match ctx.db.get_release_state(release_id).await? {
            None => Err(ApiError::not_found("release not found")),
            // State moved on since the permission check; decide again next time.
            Some(_) => Err(ApiError::access_denied("You cannot delete this release.")),
        };
    }

    let mut first_error = None;
    let (mut removed, mut missing, mut failed) = (0u32, 0u32, 0u32);
    for resource_id in meta.resource_ids() {
        match ctx.resources.remove(ctx.db, resource_id).await {
            Ok(RemoveOutcome::Removed) => removed += 1,
            Ok(RemoveOutcome::FileMissing | RemoveOutcome::Unknown) => missing += 1,
            Err(e) => {
                warn!(release_id, resource_id, error = %format!("{:#}", e), "failed to remove release resource");
                failed += 1;
                first_error.get_or_insert(e);
            }
        }
    }

    ctx.metrics.release_deletions.inc();
    info!(
        user = %ctx.actor.login,
        release_id,
        owner = %meta.owner,
        resources_removed = removed,
        resources_missing = missing,
        resources_failed = failed,
        "deleted release"
    );

    match first_error {
        Some(e) => Err(e.into()),
        None => Ok(DELETED_STATE),
    }
}

/// Move a release to a new review state. Moderators and admins only.
pub async fn transition_release(
    ctx: &RequestContext<'_>,
    release_id: i64,
    requested_state: Option<&Value>,
) -> Result<ReleaseState, ApiError> {
    if ctx.actor.level < AccessLevel::Moderator {
        return Err(ApiError::access_denied("moderator access required"));
    }
    let new_state = parse_state(requested_state)?;

    let changed_by = ctx.actor.mention();
    let outcome = ctx
        .db
        .transition_release(release_id, new_state, &changed_by)
        .await?
        .ok_or_else(|| ApiError::not_found("release not found"))?;

    ctx.metrics
        .release_transitions
        .get_or_create(&StateLabel {
            state: new_state.human_name().to_string(),
        })
        .inc();
    info!(
        user = %ctx.actor.login,
        release_id,
        project_id = outcome.project_id,
        old_state = outcome.old_state,
        new_state = new_state.as_i16(),
        head = outcome.head.unwrap_or(-1),
        "changed release state"
    );

    if let Some(row) = outcome.announcement {
        if let Some(announcement) =
            Announcement::for_transition(release_id, row, new_state, &changed_by)
        {
            ctx.notifier.enqueue(announcement);
        }
    }

    Ok(new_state)
}
