//! Release lookup, deletion and state transitions.
//!
//! ## Transition transaction
//!
//! `transition_release` runs as one transaction:
//!
//! 1. lock every release of the owning project (`FOR UPDATE`, id order)
//! 2. update the state, stamping `update_time` when publicity changes
//! 3. recompute the obsolete flag over the locked rows and write changes
//! 4. when the release just became public, append a timeline event and read
//!    the announcement details
//!
//! Concurrent transitions within a project serialize on step 1, so the
//! single-head invariant holds after every commit.

use anyhow::Result;
use sqlx::PgConnection;

use super::Database;
use crate::release::{self, ReleaseState, SiblingRelease};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReleaseDeleteMeta {
    pub release_id: i64,
    pub repo_id: i64,
    pub owner: String,
    pub state: i16,
    pub description: i64,
    pub changelog: Option<i64>,
    pub license_res: Option<i64>,
}

impl ReleaseDeleteMeta {
    /// Resource ids owned by the release, description first.
    pub fn resource_ids(&self) -> Vec<i64> {
        std::iter::once(self.description)
            .chain(self.changelog)
            .chain(self.license_res)
            .collect()
    }
}

/// Details needed to announce a newly public release.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnnouncementRow {
    pub name: String,
    pub version: String,
    pub owner: String,
    /// Earlier releases of the project (smaller id) at or above the new state.
    pub earlier_releases: i64,
    pub main_category: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub project_id: i64,
    pub old_state: i16,
    pub head: Option<i64>,
    /// Present only when the transition made the release public.
    pub announcement: Option<AnnouncementRow>,
}

impl Database {
    pub async fn get_release_delete_meta(&self, release_id: i64) -> Result<Option<ReleaseDeleteMeta>> {
        let row = sqlx::query_as::<_, ReleaseDeleteMeta>(
            "SELECT r.release_id, rp.repo_id, rp.owner, r.state,
                    r.description, r.changelog, r.license_res
             FROM releases r
             JOIN projects p ON p.project_id = r.project_id
             JOIN repos rp ON rp.repo_id = p.repo_id
             WHERE r.release_id = $1",
        )
        .bind(release_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Delete a release only if it is still in `expected_state`.
    ///
    /// Returns false when the row is gone or its state moved on since the
    /// permission check.
    pub async fn delete_release_in_state(&self, release_id: i64, expected_state: i16) -> Result<bool> {
        let result = sqlx::query("DELETE FROM releases WHERE release_id = $1 AND state = $2")
            .bind(release_id)
            .bind(expected_state)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_release_state(&self, release_id: i64) -> Result<Option<i16>> {
        let state = sqlx::query_scalar::<_, i16>("SELECT state FROM releases WHERE release_id = $1")
            .bind(release_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(state)
    }

    pub async fn get_project_releases(&self, project_id: i64) -> Result<Vec<SiblingRelease>> {
        let rows = sqlx::query_as::<_, SiblingRelease>(
            "SELECT release_id, state, flags FROM releases
             WHERE project_id = $1 ORDER BY release_id",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Apply a state transition. Returns `None` if the release does not exist.
    pub async fn transition_release(
        &self,
        release_id: i64,
        new_state: ReleaseState,
        changed_by: &str,
    ) -> Result<Option<TransitionOutcome>> {
        let mut tx = self.pool.begin().await?;

        let project_id: Option<i64> =
            sqlx::query_scalar("SELECT project_id FROM releases WHERE release_id = $1")
                .bind(release_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(project_id) = project_id else {
            return Ok(None);
        };

        let mut siblings = sqlx::query_as::<_, SiblingRelease>(
            "SELECT release_id, state, flags FROM releases
             WHERE project_id = $1
             ORDER BY release_id
             FOR UPDATE",
        )
        .bind(project_id)
        .fetch_all(&mut *tx)
        .await?;

        // Deleted between the lookup and the lock.
        let Some(current) = siblings.iter_mut().find(|r| r.release_id == release_id) else {
            return Ok(None);
        };
        let old_state = current.state;
        current.state = new_state.as_i16();

        if release::stamps_update_time(old_state, new_state) {
            sqlx::query(
                "UPDATE releases SET state = $1, update_time = NOW() WHERE release_id = $2",
            )
            .bind(new_state.as_i16())
            .bind(release_id)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query("UPDATE releases SET state = $1 WHERE release_id = $2")
                .bind(new_state.as_i16())
                .bind(release_id)
                .execute(&mut *tx)
                .await?;
        }

        let plan = release::recompute_obsolete(&siblings);
        for update in &plan.updates {
            sqlx::query("UPDATE releases SET flags = $1 WHERE release_id = $2")
                .bind(update.flags)
                .bind(update.release_id)
                .execute(&mut *tx)
                .await?;
        }

        let announcement = if release::crosses_into_public(old_state, new_state) {
            super::timeline::insert_release_event(
                &mut tx,
                release_id,
                old_state,
                new_state.as_i16(),
                changed_by,
            )
            .await?;
            load_announcement(&mut tx, release_id, new_state).await?
        } else {
            None
        };

        tx.commit().await?;

        Ok(Some(TransitionOutcome {
            project_id,
            old_state,
            head: plan.head,
            announcement,
        }))
    }
}

async fn load_announcement(
    conn: &mut PgConnection,
    release_id: i64,
    new_state: ReleaseState,
) -> Result<Option<AnnouncementRow>> {
    let row = sqlx::query_as::<_, AnnouncementRow>(
        "SELECT r.name, r.version, rp.owner,
                (SELECT COUNT(*) FROM releases r2
                  WHERE r2.project_id = r.project_id
                    AND r2.release_id < r.release_id
                    AND r2.state >= $2) AS earlier_releases,
                (SELECT rc.category FROM release_categories rc
                  WHERE rc.project_id = r.project_id AND rc.is_main_category
                  LIMIT 1) AS main_category
         FROM releases r
         JOIN projects p ON p.project_id = r.project_id
         JOIN repos rp ON rp.repo_id = p.repo_id
         WHERE r.release_id = $1",
    )
    .bind(release_id)
    .bind(new_state.as_i16())
    .fetch_optional(conn)
    .await?;
    Ok(row)
}
