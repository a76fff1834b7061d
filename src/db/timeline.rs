//! Append-only release timeline.

use anyhow::Result;
use sqlx::PgConnection;

use super::Database;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TimelineEventRow {
    pub event_id: i64,
    pub release_id: i64,
    pub old_state: i16,
    pub new_state: i16,
    pub changed_by: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Insert a state-change event. Runs on the caller's transaction so the event
/// commits together with the state change it records.
pub(super) async fn insert_release_event(
    conn: &mut PgConnection,
    release_id: i64,
    old_state: i16,
    new_state: i16,
    changed_by: &str,
) -> Result<i64> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO release_timeline (release_id, old_state, new_state, changed_by)
         VALUES ($1, $2, $3, $4)
         RETURNING event_id",
    )
    .bind(release_id)
    .bind(old_state)
    .bind(new_state)
    .bind(changed_by)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

impl Database {
    pub async fn list_release_timeline(&self, release_id: i64) -> Result<Vec<TimelineEventRow>> {
        let rows = sqlx::query_as::<_, TimelineEventRow>(
            "SELECT event_id, release_id, old_state, new_state, changed_by, created_at
             FROM release_timeline
             WHERE release_id = $1
             ORDER BY event_id",
        )
        .bind(release_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
