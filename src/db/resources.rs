//! Resource metadata rows. Files are handled by [`crate::resource::ResourceStore`].

use anyhow::Result;

use super::Database;

impl Database {
    pub async fn get_resource_kind(&self, resource_id: i64) -> Result<Option<String>> {
        let kind = sqlx::query_scalar::<_, String>(
            "SELECT kind FROM resources WHERE resource_id = $1",
        )
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(kind)
    }

    /// Returns false if the row was already gone.
    pub async fn delete_resource_row(&self, resource_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM resources WHERE resource_id = $1")
            .bind(resource_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
