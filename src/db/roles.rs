//! User privilege levels.

use anyhow::Result;

use super::Database;
use crate::release::AccessLevel;

impl Database {
    /// Privilege level for a user (defaults to `none` when no row exists).
    pub async fn get_access_level(&self, user_name: &str) -> Result<AccessLevel> {
        let level = sqlx::query_scalar::<_, String>(
            "SELECT level FROM user_roles WHERE user_name = $1",
        )
        .bind(user_name)
        .fetch_optional(&self.pool)
        .await?;
        match level {
            Some(l) => l.parse(),
            None => Ok(AccessLevel::None),
        }
    }

    pub async fn set_access_level(&self, user_name: &str, level: AccessLevel) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_roles (user_name, level) VALUES ($1, $2)
             ON CONFLICT (user_name) DO UPDATE SET level = EXCLUDED.level",
        )
        .bind(user_name)
        .bind(level.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
