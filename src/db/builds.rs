//! Build history queries.
//!
//! The branch column differs between dev and PR listings: dev builds match on
//! `builds.branch`, PR builds on the `prNumber` recorded in the build cause.
//! Both variants are fixed statements; [`BranchKind`] picks one, so request
//! input never reaches the SQL text. A cause that is not valid JSON yields no
//! PR number (`cause_pr_number` in the schema) instead of failing the page.

use anyhow::Result;

use super::Database;
use crate::builds::{BranchKind, BuildClass, WILDCARD_DEV, WILDCARD_PR};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BuildHistoryRow {
    pub build_id: i64,
    pub class: i16,
    pub internal: i64,
    pub date: i64,
    pub resource_id: i64,
    pub branch: Option<String>,
    pub sha: String,
    pub cause: String,
    pub main: Option<String>,
    pub path: String,
    pub lint_count: Option<i64>,
    pub worst_lint: Option<i32>,
    pub virion_version: Option<String>,
    pub virion_api: Option<String>,
    pub libs: Option<String>,
}

macro_rules! build_history_sql {
    ($branch_col:literal) => {
        concat!(
            "SELECT b.build_id, b.class, b.internal,
                    EXTRACT(EPOCH FROM b.created)::BIGINT AS date,
                    b.resource_id, ",
            $branch_col,
            " AS branch, b.sha, b.cause, b.main, b.path,
                    bs.cnt AS lint_count, bs.max_level AS worst_lint,
                    vb.version AS virion_version, vb.api AS virion_api,
                    (SELECT string_agg(vp.name || ':' || vvb.version, ',' ORDER BY vp.name)
                       FROM virion_usages vu
                       JOIN builds lb ON vu.virion_build = lb.build_id
                       JOIN virion_builds vvb ON vvb.build_id = lb.build_id
                       JOIN projects vp ON vp.project_id = lb.project_id
                      WHERE vu.user_build = b.build_id) AS libs
             FROM builds b
             LEFT JOIN (SELECT build_id, COUNT(*) AS cnt, MAX(level) AS max_level
                          FROM build_statuses GROUP BY build_id) bs
                    ON bs.build_id = b.build_id
             LEFT JOIN virion_builds vb ON vb.build_id = b.build_id
             WHERE b.project_id = $1
               AND ($2::BIGINT = -1 OR b.internal < $2)
               AND b.class = $3
               AND $4 IN (",
            $branch_col,
            ", $6, $7)
             ORDER BY b.build_id DESC
             LIMIT $5"
        )
    };
}

const DEV_HISTORY_SQL: &str = build_history_sql!("b.branch");
const PR_HISTORY_SQL: &str = build_history_sql!("cause_pr_number(b.cause)");

impl Database {
    /// Builds of one project, newest first, optionally below an internal counter.
    ///
    /// `cursor` is `-1` for "no bound" or an exclusive upper bound on `internal`.
    pub async fn get_build_history(
        &self,
        project_id: i64,
        kind: BranchKind,
        branch: &str,
        cursor: i64,
        limit: i64,
    ) -> Result<Vec<BuildHistoryRow>> {
        let sql = match kind {
            BranchKind::Dev => DEV_HISTORY_SQL,
            BranchKind::PullRequest => PR_HISTORY_SQL,
        };
        let class: BuildClass = kind.build_class();
        let rows = sqlx::query_as::<_, BuildHistoryRow>(sql)
            .bind(project_id)
            .bind(cursor)
            .bind(class.as_i16())
            .bind(branch)
            .bind(limit)
            .bind(WILDCARD_DEV)
            .bind(WILDCARD_PR)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_statement_matches_on_branch_column() {
        assert!(DEV_HISTORY_SQL.contains("b.branch AS branch"));
        assert!(DEV_HISTORY_SQL.contains("$4 IN (b.branch, $6, $7)"));
        assert!(!DEV_HISTORY_SQL.contains("prNumber"));
    }

    #[test]
    fn pr_statement_matches_on_cause_pr_number() {
        assert!(PR_HISTORY_SQL.contains("cause_pr_number(b.cause) AS branch"));
        assert!(PR_HISTORY_SQL.contains("$4 IN (cause_pr_number(b.cause), $6, $7)"));
        assert!(!PR_HISTORY_SQL.contains("::jsonb"));
    }

    #[test]
    fn statements_order_newest_first() {
        for sql in [DEV_HISTORY_SQL, PR_HISTORY_SQL] {
            assert!(sql.contains("ORDER BY b.build_id DESC"));
            assert!(sql.contains("LIMIT $5"));
        }
    }
}
