//! # Builds — Paginated CI Build History
//!
//! Validates history requests, reads rows through [`Database::get_build_history`]
//! and turns them into [`BuildHistoryEntry`] records: the cause is decoded from
//! its stored JSON text, the `name:version,...` dependency list becomes a map,
//! and the artifact size is read from the resource store.
//!
//! ## Pagination
//!
//! `lt` is an exclusive upper bound on the per-project `internal` build counter.
//! `-1` means "start from the newest build". Clients page by passing the
//! smallest `internal` they have seen.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::db::{BuildHistoryRow, Database};
use crate::error::ApiError;
use crate::resource::ResourceStore;

/// Branch wildcard matching any dev branch.
pub const WILDCARD_DEV: &str = "special:dev";
/// Branch wildcard matching any pull request.
pub const WILDCARD_PR: &str = "special:pr";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum BuildClass {
    Dev = 1,
    Internal = 2,
    Release = 3,
    Pr = 4,
}

impl BuildClass {
    pub fn as_i16(self) -> i16 {
        self as i16
    }
}

/// Which family of branches a history request lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    Dev,
    PullRequest,
}

impl BranchKind {
    pub fn build_class(self) -> BuildClass {
        match self {
            BranchKind::Dev => BuildClass::Dev,
            BranchKind::PullRequest => BuildClass::Pr,
        }
    }
}

/// Exclusive upper bound on the internal build counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryCursor {
    Newest,
    Before(i64),
}

impl HistoryCursor {
    /// `-1` or a positive integer; anything else is rejected.
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            -1 => Some(HistoryCursor::Newest),
            n if n > 0 => Some(HistoryCursor::Before(n)),
            _ => None,
        }
    }

    pub fn as_raw(self) -> i64 {
        match self {
            HistoryCursor::Newest => -1,
            HistoryCursor::Before(n) => n,
        }
    }
}

/// Raw query string of `GET /api/builds/history`.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    #[serde(rename = "projectId")]
    pub project_id: Option<String>,
    pub branch: Option<String>,
    /// Presence alone selects pull-request history.
    pub pr: Option<String>,
    pub count: Option<String>,
    pub lt: Option<String>,
}

/// A validated history request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub project_id: i64,
    pub kind: BranchKind,
    pub branch: String,
    pub count: i64,
    pub cursor: HistoryCursor,
}

fn parse_int(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
}

impl HistoryRequest {
    pub fn from_params(params: &HistoryParams) -> Result<Self, ApiError> {
        let project_id = parse_int(params.project_id.as_deref())
            .ok_or_else(|| ApiError::bad_request("projectId must be an integer"))?;
        let branch = params
            .branch
            .clone()
            .ok_or_else(|| ApiError::bad_request("missing parameter branch"))?;
        let kind = if params.pr.is_some() {
            BranchKind::PullRequest
        } else {
            BranchKind::Dev
        };
        let count = parse_int(params.count.as_deref())
            .filter(|c| *c > 0)
            .ok_or_else(|| ApiError::bad_request("count must be a positive integer"))?;
        let cursor = parse_int(params.lt.as_deref())
            .and_then(HistoryCursor::from_raw)
            .ok_or_else(|| ApiError::bad_request("end must be -1 or positive integer"))?;
        Ok(HistoryRequest {
            project_id,
            kind,
            branch,
            count,
            cursor,
        })
    }
}

/// Dev branches are names; PR branches are pull request numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BranchRef {
    Name(String),
    PullRequest(i64),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildHistoryEntry {
    pub build_id: i64,
    pub class: i16,
    pub internal: i64,
    pub date: i64,
    pub resource_id: i64,
    pub branch: BranchRef,
    pub sha: String,
    pub cause: serde_json::Value,
    pub main: Option<String>,
    pub path: String,
    pub lint_count: i64,
    pub worst_lint: i32,
    pub virion_version: Option<String>,
    pub virion_api: Option<String>,
    pub virions: BTreeMap<String, String>,
    pub dl_size: u64,
}

/// Parse `name:version,name:version` into a map.
///
/// `None` (no dependencies recorded) yields an empty map. An entry without a
/// colon maps to an empty version.
pub fn parse_virions(raw: Option<&str>) -> BTreeMap<String, String> {
    let Some(raw) = raw else {
        return BTreeMap::new();
    };
    raw.split(',')
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((name, version)) => (name.to_string(), version.to_string()),
            None => (entry.to_string(), String::new()),
        })
        .collect()
}

fn decode_cause(build_id: i64, raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(build_id, error = %e, "build cause is not valid JSON");
        serde_json::Value::Null
    })
}

fn branch_ref(kind: BranchKind, raw: Option<String>) -> BranchRef {
    match kind {
        BranchKind::Dev => BranchRef::Name(raw.unwrap_or_default()),
        BranchKind::PullRequest => BranchRef::PullRequest(
            raw.and_then(|s| s.trim().parse().ok()).unwrap_or_default(),
        ),
    }
}

/// Shape a row into an entry, given the artifact size already resolved.
pub fn entry_from_row(kind: BranchKind, row: BuildHistoryRow, dl_size: u64) -> BuildHistoryEntry {
    BuildHistoryEntry {
        build_id: row.build_id,
        class: row.class,
        internal: row.internal,
        date: row.date,
        resource_id: row.resource_id,
        branch: branch_ref(kind, row.branch),
        sha: row.sha,
        cause: decode_cause(row.build_id, &row.cause),
        main: row.main,
        path: row.path,
        lint_count: row.lint_count.unwrap_or(0),
        worst_lint: row.worst_lint.unwrap_or(0),
        virion_version: row.virion_version,
        virion_api: row.virion_api,
        virions: parse_virions(row.libs.as_deref()),
        dl_size,
    }
}

/// Load one page of build history, newest first.
pub async fn build_history(
    db: &Database,
    resources: &ResourceStore,
    request: &HistoryRequest,
) -> Result<Vec<BuildHistoryEntry>, ApiError> {
    let rows = db
        .get_build_history(
            request.project_id,
            request.kind,
            &request.branch,
            request.cursor.as_raw(),
            request.count,
        )
        .await?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let dl_size = resources.artifact_size(row.resource_id).await?;
        entries.push(entry_from_row(request.kind, row, dl_size));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(count: &str, lt: &str) -> HistoryParams {
        HistoryParams {
            project_id: Some("7".into()),
            branch: Some("master".into()),
            pr: None,
            count: Some(count.into()),
            lt: Some(lt.into()),
        }
    }

    fn row(build_id: i64) -> BuildHistoryRow {
        BuildHistoryRow {
            build_id,
            class: 1,
            internal: build_id,
            date: 1_500_000_000,
            resource_id: 900 + build_id,
            branch: Some("master".into()),
            sha: "abc123".into(),
            cause: r#"{"name":"push","prNumber":12}"#.into(),
            main: Some("vendor\\Plugin\\Main".into()),
            path: "".into(),
            lint_count: None,
            worst_lint: None,
            virion_version: None,
            virion_api: None,
            libs: None,
        }
    }

    #[test]
    fn valid_request_parses() {
        let req = HistoryRequest::from_params(&params("20", "-1")).unwrap();
        assert_eq!(req.project_id, 7);
        assert_eq!(req.kind, BranchKind::Dev);
        assert_eq!(req.count, 20);
        assert_eq!(req.cursor, HistoryCursor::Newest);
    }

    #[test]
    fn pr_flag_presence_selects_pull_requests() {
        let mut p = params("5", "30");
        p.pr = Some(String::new());
        let req = HistoryRequest::from_params(&p).unwrap();
        assert_eq!(req.kind, BranchKind::PullRequest);
        assert_eq!(req.kind.build_class(), BuildClass::Pr);
        assert_eq!(req.cursor, HistoryCursor::Before(30));
    }

    #[test]
    fn non_positive_count_is_rejected() {
        for count in ["0", "-3", "abc", ""] {
            let err = HistoryRequest::from_params(&params(count, "-1")).unwrap_err();
            assert_eq!(err.to_string(), "count must be a positive integer");
        }
    }

    #[test]
    fn zero_or_below_minus_one_cursor_is_rejected() {
        for lt in ["0", "-2", "-100", "x"] {
            let err = HistoryRequest::from_params(&params("10", lt)).unwrap_err();
            assert_eq!(err.to_string(), "end must be -1 or positive integer");
        }
    }

    #[test]
    fn virions_parse_into_map() {
        let map = parse_virions(Some("foo:1.0,bar:2.3"));
        assert_eq!(map.len(), 2);
        assert_eq!(map["foo"], "1.0");
        assert_eq!(map["bar"], "2.3");
    }

    #[test]
    fn absent_virions_give_empty_map() {
        assert!(parse_virions(None).is_empty());
        assert!(parse_virions(Some("")).is_empty());
    }

    #[test]
    fn virion_version_may_contain_colon() {
        let map = parse_virions(Some("libasync:1.0.0:rc1"));
        assert_eq!(map["libasync"], "1.0.0:rc1");
    }

    #[test]
    fn entry_defaults_lint_and_decodes_cause() {
        let entry = entry_from_row(BranchKind::Dev, row(3), 4096);
        assert_eq!(entry.lint_count, 0);
        assert_eq!(entry.worst_lint, 0);
        assert_eq!(entry.cause["name"], "push");
        assert_eq!(entry.branch, BranchRef::Name("master".into()));
        assert_eq!(entry.dl_size, 4096);
    }

    #[test]
    fn pr_entries_expose_numeric_branch() {
        let mut r = row(4);
        r.branch = Some("12".into());
        let entry = entry_from_row(BranchKind::PullRequest, r, 1);
        assert_eq!(entry.branch, BranchRef::PullRequest(12));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["branch"], 12);
        assert_eq!(json["buildId"], 4);
        assert!(json.get("dlSize").is_some());
    }

    #[test]
    fn malformed_cause_becomes_null() {
        let mut r = row(5);
        r.cause = "{not json".into();
        let entry = entry_from_row(BranchKind::Dev, r, 0);
        assert!(entry.cause.is_null());
    }
}
