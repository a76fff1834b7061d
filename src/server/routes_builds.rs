//! Build history endpoint. No login required.

use axum::extract::{Query, State};
use axum::Json;
use std::sync::Arc;

use super::AppState;
use crate::builds::{self, BuildHistoryEntry, HistoryParams, HistoryRequest};
use crate::error::ApiError;

pub(super) async fn handler_build_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<BuildHistoryEntry>>, ApiError> {
    let request = HistoryRequest::from_params(&params)?;
    let entries = builds::build_history(&state.db, &state.resources, &request).await?;
    Ok(Json(entries))
}
