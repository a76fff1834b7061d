//! Release state endpoint: delete, or move through the review lifecycle.

use axum::extract::{FromRequest, Request, State};
use axum::http::header;
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::middleware_auth::RequireSession;
use super::AppState;
use crate::error::ApiError;
use crate::release::lifecycle::{self, parse_integer};

/// Accepts both JSON and form-encoded bodies.
#[derive(Deserialize)]
pub(super) struct ReleaseStatePayload {
    #[serde(rename = "relId")]
    rel_id: Option<Value>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    state: Option<Value>,
}

impl<S: Send + Sync> FromRequest<S> for ReleaseStatePayload {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        if is_form {
            let Form(payload) = Form::<ReleaseStatePayload>::from_request(req, state).await?;
            Ok(payload)
        } else {
            let Json(payload) = Json::<ReleaseStatePayload>::from_request(req, state).await?;
            Ok(payload)
        }
    }
}

pub(super) async fn handler_release_state(
    State(state): State<Arc<AppState>>,
    RequireSession(actor): RequireSession,
    payload: ReleaseStatePayload,
) -> Result<Json<Value>, ApiError> {
    let release_id = parse_integer(payload.rel_id.as_ref())
        .ok_or_else(|| ApiError::bad_request("relId should be numeric"))?;
    let ctx = state.context(&actor);

    let new_state = match payload.action.as_deref() {
        Some("delete") => lifecycle::delete_release(&ctx, release_id).await?,
        None | Some("") | Some("state") => {
            lifecycle::transition_release(&ctx, release_id, payload.state.as_ref())
                .await?
                .as_i16() as i64
        }
        Some(other) => {
            return Err(ApiError::bad_request(format!("unknown action {:?}", other)));
        }
    };
    Ok(Json(serde_json::json!({ "state": new_state })))
}
