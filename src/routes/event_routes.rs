use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use sessionlog_store::Event;
use std::sync::Arc;

use crate::error::AppError;
use crate::state::SharedState;

/// Body of `POST /events`. The payload may be any JSON value, including
/// `null`, but the key must be present.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct AppendEvent {
    pub session_id: String,
    pub payload: Value,
}

/// Field layout of [`AppendEvent`]. Going through a map first keeps a JSON
/// array from filling the fields positionally.
#[derive(Deserialize)]
struct AppendEventFields {
    session_id: String,
    payload: Value,
}

impl TryFrom<Map<String, Value>> for AppendEvent {
    type Error = serde_json::Error;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let AppendEventFields {
            session_id,
            payload,
        } = serde_json::from_value(Value::Object(fields))?;
        Ok(Self {
            session_id,
            payload,
        })
    }
}

/// POST /events: append an event, creating the session on first use.
pub async fn append_event(
    State(state): State<SharedState>,
    body: Result<Json<AppendEvent>, JsonRejection>,
) -> Result<(StatusCode, Json<Arc<Event>>), AppError> {
    let Json(AppendEvent {
        session_id,
        payload,
    }) = body?;

    // Journal writes and retry back-off block, keep them off the async workers.
    let store = Arc::clone(&state.store);
    let event = tokio::task::spawn_blocking(move || {
        store.create_or_append_event(&session_id, payload)
    })
    .await
    .map_err(|e| anyhow::anyhow!("append task failed: {e}"))??;

    Ok((StatusCode::CREATED, Json(event)))
}
