use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::Deserialize;
use sessionlog_store::Event;
use std::sync::Arc;

use crate::error::AppError;
use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
pub struct EventPage {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

/// GET /sessions: ids of every session that has at least one event.
pub async fn list_sessions(State(state): State<SharedState>) -> Json<Vec<String>> {
    Json(state.store.list_sessions())
}

/// GET /sessions/{session_id}/events: events oldest first.
///
/// An unknown session yields an empty array, never a 404. `offset` and
/// `limit` select a window of the log when given.
pub async fn list_session_events(
    State(state): State<SharedState>,
    session_id: Result<Path<String>, PathRejection>,
    page: Result<Query<EventPage>, QueryRejection>,
) -> Result<Json<Vec<Arc<Event>>>, AppError> {
    let Path(session_id) = session_id?;
    let Query(page) = page?;

    let events = match (page.offset, page.limit) {
        (None, None) => state.store.list_events(&session_id),
        (offset, limit) => state.store.list_events_page(
            &session_id,
            offset.unwrap_or(0),
            limit.unwrap_or(usize::MAX),
        ),
    };

    Ok(Json(events))
}
