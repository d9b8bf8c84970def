pub mod event_routes;
pub mod session_routes;

use crate::error::AppError;
use crate::state::SharedState;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub fn app(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let timeout = TimeoutLayer::new(state.config.request_timeout());
    let body_limit = DefaultBodyLimit::max(state.config.max_body_bytes);

    Router::new()
        .route("/health", get(health_handler))
        // Sessions
        .route("/sessions", get(session_routes::list_sessions))
        .route(
            "/sessions/{session_id}/events",
            get(session_routes::list_session_events),
        )
        // Events
        .route("/events", post(event_routes::append_event))
        .fallback(not_found)
        .layer(body_limit)
        .layer(timeout)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

async fn health_handler(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let stats = state.store.stats();
    Json(serde_json::json!({
        "status": "ok",
        "service": "sessionlog",
        "journal": state.store.journal_name(),
        "journal_healthy": state.store.journal_healthy(),
        "sessions": stats.sessions,
        "events": stats.events,
    }))
}

async fn not_found() -> AppError {
    AppError::NotFound("no such route".into())
}
