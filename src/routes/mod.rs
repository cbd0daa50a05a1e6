mod events;
mod ws;

use axum::{Router, routing::{get, post}};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", post(events::post_event))
        .route("/users/{id}/feed", get(ws::user_feed))
        .route("/health", get(|| async { "ok" }))
}
