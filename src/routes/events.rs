use axum::{Json, debug_handler, extract::State};
use serde_json::{Value, json};

use crate::{AppResult, Broker, error::RelayError, events::{self, InboundEvent}};

/// Handles one event to completion. Refusals were already reported to the
/// user, so only storage failures surface as an HTTP error.
#[debug_handler(state = crate::AppState)]
pub async fn post_event(State(broker): State<Broker>, Json(event): Json<InboundEvent>) -> AppResult<Json<Value>> {
    match events::handle(&broker, event).await {
        Ok(()) => Ok(Json(json!({ "ok": true }))),
        Err(err @ RelayError::Store(_)) => Err(err.into()),
        Err(err) => Ok(Json(json!({ "ok": true, "refused": err.to_string() }))),
    }
}
