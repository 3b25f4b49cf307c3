//! `GET /api/v1/ws/chat` upgrade handler.

use axum::Json;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{debug, warn};

use super::session::serve_socket;
use crate::server::AppState;

/// Resolve identity, enforce the connection cap, then upgrade.
///
/// Checks run in that order, so an anonymous request is refused with `401`
/// even when it also lacks upgrade headers. A hub that has shut down refuses
/// every upgrade with `503`.
pub async fn ws_chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let identity = match state.identity.resolve(&headers) {
        Ok(identity) => identity,
        Err(rejection) => {
            debug!(code = rejection.code(), "upgrade refused: no identity");
            return rejection.into_response();
        }
    };

    let max = state.config.max_connections;
    let live = match state.hub.stats().await {
        Ok(stats) => stats.total_connections,
        Err(err) => {
            debug!(error = %err, user_id = %identity.user_id, "upgrade refused: hub closed");
            let body = json!({ "error": err.to_string(), "code": "HUB_CLOSED" });
            return (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
        }
    };
    if live >= max {
        warn!(live, max, user_id = %identity.user_id, "connection limit reached");
        let body = json!({ "error": "connection limit reached", "code": "CAPACITY" });
        return (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            debug!(error = %rejection, "upgrade refused");
            return rejection.into_response();
        }
    };

    let policy = state.config.keepalive;
    let hub = state.hub.clone();
    ws.max_message_size(policy.max_message_size)
        .max_frame_size(policy.max_message_size)
        .on_failed_upgrade(|err| warn!(error = %err, "websocket upgrade failed"))
        .on_upgrade(move |socket| serve_socket(socket, hub, identity, policy))
}
