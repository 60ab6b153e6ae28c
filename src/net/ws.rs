use std::time::Duration;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::error::{ApiError, RoomError};
use crate::wire::WsMessage;

use super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    offset: usize,
}

/// Rejects the upgrade outright for a room id that exists neither in
/// memory nor on disk, rather than upgrading and letting the session
/// materialize a phantom room. Room creation only ever happens through
/// `POST /resource/room`.
pub async fn upgrade(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    if !state.repository.exists(&room_id).await {
        return ApiError::RoomNotFound(room_id).into_response();
    }
    ws.on_upgrade(move |socket| run_session(socket, room_id, query.offset, state))
}

/// Drives one site's connection from transport accept to teardown. Every
/// exit path falls through to the bottom, which disconnects the site and
/// aborts its heartbeat task regardless of which branch returned early.
async fn run_session(
    socket: axum::extract::ws::WebSocket,
    room_id: String,
    offset: usize,
    state: AppState,
) {
    let room = match state.repository.claim(&room_id).await {
        Ok(room) => room,
        Err(e) => {
            warn!(room_id = %room_id, error = %e, "room vanished before session could start");
            return;
        }
    };
    let (site, mut receiver, site_id) = match room.connect_new_site(socket, offset).await {
        Ok(parts) => parts,
        Err(e) => {
            warn!(room_id = %room_id, error = %e, "failed to connect site");
            return;
        }
    };

    if let Err(e) = receiver.recv_hello().await {
        warn!(room_id = %room_id, site_id, error = %e, "handshake failed");
        room.disconnect(site_id).await;
        return;
    }

    if site.send(&WsMessage::set_site_id(site_id)).await.is_err() {
        room.disconnect(site_id).await;
        return;
    }

    let heartbeat = site.spawn_heartbeat(Duration::from_secs(state.config.heartbit_interval));
    info!(room_id = %room_id, site_id, "session established");

    loop {
        let msg = match receiver.receive().await {
            Ok(msg) => msg,
            Err(RoomError::Disconnected) => break,
            Err(e) => {
                warn!(room_id = %room_id, site_id, error = %e, "session teardown");
                break;
            }
        };

        let has_events = msg.crdt_events.is_some();
        let has_presence = msg.site_presence.is_some();
        if !has_events && !has_presence {
            warn!(room_id = %room_id, site_id, "protocol violation: empty client frame");
            break;
        }

        if let Some(events) = msg.crdt_events {
            match room.apply_events(events, site_id).await {
                Ok(()) => {
                    state.repository.try_compact(&room_id).await;
                }
                Err(RoomError::LogFull { current, incoming, limit }) => {
                    error!(
                        room_id = %room_id,
                        site_id,
                        current,
                        incoming,
                        limit,
                        "event log full"
                    );
                    break;
                }
                Err(e) => {
                    warn!(room_id = %room_id, site_id, error = %e, "apply_events failed");
                    if e.is_fatal_to_session() {
                        break;
                    }
                }
            }
        }
        if let Some(presence) = msg.site_presence {
            if let Err(e) = room.apply_presence(presence, site_id).await {
                warn!(room_id = %room_id, site_id, error = %e, "apply_presence failed");
                if e.is_fatal_to_session() {
                    break;
                }
            }
        }
    }

    heartbeat.abort();
    room.disconnect(site_id).await;
    info!(room_id = %room_id, site_id, "session ended");
}
