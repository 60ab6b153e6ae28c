use axum::extract::{Path, State};
use axum::Json;

use crate::error::ApiResult;

use super::models::{HealthModel, RoomModel, RoomSettings};
use super::state::AppState;

pub async fn create_room(State(state): State<AppState>) -> Json<RoomModel> {
    let room = state.repository.create().await;
    Json(RoomModel {
        room_id: room.room_id.clone(),
        events: Vec::new(),
        settings: RoomSettings::from_config(&state.config),
    })
}

pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> ApiResult<Json<RoomModel>> {
    let room = state.repository.get(&room_id).await?;
    let events = room.events_from(0).await;
    Ok(Json(RoomModel {
        room_id: room.room_id.clone(),
        events,
        settings: RoomSettings::from_config(&state.config),
    }))
}

pub async fn health() -> Json<HealthModel> {
    Json(HealthModel { status: "ok" })
}
