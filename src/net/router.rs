use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{create_room, get_room, health};
use super::state::AppState;
use super::ws::upgrade;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/resource/room", axum::routing::post(create_room))
        .route("/resource/room/{room_id}", get(get_room))
        .route("/resource/room/{room_id}/ws", get(upgrade))
        .route("/resource/health", get(health))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
