use axum::Router;

use crate::state::SharedState;

/// Swagger UI.
pub mod docs;
/// Game lifecycle, roster and results.
pub mod game;
/// Health check.
pub mod health;
/// Operations on the calling player.
pub mod player;
/// Event stream upgrade.
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(websocket::router())
        .merge(game::router())
        .merge(player::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
