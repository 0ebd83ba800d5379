use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::phase::VisibleGamePhase;

/// Frame pushed to WebSocket clients: an event name plus its JSON payload.
#[derive(Clone, Debug, Serialize)]
pub struct ServerEvent {
    /// Event name, e.g. `phase.changed`.
    pub event: String,
    /// Event payload.
    pub data: serde_json::Value,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the data field.
    pub fn json<T>(event: &str, payload: &T) -> serde_json::Result<Self>
    where
        T: Serialize,
    {
        Ok(Self {
            event: event.to_string(),
            data: serde_json::to_value(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Broadcast to the game room whenever the game changes phase.
pub struct PhaseChangedEvent {
    pub game_id: Uuid,
    pub new_phase: VisibleGamePhase,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Broadcast to the old game's room when the host spawns a follow-up game.
pub struct GameRecreatedEvent {
    pub game_id: Uuid,
    pub new_game_id: Uuid,
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Delivered to the target player's room.
pub struct PokeEvent {
    pub from_player_id: Uuid,
    pub to_player_id: Uuid,
    /// Nickname of the player who poked.
    pub nickname: String,
}
