use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::GamePhase;

/// Game phase as exposed to clients (REST and WebSocket).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum VisibleGamePhase {
    /// Players are joining.
    Join,
    /// Entries are being submitted.
    Play,
    /// Results are visible.
    Read,
    /// Results hidden; the game is over.
    End,
}

impl From<GamePhase> for VisibleGamePhase {
    fn from(value: GamePhase) -> Self {
        match value {
            GamePhase::Join => VisibleGamePhase::Join,
            GamePhase::Play => VisibleGamePhase::Play,
            GamePhase::Read => VisibleGamePhase::Read,
            GamePhase::End => VisibleGamePhase::End,
        }
    }
}
