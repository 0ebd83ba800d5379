use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dto::{
        events::{GameRecreatedEvent, PhaseChangedEvent, PokeEvent, ServerEvent},
        game::GameSummary,
    },
    state::{Room, SharedState, game::Game},
};

/// Game moved to a new phase.
pub const EVENT_PHASE_CHANGED: &str = "phase.changed";
/// Roster or progress counters changed.
pub const EVENT_GAME_UPDATED: &str = "game.updated";
/// Host started a follow-up game.
pub const EVENT_GAME_RECREATED: &str = "game.recreated";
/// Another player nudged the recipient.
pub const EVENT_POKE: &str = "poke";

/// Broadcast a phase change to every connection of the game.
pub fn broadcast_phase_changed(state: &SharedState, game: &Game) {
    let payload = PhaseChangedEvent {
        game_id: game.id,
        new_phase: game.phase.into(),
    };
    send_room_event(state, Room::Game(game.id), EVENT_PHASE_CHANGED, &payload);
}

/// Broadcast refreshed progress counters after a join, rename or submission.
pub fn broadcast_game_updated(state: &SharedState, summary: &GameSummary) {
    send_room_event(state, Room::Game(summary.id), EVENT_GAME_UPDATED, summary);
}

/// Tell the players of `game_id` where the follow-up game lives.
pub fn broadcast_game_recreated(state: &SharedState, game_id: Uuid, new_game: &Game) {
    let payload = GameRecreatedEvent {
        game_id,
        new_game_id: new_game.id,
        code: new_game.code.clone(),
    };
    send_room_event(state, Room::Game(game_id), EVENT_GAME_RECREATED, &payload);
}

/// Deliver a poke to the target player's connections. Self-pokes are dropped.
/// Returns whether anything was sent.
pub fn send_poke(state: &SharedState, from: Uuid, to: Uuid, nickname: &str) -> bool {
    if from == to {
        debug!(player_id = %from, "ignoring self-poke");
        return false;
    }
    let payload = PokeEvent {
        from_player_id: from,
        to_player_id: to,
        nickname: nickname.to_string(),
    };
    send_room_event(state, Room::Player(to), EVENT_POKE, &payload) > 0
}

fn send_room_event(state: &SharedState, room: Room, event: &str, payload: &impl Serialize) -> usize {
    match ServerEvent::json(event, payload) {
        Ok(message) => {
            let delivered = state.rooms().broadcast(room, &message);
            debug!(%room, event, delivered, "room event sent");
            delivered
        }
        Err(err) => {
            warn!(event, error = %err, "failed to serialize room event payload");
            0
        }
    }
}
