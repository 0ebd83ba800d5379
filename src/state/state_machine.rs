use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::game::{Game, GameType};

/// Lifecycle phases of a game, in the only order they may be visited.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum GamePhase {
    /// Players join and may still rename themselves.
    Join,
    /// Players submit their entries.
    Play,
    /// Every entry is in; results are visible.
    Read,
    /// Results hidden by the host. Terminal.
    End,
}

/// Events that can be applied to a game's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// Host starts the game.
    Start,
    /// The completion predicate became true after a submission.
    RoundsCompleted,
    /// Host hides the results of a NAME game.
    HideResults,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied to a {game_type:?} game in {from:?}")]
pub struct InvalidTransition {
    /// The phase the game was in when the event was received.
    pub from: GamePhase,
    /// The event that cannot be applied from this phase.
    pub event: GameEvent,
    /// Kind of the game the event targeted.
    pub game_type: GameType,
}

/// A validated transition, ready to be swapped in by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Phase the game must still be in when the plan is applied.
    pub from: GamePhase,
    /// Phase the game moves to.
    pub to: GamePhase,
    /// Event that triggered this transition.
    pub event: GameEvent,
}

/// Per-game state machine. Holds no state beyond what the stored game already has;
/// the store applies plans with a compare-and-swap on `from`.
#[derive(Debug, Clone)]
pub struct GameStateMachine {
    game_type: GameType,
    phase: GamePhase,
}

impl GameStateMachine {
    /// Build the state machine for a loaded game.
    pub fn for_game(game: &Game) -> Self {
        Self {
            game_type: game.game_type,
            phase: game.phase,
        }
    }

    /// Validate that the event can be applied from the current phase.
    pub fn plan(&self, event: GameEvent) -> Result<Plan, InvalidTransition> {
        let to = self.compute_transition(event)?;
        Ok(Plan {
            from: self.phase,
            to,
            event,
        })
    }

    fn compute_transition(&self, event: GameEvent) -> Result<GamePhase, InvalidTransition> {
        let next = match (self.phase, event, self.game_type) {
            (GamePhase::Join, GameEvent::Start, _) => GamePhase::Play,
            (GamePhase::Play, GameEvent::RoundsCompleted, _) => GamePhase::Read,
            (GamePhase::Read, GameEvent::HideResults, GameType::Name) => GamePhase::End,
            (from, event, game_type) => {
                return Err(InvalidTransition {
                    from,
                    event,
                    game_type,
                });
            }
        };

        Ok(next)
    }
}
