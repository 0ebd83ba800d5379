use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::{game::GameType, state_machine::GamePhase};

/// Game row. `key` is the store's internal identifier and never leaves the dao layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Internal primary key.
    pub key: u64,
    /// External identifier.
    pub id: Uuid,
    /// Upper-case join code, unique among stored games.
    pub code: String,
    /// Kind of game.
    pub game_type: GameType,
    /// Current lifecycle phase.
    pub phase: GamePhase,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time the game row was updated.
    pub updated_at: SystemTime,
}

/// Player row, many-to-one with [`GameEntity`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Internal primary key.
    pub key: u64,
    /// External identifier.
    pub id: Uuid,
    /// Internal key of the owning game.
    pub game_key: u64,
    /// External identifier of the owning game.
    pub game_id: Uuid,
    /// Display name.
    pub nickname: String,
    /// Roles granted when the player joined.
    pub roles: Vec<String>,
    /// Join timestamp.
    pub joined_at: SystemTime,
}

/// Name entry row, unique per (game, player).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NameEntryEntity {
    /// Internal key of the owning game.
    pub game_key: u64,
    /// Internal key of the owning player.
    pub player_key: u64,
    /// Name as typed.
    pub name: String,
    /// Trimmed, lower-cased name; unique per game.
    pub normalized: String,
    /// Random sort key drawn on insert and kept across updates.
    pub order: i32,
}

/// Story entry row, unique per (game, player).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoryEntryEntity {
    /// Internal key of the owning game.
    pub game_key: u64,
    /// Internal key of the owning player.
    pub player_key: u64,
    /// Submitted round values, in round order.
    pub values: Vec<String>,
    /// Assembled story, written once when the game completes.
    pub story: Option<String>,
}

/// Player joined with the entries they own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerRecordEntity {
    /// Player row.
    pub player: PlayerEntity,
    /// Name entry, for NAME games.
    pub name_entry: Option<NameEntryEntity>,
    /// Story entry, for STORY games.
    pub story_entry: Option<StoryEntryEntity>,
}

impl From<PlayerEntity> for PlayerRecordEntity {
    fn from(player: PlayerEntity) -> Self {
        Self {
            player,
            name_entry: None,
            story_entry: None,
        }
    }
}
