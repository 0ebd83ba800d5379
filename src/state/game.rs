use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{
        GameEntity, NameEntryEntity, PlayerEntity, PlayerRecordEntity, StoryEntryEntity,
    },
    state::state_machine::GamePhase,
};

/// Role carried by the player who created the current incarnation of a game.
pub const HOST_ROLE: &str = "host";

/// Kind of party game, selecting which entry shape players submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum GameType {
    /// Every player submits one name; the names are revealed in shuffled order.
    Name,
    /// Players write one value per round; stories are assembled round-robin.
    Story,
}

/// Runtime view of a game, stripped of storage keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    /// External identifier.
    pub id: Uuid,
    /// Short join code, stored upper-case.
    pub code: String,
    /// Kind of game.
    pub game_type: GameType,
    /// Current lifecycle phase.
    pub phase: GamePhase,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last phase change.
    pub updated_at: SystemTime,
}

/// Player registered in a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// External identifier.
    pub id: Uuid,
    /// Game the player belongs to.
    pub game_id: Uuid,
    /// Display name.
    pub nickname: String,
    /// Roles granted at join time (e.g. [`HOST_ROLE`]).
    pub roles: Vec<String>,
}

impl Player {
    /// Whether the player created this incarnation of the game.
    pub fn is_host(&self) -> bool {
        self.roles.iter().any(|role| role == HOST_ROLE)
    }
}

/// Name submitted by one player of a NAME game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameEntry {
    /// Name as typed.
    pub name: String,
    /// Trimmed, case-folded form used for duplicate detection.
    pub normalized: String,
    /// Random sort key drawn once when the entry was first created.
    pub order: i32,
}

/// Round values submitted by one player of a STORY game.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoryEntry {
    /// One value per completed round, in round order.
    pub values: Vec<String>,
    /// Assembled story, present once the game reached READ.
    pub story: Option<String>,
}

/// Entry owned by a player, shaped by the game type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// Entry of a NAME game.
    Name(NameEntry),
    /// Entry of a STORY game.
    Story(StoryEntry),
}

/// Player together with whatever entry they have submitted so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerWithEntry {
    /// The player.
    pub player: Player,
    /// Entry matching the game type, if any.
    pub entry: Option<Entry>,
}

impl PlayerWithEntry {
    /// Name entry, if this player submitted one.
    pub fn name_entry(&self) -> Option<&NameEntry> {
        match &self.entry {
            Some(Entry::Name(entry)) => Some(entry),
            _ => None,
        }
    }

    /// Story entry, if this player submitted at least one round.
    pub fn story_entry(&self) -> Option<&StoryEntry> {
        match &self.entry {
            Some(Entry::Story(entry)) => Some(entry),
            _ => None,
        }
    }

    /// Number of story rounds submitted; zero when no story entry exists.
    pub fn rounds_submitted(&self) -> usize {
        self.story_entry().map_or(0, |entry| entry.values.len())
    }
}

/// Normalise a name for duplicate detection.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Normalise a join code typed by a human.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

impl From<GameEntity> for Game {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id,
            code: value.code,
            game_type: value.game_type,
            phase: value.phase,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<PlayerEntity> for Player {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            game_id: value.game_id,
            nickname: value.nickname,
            roles: value.roles,
        }
    }
}

impl From<NameEntryEntity> for NameEntry {
    fn from(value: NameEntryEntity) -> Self {
        Self {
            name: value.name,
            normalized: value.normalized,
            order: value.order,
        }
    }
}

impl From<StoryEntryEntity> for StoryEntry {
    fn from(value: StoryEntryEntity) -> Self {
        Self {
            values: value.values,
            story: value.story,
        }
    }
}

impl From<PlayerRecordEntity> for PlayerWithEntry {
    fn from(value: PlayerRecordEntity) -> Self {
        let entry = match (value.name_entry, value.story_entry) {
            (Some(name), _) => Some(Entry::Name(name.into())),
            (None, Some(story)) => Some(Entry::Story(story.into())),
            (None, None) => None,
        };
        Self {
            player: value.player.into(),
            entry,
        }
    }
}
