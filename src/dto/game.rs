use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{format_system_time, phase::VisibleGamePhase, validation::validate_not_blank},
    services::aggregation::{self, Progress},
    state::game::{Game, GameType, Player, PlayerWithEntry},
};

/// Payload used to create a new game.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    pub game_type: GameType,
}

/// Public view of a game.
#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GameSummary {
    pub id: Uuid,
    /// Join code, upper-case.
    pub code: String,
    pub game_type: GameType,
    pub phase: VisibleGamePhase,
    pub players: usize,
    /// Players done with the contribution the current phase asks for.
    pub submitted: usize,
    /// STORY only: rounds every player has completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<usize>,
    /// STORY only: rounds in a full game.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rounds: Option<usize>,
    pub created_at: String,
}

impl GameSummary {
    /// Summarise `game` with progress counters computed from `players`.
    pub fn new(game: &Game, players: &[PlayerWithEntry], rounds: usize) -> Self {
        let Progress { submitted, round } =
            aggregation::progress(game.game_type, players, rounds);
        Self {
            id: game.id,
            code: game.code.clone(),
            game_type: game.game_type,
            phase: game.phase.into(),
            players: players.len(),
            submitted,
            round,
            rounds: matches!(game.game_type, GameType::Story).then_some(rounds),
            created_at: format_system_time(game.created_at),
        }
    }
}

/// Returned to the creator of a game (or of a recreated one).
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedGameResponse {
    pub game: GameSummary,
    /// Game-level credential. The first player joining with it becomes host.
    pub token: String,
}

/// Payload used to join a game.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinGameRequest {
    #[validate(length(min = 1, max = 32), custom(function = "validate_not_blank"))]
    pub nickname: String,
}

/// Payload used to rename the calling player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdatePlayerRequest {
    #[validate(length(min = 1, max = 32), custom(function = "validate_not_blank"))]
    pub nickname: String,
}

/// Public view of a player.
#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub id: Uuid,
    pub game_id: Uuid,
    pub nickname: String,
    pub roles: Vec<String>,
}

impl From<Player> for PlayerSummary {
    fn from(player: Player) -> Self {
        Self {
            id: player.id,
            game_id: player.game_id,
            nickname: player.nickname,
            roles: player.roles,
        }
    }
}

/// Returned to a player on join.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinGameResponse {
    pub player: PlayerSummary,
    /// Player credential to send as `Authorization: Bearer` and in the WebSocket
    /// identification frame.
    pub token: String,
}

/// Player entry in the roster, with progress but never the submitted values.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProgress {
    pub id: Uuid,
    pub nickname: String,
    pub roles: Vec<String>,
    /// NAME: whether a name was submitted.
    pub name_submitted: bool,
    /// STORY: rounds written so far.
    pub rounds_submitted: usize,
}

impl From<&PlayerWithEntry> for PlayerProgress {
    fn from(value: &PlayerWithEntry) -> Self {
        Self {
            id: value.player.id,
            nickname: value.player.nickname.clone(),
            roles: value.player.roles.clone(),
            name_submitted: value.name_entry().is_some(),
            rounds_submitted: value.rounds_submitted(),
        }
    }
}

/// One revealed name.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RevealedName {
    pub name: String,
    pub order: i32,
}

/// Finished story of one player.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoryArchiveEntry {
    pub player_id: Uuid,
    pub nickname: String,
    pub story: String,
}
