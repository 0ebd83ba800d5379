use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::AppConfig,
    dto::{phase::VisibleGamePhase, validation::validate_not_blank},
    state::game::{Entry, NameEntry, StoryEntry},
};

/// Name submitted by a player of a NAME game.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitNameRequest {
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub name: String,
}

/// One round value submitted by a player of a STORY game.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitStoryRequest {
    #[validate(length(min = 1, max = 280), custom(function = "validate_not_blank"))]
    pub value: String,
}

/// Prompt for the round a player is expected to write next.
#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HintDto {
    /// Zero-based round index.
    pub round: usize,
    pub prompt: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NameEntryDto {
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoryEntryDto {
    /// Values written so far, in round order.
    pub values: Vec<String>,
    pub rounds: usize,
    /// What the player is asked for next; absent once every round is written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_hint: Option<HintDto>,
    /// Assembled story, once the game reached READ.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story: Option<String>,
}

/// A player's own entry, shaped by the game type.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum EntryDto {
    Name(NameEntryDto),
    Story(StoryEntryDto),
}

impl EntryDto {
    pub fn from_entry(entry: Entry, config: &AppConfig) -> Self {
        match entry {
            Entry::Name(entry) => Self::from_name(entry),
            Entry::Story(entry) => Self::from_story(entry, config),
        }
    }

    pub fn from_name(entry: NameEntry) -> Self {
        EntryDto::Name(NameEntryDto { name: entry.name })
    }

    pub fn from_story(entry: StoryEntry, config: &AppConfig) -> Self {
        EntryDto::Story(StoryEntryDto {
            next_hint: next_hint(entry.values.len(), config),
            rounds: config.rounds(),
            values: entry.values,
            story: entry.story,
        })
    }
}

/// Hint for the round after `written` values, if there is one.
pub fn next_hint(written: usize, config: &AppConfig) -> Option<HintDto> {
    config.hint(written).map(|hint| HintDto {
        round: written,
        prompt: hint.prompt.clone(),
    })
}

/// Response to entry reads and submissions.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntryResponse {
    pub game_id: Uuid,
    pub player_id: Uuid,
    /// Phase of the game after the request, including any transition it caused.
    pub phase: VisibleGamePhase,
    /// NAME: absent until a name was submitted. STORY: always present, so the first
    /// hint is available before anything was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<EntryDto>,
}
