use std::time::SystemTime;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::{
    dao::{
        models::{
            GameEntity, NameEntryEntity, PlayerEntity, PlayerRecordEntity, StoryEntryEntity,
        },
        storage::{StorageError, StorageResult},
    },
    state::{game::normalize_name, state_machine::GamePhase},
};

/// Everything stored for one game. Players are kept in join order.
#[derive(Debug, Clone)]
pub(super) struct GameRecord {
    pub(super) game: GameEntity,
    pub(super) players: IndexMap<Uuid, PlayerRecordEntity>,
}

impl GameRecord {
    pub(super) fn new(game: GameEntity) -> Self {
        Self {
            game,
            players: IndexMap::new(),
        }
    }

    pub(super) fn players_with_entries(&self) -> Vec<PlayerRecordEntity> {
        self.players.values().cloned().collect()
    }

    pub(super) fn player(&self, id: Uuid) -> StorageResult<&PlayerRecordEntity> {
        self.players
            .get(&id)
            .ok_or_else(|| StorageError::not_found("player", id))
    }

    fn player_mut(&mut self, id: Uuid) -> StorageResult<&mut PlayerRecordEntity> {
        self.players
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("player", id))
    }

    fn ensure_nickname_free(&self, nickname: &str, exclude: Option<Uuid>) -> StorageResult<()> {
        let folded = normalize_name(nickname);
        let taken = self.players.values().any(|record| {
            Some(record.player.id) != exclude && normalize_name(&record.player.nickname) == folded
        });
        if taken {
            return Err(StorageError::Duplicate {
                field: "nickname",
                value: nickname.to_string(),
            });
        }
        Ok(())
    }

    pub(super) fn create_player(
        &mut self,
        key: u64,
        id: Uuid,
        nickname: String,
        roles: Vec<String>,
    ) -> StorageResult<PlayerEntity> {
        self.ensure_nickname_free(&nickname, None)?;
        let player = PlayerEntity {
            key,
            id,
            game_key: self.game.key,
            game_id: self.game.id,
            nickname,
            roles,
            joined_at: SystemTime::now(),
        };
        self.players.insert(id, player.clone().into());
        Ok(player)
    }

    pub(super) fn update_player(&mut self, id: Uuid, nickname: String) -> StorageResult<PlayerEntity> {
        self.ensure_nickname_free(&nickname, Some(id))?;
        let record = self.player_mut(id)?;
        record.player.nickname = nickname;
        Ok(record.player.clone())
    }

    pub(super) fn upsert_name_entry(
        &mut self,
        player_id: Uuid,
        name: String,
        order_if_new: i32,
    ) -> StorageResult<NameEntryEntity> {
        let normalized = normalize_name(&name);
        let collides = self.players.values().any(|record| {
            record.player.id != player_id
                && record
                    .name_entry
                    .as_ref()
                    .is_some_and(|entry| entry.normalized == normalized)
        });
        if collides {
            return Err(StorageError::Duplicate {
                field: "name",
                value: name,
            });
        }

        let game_key = self.game.key;
        let record = self.player_mut(player_id)?;
        let player_key = record.player.key;
        if let Some(entry) = record.name_entry.as_mut() {
            entry.name = name;
            entry.normalized = normalized;
            return Ok(entry.clone());
        }

        let entry = NameEntryEntity {
            game_key,
            player_key,
            name,
            normalized,
            order: order_if_new,
        };
        record.name_entry = Some(entry.clone());
        Ok(entry)
    }

    pub(super) fn append_story_value(
        &mut self,
        player_id: Uuid,
        value: String,
    ) -> StorageResult<StoryEntryEntity> {
        let game_key = self.game.key;
        let record = self.player_mut(player_id)?;
        let player_key = record.player.key;
        let entry = record.story_entry.get_or_insert_with(|| StoryEntryEntity {
            game_key,
            player_key,
            values: Vec::new(),
            story: None,
        });
        entry.values.push(value);
        Ok(entry.clone())
    }

    pub(super) fn set_stories(&mut self, stories: Vec<(Uuid, String)>) {
        let game_key = self.game.key;
        for (player_id, story) in stories {
            let Some(record) = self.players.get_mut(&player_id) else {
                continue;
            };
            let player_key = record.player.key;
            let entry = record.story_entry.get_or_insert_with(|| StoryEntryEntity {
                game_key,
                player_key,
                values: Vec::new(),
                story: None,
            });
            entry.story = Some(story);
        }
    }

    /// Swap the phase, refusing regressions and stale expectations.
    pub(super) fn update_phase(
        &mut self,
        phase: GamePhase,
        expected: GamePhase,
    ) -> StorageResult<GameEntity> {
        let current = self.game.phase;
        if current != expected {
            return Err(StorageError::conflict(format!(
                "game `{}` is in {current:?}, expected {expected:?}",
                self.game.id
            )));
        }
        if phase < current {
            return Err(StorageError::conflict(format!(
                "game `{}` cannot move back from {current:?} to {phase:?}",
                self.game.id
            )));
        }
        self.game.phase = phase;
        self.game.updated_at = SystemTime::now();
        Ok(self.game.clone())
    }
}
