use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::SystemTime,
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::{self, BoxFuture, FutureExt};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use super::record::GameRecord;
use crate::{
    dao::{
        game_store::{GameStore, GameTransaction},
        models::{
            GameEntity, NameEntryEntity, PlayerEntity, PlayerRecordEntity, StoryEntryEntity,
        },
        storage::{StorageError, StorageResult},
    },
    state::{game::GameType, state_machine::GamePhase},
};

/// Game store kept in process memory. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryGameStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    games: DashMap<Uuid, Arc<Mutex<GameRecord>>>,
    codes: DashMap<String, Uuid>,
    /// Player id to owning game id.
    players: DashMap<Uuid, Uuid>,
    next_key: AtomicU64,
}

impl MemoryInner {
    fn next_key(&self) -> u64 {
        self.next_key.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn record(&self, game_id: Uuid) -> Option<Arc<Mutex<GameRecord>>> {
        self.games.get(&game_id).map(|entry| entry.value().clone())
    }
}

impl MemoryGameStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameStore for MemoryGameStore {
    fn create_game(
        &self,
        id: Uuid,
        code: String,
        game_type: GameType,
    ) -> BoxFuture<'static, StorageResult<GameEntity>> {
        let inner = self.inner.clone();
        async move {
            match inner.codes.entry(code.clone()) {
                Entry::Occupied(_) => {
                    return Err(StorageError::Duplicate {
                        field: "code",
                        value: code,
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
            }

            let now = SystemTime::now();
            let game = GameEntity {
                key: inner.next_key(),
                id,
                code,
                game_type,
                phase: GamePhase::Join,
                created_at: now,
                updated_at: now,
            };
            inner
                .games
                .insert(id, Arc::new(Mutex::new(GameRecord::new(game.clone()))));
            Ok(game)
        }
        .boxed()
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let inner = self.inner.clone();
        async move {
            let Some(record) = inner.record(id) else {
                return Ok(None);
            };
            let guard = record.lock().await;
            Ok(Some(guard.game.clone()))
        }
        .boxed()
    }

    fn find_game_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let Some(id) = self.inner.codes.get(&code).map(|entry| *entry.value()) else {
            return future::ready(Ok(None)).boxed();
        };
        self.find_game(id)
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let inner = self.inner.clone();
        async move {
            let Some(game_id) = inner.players.get(&id).map(|entry| *entry.value()) else {
                return Ok(None);
            };
            let Some(record) = inner.record(game_id) else {
                return Ok(None);
            };
            let guard = record.lock().await;
            Ok(guard.players.get(&id).map(|record| record.player.clone()))
        }
        .boxed()
    }

    fn list_players_with_entries(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerRecordEntity>>> {
        let inner = self.inner.clone();
        async move {
            let record = inner
                .record(game_id)
                .ok_or_else(|| StorageError::not_found("game", game_id))?;
            let guard = record.lock().await;
            Ok(guard.players_with_entries())
        }
        .boxed()
    }

    fn begin(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<Box<dyn GameTransaction>>> {
        let inner = self.inner.clone();
        async move {
            let record = inner
                .record(game_id)
                .ok_or_else(|| StorageError::not_found("game", game_id))?;
            let guard = record.lock_owned().await;
            let working = guard.clone();
            debug!(game_id = %game_id, "transaction opened");
            Ok(Box::new(MemoryTransaction {
                inner,
                guard,
                working,
                created_players: Vec::new(),
            }) as Box<dyn GameTransaction>)
        }
        .boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        future::ready(Ok(())).boxed()
    }
}

/// Holds the game's lock for its whole lifetime and works on a private copy that
/// only replaces the stored record on commit.
struct MemoryTransaction {
    inner: Arc<MemoryInner>,
    guard: OwnedMutexGuard<GameRecord>,
    working: GameRecord,
    created_players: Vec<Uuid>,
}

impl GameTransaction for MemoryTransaction {
    fn game(&self) -> &GameEntity {
        &self.working.game
    }

    fn players_with_entries(&mut self) -> BoxFuture<'_, StorageResult<Vec<PlayerRecordEntity>>> {
        future::ready(Ok(self.working.players_with_entries())).boxed()
    }

    fn create_player(
        &mut self,
        id: Uuid,
        nickname: String,
        roles: Vec<String>,
    ) -> BoxFuture<'_, StorageResult<PlayerEntity>> {
        let key = self.inner.next_key();
        let result = self.working.create_player(key, id, nickname, roles);
        if result.is_ok() {
            self.created_players.push(id);
        }
        future::ready(result).boxed()
    }

    fn update_player(
        &mut self,
        id: Uuid,
        nickname: String,
    ) -> BoxFuture<'_, StorageResult<PlayerEntity>> {
        future::ready(self.working.update_player(id, nickname)).boxed()
    }

    fn upsert_name_entry(
        &mut self,
        player_id: Uuid,
        name: String,
        order_if_new: i32,
    ) -> BoxFuture<'_, StorageResult<NameEntryEntity>> {
        future::ready(self.working.upsert_name_entry(player_id, name, order_if_new)).boxed()
    }

    fn append_story_value(
        &mut self,
        player_id: Uuid,
        value: String,
    ) -> BoxFuture<'_, StorageResult<StoryEntryEntity>> {
        future::ready(self.working.append_story_value(player_id, value)).boxed()
    }

    fn set_stories(&mut self, stories: Vec<(Uuid, String)>) -> BoxFuture<'_, StorageResult<()>> {
        self.working.set_stories(stories);
        future::ready(Ok(())).boxed()
    }

    fn update_game_phase(
        &mut self,
        phase: GamePhase,
        expected: GamePhase,
    ) -> BoxFuture<'_, StorageResult<GameEntity>> {
        future::ready(self.working.update_phase(phase, expected)).boxed()
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>> {
        let MemoryTransaction {
            inner,
            mut guard,
            working,
            created_players,
        } = *self;
        let game_id = working.game.id;
        *guard = working;
        for player_id in created_players {
            inner.players.insert(player_id, game_id);
        }
        drop(guard);
        debug!(game_id = %game_id, "transaction committed");
        future::ready(Ok(())).boxed()
    }
}
