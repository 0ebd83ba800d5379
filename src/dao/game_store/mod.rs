/// Process-local store.
pub mod memory;

use crate::dao::models::{
    GameEntity, NameEntryEntity, PlayerEntity, PlayerRecordEntity, StoryEntryEntity,
};
use crate::dao::storage::StorageResult;
use crate::state::{game::GameType, state_machine::GamePhase};
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for games, players and their entries.
pub trait GameStore: Send + Sync {
    /// Insert a new game in the JOIN phase. Fails with `Duplicate` when `code` is taken.
    fn create_game(
        &self,
        id: Uuid,
        code: String,
        game_type: GameType,
    ) -> BoxFuture<'static, StorageResult<GameEntity>>;
    /// Fetch a game by id.
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Look a game up by its upper-case code.
    fn find_game_by_code(&self, code: String)
    -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Fetch a player by id, whatever game they belong to.
    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Players of a game in join order, each with their entries.
    fn list_players_with_entries(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerRecordEntity>>>;
    /// Open a transaction serialised against every other writer of the same game.
    fn begin(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<Box<dyn GameTransaction>>>;
    /// Cheap liveness probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Unit of work scoped to one game. Reads observe the transaction's own writes.
/// Dropping the transaction without [`GameTransaction::commit`] discards every write.
pub trait GameTransaction: Send {
    /// Game row as seen by this transaction.
    fn game(&self) -> &GameEntity;
    /// Players of the game in join order, including uncommitted writes.
    fn players_with_entries(&mut self) -> BoxFuture<'_, StorageResult<Vec<PlayerRecordEntity>>>;
    /// Add a player. Nicknames are unique per game, compared case-insensitively.
    fn create_player(
        &mut self,
        id: Uuid,
        nickname: String,
        roles: Vec<String>,
    ) -> BoxFuture<'_, StorageResult<PlayerEntity>>;
    /// Rename a player of this game.
    fn update_player(
        &mut self,
        id: Uuid,
        nickname: String,
    ) -> BoxFuture<'_, StorageResult<PlayerEntity>>;
    /// Create or overwrite the player's name entry. `order_if_new` is only used on insert.
    /// Fails with `Duplicate` when another player already holds the normalised name.
    fn upsert_name_entry(
        &mut self,
        player_id: Uuid,
        name: String,
        order_if_new: i32,
    ) -> BoxFuture<'_, StorageResult<NameEntryEntity>>;
    /// Append one round value to the player's story entry, creating it if needed.
    fn append_story_value(
        &mut self,
        player_id: Uuid,
        value: String,
    ) -> BoxFuture<'_, StorageResult<StoryEntryEntity>>;
    /// Persist assembled stories keyed by player id. Unknown players are skipped.
    fn set_stories(&mut self, stories: Vec<(Uuid, String)>) -> BoxFuture<'_, StorageResult<()>>;
    /// Compare-and-swap the game phase from `expected` to `phase`.
    fn update_game_phase(
        &mut self,
        phase: GamePhase,
        expected: GamePhase,
    ) -> BoxFuture<'_, StorageResult<GameEntity>>;
    /// Publish every write and release the game.
    fn commit(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>>;
}
