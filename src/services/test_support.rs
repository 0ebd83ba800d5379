//! Fixtures shared by the service tests.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use uuid::Uuid;

use crate::{
    auth::{Identity, IdentityGate},
    config::{AppConfig, Hint},
    dao::game_store::memory::MemoryGameStore,
    dto::game::{CreateGameRequest, JoinGameRequest},
    services::game_service,
    state::{AppState, SharedState, game::GameType},
};

/// State with an in-memory store and a two-round hint table.
pub async fn test_state() -> SharedState {
    let config = AppConfig::new(
        vec![Hint::new("who?", "", " "), Hint::new("where?", "in ", ".")],
        Duration::from_secs(60 * 60),
        Duration::from_secs(5),
    );
    let state = AppState::new(
        Arc::new(config),
        IdentityGate::new("service-test-secret", Duration::from_secs(60 * 60)),
    );
    let store = Arc::new(MemoryGameStore::new());
    state.install_game_store(store).await;
    state
}

pub struct TestGame {
    pub id: Uuid,
    pub code: String,
    /// Game-level credential handed to the creator.
    pub creator: Identity,
    creator_token: String,
}

impl TestGame {
    pub async fn create(state: &SharedState, game_type: GameType) -> Self {
        let created = game_service::create_game(state, CreateGameRequest { game_type })
            .await
            .unwrap();
        let creator = state.identity().authenticate(&created.token).unwrap();
        Self {
            id: created.game.id,
            code: created.game.code,
            creator,
            creator_token: created.token,
        }
    }
}

async fn join(state: &SharedState, game: &TestGame, nickname: &str, host: bool) -> Identity {
    let caller = host.then(|| {
        state
            .identity()
            .authenticate(&game.creator_token)
            .unwrap()
    });
    let joined = game_service::join_game(
        state,
        game.id,
        JoinGameRequest {
            nickname: nickname.into(),
        },
        caller,
    )
    .await
    .unwrap();
    state.identity().authenticate(&joined.token).unwrap()
}

/// Join with the creator's credential, becoming host.
pub async fn join_host(state: &SharedState, game: &TestGame, nickname: &str) -> Identity {
    join(state, game, nickname, true).await
}

/// Join as a plain player.
pub async fn join_as(state: &SharedState, game: &TestGame, nickname: &str) -> Identity {
    join(state, game, nickname, false).await
}

/// Fresh bearer credential for an already joined player.
pub fn token_for(state: &SharedState, identity: &Identity) -> String {
    let player_id = identity.player_id().unwrap();
    state
        .identity()
        .issue_player_token(
            identity.game_id,
            player_id,
            identity.roles.clone(),
            SystemTime::now(),
        )
        .unwrap()
}
