use std::{sync::Arc, time::SystemTime};

use rand::{Rng, rng};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{Capability, Identity},
    dao::{game_store::GameStore, storage::StorageError},
    dto::{
        entry::{EntryDto, EntryResponse},
        game::{
            CreateGameRequest, CreatedGameResponse, GameSummary, JoinGameRequest,
            JoinGameResponse, PlayerProgress, PlayerSummary, RevealedName, StoryArchiveEntry,
            UpdatePlayerRequest,
        },
    },
    error::ServiceError,
    services::{aggregation, events},
    state::{
        SharedState,
        game::{
            Entry, Game, GameType, HOST_ROLE, Player, PlayerWithEntry, StoryEntry, normalize_code,
        },
        state_machine::{GameEvent, GamePhase},
        transitions::{load_players, run_transition_with_broadcast},
    },
};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const CODE_LENGTH: usize = 4;
const CODE_ATTEMPTS: usize = 16;

/// Create a game in the JOIN phase and hand the creator a game-level credential.
pub async fn create_game(
    state: &SharedState,
    request: CreateGameRequest,
) -> Result<CreatedGameResponse, ServiceError> {
    let game = insert_game(state, request.game_type).await?;
    info!(game_id = %game.id, code = %game.code, game_type = ?game.game_type, "game created");
    created_response(state, game)
}

/// Fetch a game by id.
pub async fn get_game(state: &SharedState, id: Uuid) -> Result<GameSummary, ServiceError> {
    let store = state.require_game_store().await?;
    let game = load_game(state, store.as_ref(), id).await?;
    summarize(state, store.as_ref(), &game).await
}

/// Fetch a game by its join code, compared case-insensitively.
pub async fn get_game_by_code(
    state: &SharedState,
    code: &str,
) -> Result<GameSummary, ServiceError> {
    let store = state.require_game_store().await?;
    let code = normalize_code(code);
    let game: Game = state
        .with_store_timeout(async {
            Ok::<_, ServiceError>(store.find_game_by_code(code.clone()).await?)
        })
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("no game with code `{code}`")))?
        .into();
    summarize(state, store.as_ref(), &game).await
}

/// Roster of a game with per-player progress.
pub async fn list_players(
    state: &SharedState,
    game_id: Uuid,
) -> Result<Vec<PlayerProgress>, ServiceError> {
    let store = state.require_game_store().await?;
    load_game(state, store.as_ref(), game_id).await?;
    let players = load_roster(state, store.as_ref(), game_id).await?;
    Ok(players.iter().map(PlayerProgress::from).collect())
}

/// Add a player to a game still in JOIN. A valid game-level credential for the same
/// game makes the new player host, unless the game already has one.
pub async fn join_game(
    state: &SharedState,
    game_id: Uuid,
    request: JoinGameRequest,
    caller: Option<Identity>,
) -> Result<JoinGameResponse, ServiceError> {
    let claims_host = match caller {
        None => false,
        Some(identity) => {
            identity.require_game(game_id)?;
            if identity.capability != Capability::Game {
                return Err(ServiceError::Forbidden(
                    "credential already belongs to a player".into(),
                ));
            }
            identity.is_host()
        }
    };

    let store = state.require_game_store().await?;
    let rounds = state.config().rounds();
    let nickname = request.nickname.trim().to_string();
    let player_id = Uuid::new_v4();

    let (player, summary) = state
        .with_store_timeout(async move {
            let mut tx = store.begin(game_id).await?;
            let game: Game = tx.game().clone().into();
            ensure_phase(&game, GamePhase::Join)?;

            // The creator credential can be replayed; only the first join takes the role.
            let host_taken = load_players(tx.as_mut())
                .await?
                .iter()
                .any(|record| record.player.is_host());
            let roles = if claims_host && !host_taken {
                vec![HOST_ROLE.to_string()]
            } else {
                Vec::new()
            };

            let player: Player = tx.create_player(player_id, nickname, roles).await?.into();
            let players = load_players(tx.as_mut()).await?;
            tx.commit().await?;
            Ok::<_, ServiceError>((player, GameSummary::new(&game, &players, rounds)))
        })
        .await?;

    let token = state.identity().issue_player_token(
        game_id,
        player.id,
        player.roles.clone(),
        SystemTime::now(),
    )?;
    info!(
        game_id = %game_id,
        player_id = %player.id,
        host = player.is_host(),
        "player joined"
    );
    events::broadcast_game_updated(state, &summary);

    Ok(JoinGameResponse {
        player: player.into(),
        token,
    })
}

/// Rename the calling player while the game is still in JOIN.
pub async fn update_player(
    state: &SharedState,
    identity: &Identity,
    request: UpdatePlayerRequest,
) -> Result<PlayerSummary, ServiceError> {
    let player_id = identity.player_id()?;
    let game_id = identity.game_id;
    let store = state.require_game_store().await?;
    let rounds = state.config().rounds();
    let nickname = request.nickname.trim().to_string();

    let (player, summary) = state
        .with_store_timeout(async move {
            let mut tx = store.begin(game_id).await?;
            let game: Game = tx.game().clone().into();
            ensure_phase(&game, GamePhase::Join)?;

            let player: Player = tx.update_player(player_id, nickname).await?.into();
            let players = load_players(tx.as_mut()).await?;
            tx.commit().await?;
            Ok::<_, ServiceError>((player, GameSummary::new(&game, &players, rounds)))
        })
        .await?;

    info!(game_id = %game_id, player_id = %player_id, "player renamed");
    events::broadcast_game_updated(state, &summary);
    Ok(player.into())
}

/// Host moves the game from JOIN to PLAY.
pub async fn start_game(
    state: &SharedState,
    identity: &Identity,
    game_id: Uuid,
) -> Result<GameSummary, ServiceError> {
    identity.require_host(game_id)?;
    let game =
        run_transition_with_broadcast(state, game_id, GameEvent::Start, |_, _| Ok(())).await?;
    let store = state.require_game_store().await?;
    summarize(state, store.as_ref(), &game).await
}

/// Host hides the results of a NAME game, moving it from READ to END.
pub async fn end_game(
    state: &SharedState,
    identity: &Identity,
    game_id: Uuid,
) -> Result<GameSummary, ServiceError> {
    identity.require_host(game_id)?;
    let game =
        run_transition_with_broadcast(state, game_id, GameEvent::HideResults, |_, _| Ok(()))
            .await?;
    let store = state.require_game_store().await?;
    summarize(state, store.as_ref(), &game).await
}

/// Host spawns a fresh game of the same type once the results are out. The old game
/// is left untouched; its players are told where to go next.
pub async fn recreate_game(
    state: &SharedState,
    identity: &Identity,
    game_id: Uuid,
) -> Result<CreatedGameResponse, ServiceError> {
    identity.require_host(game_id)?;
    let store = state.require_game_store().await?;
    let previous = load_game(state, store.as_ref(), game_id).await?;
    if previous.phase < GamePhase::Read {
        return Err(ServiceError::InvalidPhase(format!(
            "game `{game_id}` can only be recreated once its results are out"
        )));
    }

    let game = insert_game(state, previous.game_type).await?;
    info!(game_id = %game_id, new_game_id = %game.id, "game recreated");
    events::broadcast_game_recreated(state, game_id, &game);
    created_response(state, game)
}

/// Names of a NAME game in reveal order. Only available once the game reached READ.
pub async fn reveal_names(
    state: &SharedState,
    game_id: Uuid,
) -> Result<Vec<RevealedName>, ServiceError> {
    let store = state.require_game_store().await?;
    let game = load_game(state, store.as_ref(), game_id).await?;
    ensure_game_type(&game, GameType::Name)?;
    ensure_results_visible(&game)?;

    let players = load_roster(state, store.as_ref(), game_id).await?;
    Ok(aggregation::reveal_order(&players)
        .into_iter()
        .map(|entry| RevealedName {
            name: entry.name.clone(),
            order: entry.order,
        })
        .collect())
}

/// Every assembled story of a STORY game. Only available once the game reached READ.
pub async fn story_archive(
    state: &SharedState,
    game_id: Uuid,
) -> Result<Vec<StoryArchiveEntry>, ServiceError> {
    let store = state.require_game_store().await?;
    let game = load_game(state, store.as_ref(), game_id).await?;
    ensure_game_type(&game, GameType::Story)?;
    ensure_results_visible(&game)?;

    let players = load_roster(state, store.as_ref(), game_id).await?;
    Ok(players
        .into_iter()
        .filter_map(|record| {
            let story = record.story_entry()?.story.clone()?;
            Some(StoryArchiveEntry {
                player_id: record.player.id,
                nickname: record.player.nickname,
                story,
            })
        })
        .collect())
}

/// The caller's own entry; for STORY it carries the hint for the next round.
pub async fn get_own_entry(
    state: &SharedState,
    identity: &Identity,
) -> Result<EntryResponse, ServiceError> {
    let player_id = identity.player_id()?;
    let store = state.require_game_store().await?;
    let game = load_game(state, store.as_ref(), identity.game_id).await?;
    let players = load_roster(state, store.as_ref(), game.id).await?;
    let me = players
        .into_iter()
        .find(|record| record.player.id == player_id)
        .ok_or_else(|| ServiceError::NotFound(format!("player `{player_id}` not found")))?;
    Ok(entry_response(state, &game, me))
}

/// Shape a player's entry for the response of reads and submissions.
pub(crate) fn entry_response(
    state: &SharedState,
    game: &Game,
    record: PlayerWithEntry,
) -> EntryResponse {
    let config = state.config();
    let entry = match (game.game_type, record.entry) {
        (_, Some(entry)) => Some(EntryDto::from_entry(entry, &config)),
        (GameType::Story, None) => Some(EntryDto::from_entry(
            Entry::Story(StoryEntry::default()),
            &config,
        )),
        (GameType::Name, None) => None,
    };
    EntryResponse {
        game_id: game.id,
        player_id: record.player.id,
        phase: game.phase.into(),
        entry,
    }
}

pub(crate) fn ensure_phase(game: &Game, expected: GamePhase) -> Result<(), ServiceError> {
    if game.phase != expected {
        return Err(ServiceError::PhaseMismatch {
            expected,
            actual: game.phase,
        });
    }
    Ok(())
}

fn ensure_game_type(game: &Game, expected: GameType) -> Result<(), ServiceError> {
    if game.game_type != expected {
        return Err(ServiceError::WrongGameType {
            expected,
            actual: game.game_type,
        });
    }
    Ok(())
}

fn ensure_results_visible(game: &Game) -> Result<(), ServiceError> {
    if game.phase < GamePhase::Read {
        return Err(ServiceError::PhaseMismatch {
            expected: GamePhase::Read,
            actual: game.phase,
        });
    }
    Ok(())
}

async fn load_game(
    state: &SharedState,
    store: &dyn GameStore,
    id: Uuid,
) -> Result<Game, ServiceError> {
    state
        .with_store_timeout(async { Ok::<_, ServiceError>(store.find_game(id).await?) })
        .await?
        .map(Into::into)
        .ok_or_else(|| ServiceError::NotFound(format!("game `{id}` not found")))
}

async fn load_roster(
    state: &SharedState,
    store: &dyn GameStore,
    game_id: Uuid,
) -> Result<Vec<PlayerWithEntry>, ServiceError> {
    let records = state
        .with_store_timeout(async {
            Ok::<_, ServiceError>(store.list_players_with_entries(game_id).await?)
        })
        .await?;
    Ok(records.into_iter().map(Into::into).collect())
}

async fn summarize(
    state: &SharedState,
    store: &dyn GameStore,
    game: &Game,
) -> Result<GameSummary, ServiceError> {
    let players = load_roster(state, store, game.id).await?;
    Ok(GameSummary::new(game, &players, state.config().rounds()))
}

async fn insert_game(state: &SharedState, game_type: GameType) -> Result<Game, ServiceError> {
    let store: Arc<dyn GameStore> = state.require_game_store().await?;
    for _ in 0..CODE_ATTEMPTS {
        let code = generate_code();
        let attempt = state
            .with_store_timeout(async {
                match store.create_game(Uuid::new_v4(), code.clone(), game_type).await {
                    Ok(game) => Ok(Some(game)),
                    Err(StorageError::Duplicate { field: "code", .. }) => Ok(None),
                    Err(err) => Err(ServiceError::from(err)),
                }
            })
            .await?;
        match attempt {
            Some(game) => return Ok(game.into()),
            None => warn!(code = %code, "join code collision; drawing another"),
        }
    }
    Err(ServiceError::Internal(
        "could not allocate a free join code".into(),
    ))
}

fn created_response(state: &SharedState, game: Game) -> Result<CreatedGameResponse, ServiceError> {
    let token = state
        .identity()
        .issue_game_token(game.id, SystemTime::now())?;
    Ok(CreatedGameResponse {
        game: GameSummary::new(&game, &[], state.config().rounds()),
        token,
    })
}

fn generate_code() -> String {
    let mut rng = rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{TestGame, join_as, join_host, test_state};

    #[tokio::test]
    async fn created_game_is_found_by_lowercase_code() {
        let state = test_state().await;
        let created = create_game(
            &state,
            CreateGameRequest {
                game_type: GameType::Name,
            },
        )
        .await
        .unwrap();

        assert_eq!(created.game.code.len(), CODE_LENGTH);
        let found = get_game_by_code(&state, &created.game.code.to_lowercase())
            .await
            .unwrap();
        assert_eq!(found.id, created.game.id);
        assert_eq!(found.phase, crate::dto::phase::VisibleGamePhase::Join);
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let state = test_state().await;
        let err = get_game_by_code(&state, "QQQQ").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn creator_token_makes_the_joiner_host() {
        let state = test_state().await;
        let game = TestGame::create(&state, GameType::Name).await;
        let host = join_host(&state, &game, "ada").await;
        let guest = join_as(&state, &game, "bob").await;

        assert!(host.is_host());
        assert!(!guest.is_host());
    }

    #[tokio::test]
    async fn creator_token_grants_host_only_once() {
        let state = test_state().await;
        let game = TestGame::create(&state, GameType::Name).await;
        let first = join_host(&state, &game, "ada").await;
        let second = join_host(&state, &game, "bob").await;

        assert!(first.is_host());
        assert!(!second.is_host());
        let hosts = list_players(&state, game.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|player| player.roles.iter().any(|role| role == HOST_ROLE))
            .count();
        assert_eq!(hosts, 1);
    }

    #[tokio::test]
    async fn creator_credential_cannot_act_as_host() {
        let state = test_state().await;
        let game = TestGame::create(&state, GameType::Name).await;
        join_host(&state, &game, "ada").await;
        join_as(&state, &game, "bob").await;

        let err = start_game(&state, &game.creator, game.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        let err = end_game(&state, &game.creator, game.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        let err = recreate_game(&state, &game.creator, game.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        let summary = get_game(&state, game.id).await.unwrap();
        assert_eq!(summary.phase, crate::dto::phase::VisibleGamePhase::Join);
    }

    #[tokio::test]
    async fn non_host_cannot_start_and_state_is_unchanged() {
        let state = test_state().await;
        let game = TestGame::create(&state, GameType::Name).await;
        join_host(&state, &game, "ada").await;
        let guest = join_as(&state, &game, "bob").await;

        let err = start_game(&state, &guest, game.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        let summary = get_game(&state, game.id).await.unwrap();
        assert_eq!(summary.phase, crate::dto::phase::VisibleGamePhase::Join);
    }

    #[tokio::test]
    async fn start_needs_a_host_player_and_only_works_once() {
        let state = test_state().await;
        let game = TestGame::create(&state, GameType::Story).await;

        let creator = start_game(&state, &game.creator, game.id).await.unwrap_err();
        assert!(matches!(creator, ServiceError::Forbidden(_)));

        let host = join_host(&state, &game, "ada").await;
        let started = start_game(&state, &host, game.id).await.unwrap();
        assert_eq!(started.phase, crate::dto::phase::VisibleGamePhase::Play);

        let again = start_game(&state, &host, game.id).await.unwrap_err();
        assert!(matches!(again, ServiceError::InvalidPhase(_)));
    }

    #[tokio::test]
    async fn joining_after_start_is_rejected() {
        let state = test_state().await;
        let game = TestGame::create(&state, GameType::Name).await;
        let host = join_host(&state, &game, "ada").await;
        start_game(&state, &host, game.id).await.unwrap();

        let err = join_game(
            &state,
            game.id,
            JoinGameRequest {
                nickname: "late".into(),
            },
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::PhaseMismatch {
                expected: GamePhase::Join,
                actual: GamePhase::Play
            }
        ));
    }

    #[tokio::test]
    async fn nickname_collisions_are_case_folded() {
        let state = test_state().await;
        let game = TestGame::create(&state, GameType::Name).await;
        join_as(&state, &game, "Ada").await;

        let err = join_game(
            &state,
            game.id,
            JoinGameRequest {
                nickname: " ADA ".into(),
            },
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateName(_)));
    }

    #[tokio::test]
    async fn rename_only_during_join() {
        let state = test_state().await;
        let game = TestGame::create(&state, GameType::Name).await;
        let host = join_host(&state, &game, "ada").await;

        let renamed = update_player(
            &state,
            &host,
            UpdatePlayerRequest {
                nickname: "Ada L.".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(renamed.nickname, "Ada L.");

        start_game(&state, &host, game.id).await.unwrap();
        let err = update_player(
            &state,
            &host,
            UpdatePlayerRequest {
                nickname: "Countess".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::PhaseMismatch { .. }));
    }

    #[tokio::test]
    async fn story_games_cannot_be_ended() {
        let state = test_state().await;
        let game = TestGame::create(&state, GameType::Story).await;
        let host = join_host(&state, &game, "ada").await;
        start_game(&state, &host, game.id).await.unwrap();

        let err = end_game(&state, &host, game.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidPhase(_)));
    }

    #[tokio::test]
    async fn results_stay_hidden_before_read() {
        let state = test_state().await;
        let game = TestGame::create(&state, GameType::Name).await;
        join_host(&state, &game, "ada").await;

        let err = reveal_names(&state, game.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::PhaseMismatch { .. }));
        let err = story_archive(&state, game.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::WrongGameType { .. }));
    }

    #[tokio::test]
    async fn recreate_requires_results_and_spawns_a_new_game() {
        let state = test_state().await;
        let game = TestGame::create(&state, GameType::Name).await;
        let host = join_host(&state, &game, "ada").await;

        let early = recreate_game(&state, &host, game.id).await.unwrap_err();
        assert!(matches!(early, ServiceError::InvalidPhase(_)));

        start_game(&state, &host, game.id).await.unwrap();
        crate::services::submission_service::submit_name(
            &state,
            &host,
            crate::dto::entry::SubmitNameRequest {
                name: "Grace".into(),
            },
        )
        .await
        .unwrap();

        let next = recreate_game(&state, &host, game.id).await.unwrap();
        assert_ne!(next.game.id, game.id);
        assert_eq!(next.game.game_type, GameType::Name);
        assert_eq!(next.game.phase, crate::dto::phase::VisibleGamePhase::Join);
        assert_ne!(next.game.code, game.code);
    }

    #[tokio::test]
    async fn degraded_mode_rejects_store_work() {
        let state = test_state().await;
        state.clear_game_store().await;
        let err = get_game(&state, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }

    #[test]
    fn codes_use_the_unambiguous_alphabet() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }
}
