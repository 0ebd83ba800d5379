//! Admission control for entry submissions, and the completion step that closes the
//! PLAY phase.
//!
//! The write, the completion check, the aggregation and the phase swap all run in
//! one store transaction scoped to the game, so two players finishing at the same
//! instant cannot both observe "complete".

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    auth::Identity,
    dto::{
        entry::{EntryResponse, SubmitNameRequest, SubmitStoryRequest},
        game::GameSummary,
    },
    error::ServiceError,
    services::{aggregation, events, game_service},
    state::{
        SharedState,
        game::{Game, GameType, PlayerWithEntry},
        state_machine::{GameEvent, GamePhase},
        transitions::{load_players, stage_transition},
    },
};

/// What a player submits, selected by the game type.
#[derive(Debug, Clone)]
enum Submission {
    Name(String),
    Story(String),
}

impl Submission {
    fn game_type(&self) -> GameType {
        match self {
            Submission::Name(_) => GameType::Name,
            Submission::Story(_) => GameType::Story,
        }
    }
}

struct Outcome {
    game: Game,
    me: PlayerWithEntry,
    summary: GameSummary,
    transitioned: bool,
}

/// Create or overwrite the caller's name in a NAME game.
pub async fn submit_name(
    state: &SharedState,
    identity: &Identity,
    request: SubmitNameRequest,
) -> Result<EntryResponse, ServiceError> {
    let name = request.name.trim().to_string();
    submit(state, identity, Submission::Name(name)).await
}

/// Append the caller's value for the next round of a STORY game.
pub async fn submit_story(
    state: &SharedState,
    identity: &Identity,
    request: SubmitStoryRequest,
) -> Result<EntryResponse, ServiceError> {
    let value = request.value.trim().to_string();
    submit(state, identity, Submission::Story(value)).await
}

async fn submit(
    state: &SharedState,
    identity: &Identity,
    submission: Submission,
) -> Result<EntryResponse, ServiceError> {
    let player_id = identity.player_id()?;
    let game_id = identity.game_id;
    let store = state.require_game_store().await?;
    let config = state.config();

    let outcome = state
        .with_store_timeout(async move {
            let owner = store
                .find_player(player_id)
                .await?
                .filter(|player| player.game_id == game_id)
                .ok_or_else(|| ServiceError::NotFound(format!("player `{player_id}` not found")))?;

            let mut tx = store.begin(owner.game_id).await?;
            let game: Game = tx.game().clone().into();
            let players = load_players(tx.as_mut()).await?;
            if !players.iter().any(|record| record.player.id == player_id) {
                return Err(ServiceError::NotFound(format!(
                    "player `{player_id}` not found"
                )));
            }
            admit(&game, player_id, &players, &submission, config.rounds())?;

            match submission {
                Submission::Name(name) => {
                    tx.upsert_name_entry(player_id, name, aggregation::random_order())
                        .await?;
                }
                Submission::Story(value) => {
                    tx.append_story_value(player_id, value).await?;
                }
            }

            let players = load_players(tx.as_mut()).await?;
            let complete = match game.game_type {
                GameType::Name => aggregation::names_complete(&players),
                GameType::Story => aggregation::stories_complete(&players, config.rounds()),
            };

            let mut game = game;
            let mut transitioned = false;
            let mut lost_race = false;
            if complete {
                match stage_transition(tx.as_mut(), GameEvent::RoundsCompleted).await {
                    Ok((_, next)) => {
                        if next.game_type == GameType::Story {
                            let offset = aggregation::random_offset(players.len());
                            let stories =
                                aggregation::assemble_stories(&players, config.hints(), offset);
                            tx.set_stories(stories).await?;
                            debug!(game_id = %game_id, offset, "stories assembled");
                        }
                        game = next;
                        transitioned = true;
                    }
                    Err(ServiceError::Conflict(message)) => {
                        // Our write stands; the concurrent winner owns the transition.
                        info!(game_id = %game_id, %message, "completion already handled");
                        lost_race = true;
                    }
                    Err(err) => return Err(err),
                }
            }

            let players = load_players(tx.as_mut()).await?;
            tx.commit().await?;
            if lost_race && let Some(current) = store.find_game(game_id).await? {
                game = current.into();
            }

            let me = players
                .iter()
                .find(|record| record.player.id == player_id)
                .cloned()
                .ok_or_else(|| ServiceError::NotFound(format!("player `{player_id}` not found")))?;
            Ok::<_, ServiceError>(Outcome {
                summary: GameSummary::new(&game, &players, config.rounds()),
                game,
                me,
                transitioned,
            })
        })
        .await?;

    info!(
        game_id = %game_id,
        player_id = %player_id,
        phase = ?outcome.game.phase,
        "entry accepted"
    );
    events::broadcast_game_updated(state, &outcome.summary);
    if outcome.transitioned {
        info!(game_id = %game_id, "every entry is in; results are open");
        events::broadcast_phase_changed(state, &outcome.game);
    }

    Ok(game_service::entry_response(state, &outcome.game, outcome.me))
}

/// Ordered admission checks. The player is known to belong to `game`.
fn admit(
    game: &Game,
    player_id: Uuid,
    players: &[PlayerWithEntry],
    submission: &Submission,
    rounds: usize,
) -> Result<(), ServiceError> {
    if game.game_type != submission.game_type() {
        return Err(ServiceError::WrongGameType {
            expected: submission.game_type(),
            actual: game.game_type,
        });
    }
    game_service::ensure_phase(game, GamePhase::Play)?;
    if game.game_type == GameType::Story {
        check_round_throttle(player_id, players, rounds)?;
    }
    Ok(())
}

/// A player may write their next value only while their count is not above the
/// slowest other player's count, so leads never exceed one round.
fn check_round_throttle(
    player_id: Uuid,
    players: &[PlayerWithEntry],
    rounds: usize,
) -> Result<(), ServiceError> {
    let own = players
        .iter()
        .find(|record| record.player.id == player_id)
        .map_or(0, PlayerWithEntry::rounds_submitted);
    if own >= rounds {
        return Err(ServiceError::InvalidInput(
            "every round has already been written".into(),
        ));
    }

    let slowest_other = players
        .iter()
        .filter(|record| record.player.id != player_id)
        .map(PlayerWithEntry::rounds_submitted)
        .min();
    match slowest_other {
        Some(round) if own > round => Err(ServiceError::TooFast { round }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        dto::{entry::EntryDto, phase::VisibleGamePhase},
        services::{
            events::EVENT_PHASE_CHANGED,
            game_service::{reveal_names, start_game, story_archive},
            test_support::{TestGame, join_as, join_host, test_state},
        },
        state::{
            Room,
            game::{Entry, Player, StoryEntry},
        },
    };

    fn name(value: &str) -> SubmitNameRequest {
        SubmitNameRequest {
            name: value.into(),
        }
    }

    fn value(text: &str) -> SubmitStoryRequest {
        SubmitStoryRequest { value: text.into() }
    }

    fn story_player(rounds: usize) -> PlayerWithEntry {
        PlayerWithEntry {
            player: Player {
                id: Uuid::new_v4(),
                game_id: Uuid::nil(),
                nickname: format!("p{rounds}"),
                roles: vec![],
            },
            entry: Some(Entry::Story(StoryEntry {
                values: vec!["v".into(); rounds],
                story: None,
            })),
        }
    }

    #[test]
    fn throttle_allows_a_lead_of_one_round() {
        let a = story_player(1);
        let b = story_player(1);
        let players = vec![a.clone(), b];
        assert!(check_round_throttle(a.player.id, &players, 6).is_ok());
    }

    #[test]
    fn throttle_rejects_a_lead_of_two_rounds() {
        let a = story_player(2);
        let b = story_player(1);
        let players = vec![a.clone(), b];
        assert!(matches!(
            check_round_throttle(a.player.id, &players, 6),
            Err(ServiceError::TooFast { round: 1 })
        ));
    }

    #[test]
    fn throttle_compares_against_the_slowest_other_player() {
        let a = story_player(1);
        let players = vec![a.clone(), story_player(3), story_player(0)];
        assert!(matches!(
            check_round_throttle(a.player.id, &players, 6),
            Err(ServiceError::TooFast { round: 0 })
        ));
        assert!(check_round_throttle(a.player.id, &[a.clone()], 6).is_ok());
    }

    #[tokio::test]
    async fn story_throttle_end_to_end() {
        let state = test_state().await;
        let game = TestGame::create(&state, GameType::Story).await;
        let a = join_host(&state, &game, "ada").await;
        let b = join_as(&state, &game, "bob").await;
        start_game(&state, &a, game.id).await.unwrap();

        submit_story(&state, &a, value("x1")).await.unwrap();
        let err = submit_story(&state, &a, value("x2")).await.unwrap_err();
        assert!(matches!(err, ServiceError::TooFast { round: 0 }));

        submit_story(&state, &b, value("y1")).await.unwrap();
        let response = submit_story(&state, &a, value("x2")).await.unwrap();
        match response.entry {
            Some(EntryDto::Story(entry)) => {
                assert_eq!(entry.values, vec!["x1", "x2"]);
                assert!(entry.next_hint.is_none());
            }
            other => panic!("expected story entry, got {other:?}"),
        }
        assert_eq!(response.phase, VisibleGamePhase::Play);
    }

    #[tokio::test]
    async fn final_story_value_assembles_every_story() {
        let state = test_state().await;
        let game = TestGame::create(&state, GameType::Story).await;
        let a = join_host(&state, &game, "ada").await;
        let b = join_as(&state, &game, "bob").await;
        let c = join_as(&state, &game, "cy").await;
        start_game(&state, &a, game.id).await.unwrap();

        for (who, round) in [(&a, "x"), (&b, "y"), (&c, "z")] {
            submit_story(&state, who, value(&format!("{round}1")))
                .await
                .unwrap();
        }
        submit_story(&state, &a, value("x2")).await.unwrap();
        submit_story(&state, &b, value("y2")).await.unwrap();
        let last = submit_story(&state, &c, value("z2")).await.unwrap();
        assert_eq!(last.phase, VisibleGamePhase::Read);
        match last.entry {
            Some(EntryDto::Story(entry)) => assert!(entry.story.is_some()),
            other => panic!("expected story entry, got {other:?}"),
        }

        let archive = story_archive(&state, game.id).await.unwrap();
        assert_eq!(archive.len(), 3);
        // Round two always comes from the player after the round-one author, whatever
        // the offset; the offset only decides who reads which story.
        let stories: HashSet<&str> = archive.iter().map(|e| e.story.as_str()).collect();
        let expected: HashSet<&str> = ["x1 in y2.", "y1 in z2.", "z1 in x2."]
            .into_iter()
            .collect();
        assert_eq!(stories, expected);

        let err = submit_story(&state, &a, value("late")).await.unwrap_err();
        assert!(matches!(err, ServiceError::PhaseMismatch { .. }));
    }

    #[tokio::test]
    async fn name_resubmission_overwrites_in_place() {
        let state = test_state().await;
        let game = TestGame::create(&state, GameType::Name).await;
        let a = join_host(&state, &game, "ada").await;
        join_as(&state, &game, "bob").await;
        start_game(&state, &a, game.id).await.unwrap();

        submit_name(&state, &a, name("Grace")).await.unwrap();
        let again = submit_name(&state, &a, name("Grace")).await.unwrap();
        assert_eq!(again.phase, VisibleGamePhase::Play);

        let players = crate::services::game_service::list_players(&state, game.id)
            .await
            .unwrap();
        assert_eq!(players.iter().filter(|p| p.name_submitted).count(), 1);
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected_and_first_is_kept() {
        let state = test_state().await;
        let game = TestGame::create(&state, GameType::Name).await;
        let a = join_host(&state, &game, "ada").await;
        let b = join_as(&state, &game, "bob").await;
        join_as(&state, &game, "cy").await;
        start_game(&state, &a, game.id).await.unwrap();

        submit_name(&state, &a, name("Grace Hopper")).await.unwrap();
        let err = submit_name(&state, &b, name("  grace HOPPER "))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateName(_)));

        let entry = crate::services::game_service::get_own_entry(&state, &a)
            .await
            .unwrap();
        match entry.entry {
            Some(EntryDto::Name(entry)) => assert_eq!(entry.name, "Grace Hopper"),
            other => panic!("expected name entry, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn admission_checks_run_in_order() {
        let state = test_state().await;
        let game = TestGame::create(&state, GameType::Name).await;
        let a = join_host(&state, &game, "ada").await;

        let wrong_type = submit_story(&state, &a, value("x")).await.unwrap_err();
        assert!(matches!(wrong_type, ServiceError::WrongGameType { .. }));

        let too_early = submit_name(&state, &a, name("Grace")).await.unwrap_err();
        assert!(matches!(
            too_early,
            ServiceError::PhaseMismatch {
                expected: GamePhase::Play,
                actual: GamePhase::Join
            }
        ));

        let other = TestGame::create(&state, GameType::Name).await;
        let stranger = Identity {
            game_id: other.id,
            ..a.clone()
        };
        let missing = submit_name(&state, &stranger, name("Grace"))
            .await
            .unwrap_err();
        assert!(matches!(missing, ServiceError::NotFound(_)));

        let forbidden = submit_name(&state, &game.creator, name("Grace"))
            .await
            .unwrap_err();
        assert!(matches!(forbidden, ServiceError::Forbidden(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_final_names_advance_exactly_once() {
        for _ in 0..20 {
            let state = test_state().await;
            let game = TestGame::create(&state, GameType::Name).await;
            let a = join_host(&state, &game, "ada").await;
            let b = join_as(&state, &game, "bob").await;
            start_game(&state, &a, game.id).await.unwrap();

            let (tx, mut rx) = mpsc::unbounded_channel();
            state.rooms().join(Uuid::new_v4(), &[Room::Game(game.id)], tx);

            let first = tokio::spawn({
                let state = state.clone();
                async move { submit_name(&state, &a, name("Grace")).await }
            });
            let second = tokio::spawn({
                let state = state.clone();
                async move { submit_name(&state, &b, name("Hedy")).await }
            });
            let first = first.await.unwrap().unwrap();
            let second = second.await.unwrap().unwrap();

            let phases = [first.phase, second.phase];
            assert!(phases.contains(&VisibleGamePhase::Read));

            let mut phase_events = 0;
            while let Ok(event) = rx.try_recv() {
                if event.event == EVENT_PHASE_CHANGED {
                    phase_events += 1;
                }
            }
            assert_eq!(phase_events, 1);

            let revealed = reveal_names(&state, game.id).await.unwrap();
            assert_eq!(revealed.len(), 2);
            assert!(revealed[0].order >= revealed[1].order);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_final_story_values_assemble_once() {
        for _ in 0..20 {
            let state = test_state().await;
            let game = TestGame::create(&state, GameType::Story).await;
            let a = join_host(&state, &game, "ada").await;
            let b = join_as(&state, &game, "bob").await;
            start_game(&state, &a, game.id).await.unwrap();
            submit_story(&state, &a, value("x1")).await.unwrap();
            submit_story(&state, &b, value("y1")).await.unwrap();

            let (tx, mut rx) = mpsc::unbounded_channel();
            state.rooms().join(Uuid::new_v4(), &[Room::Game(game.id)], tx);

            let first = tokio::spawn({
                let state = state.clone();
                async move { submit_story(&state, &a, value("x2")).await }
            });
            let second = tokio::spawn({
                let state = state.clone();
                async move { submit_story(&state, &b, value("y2")).await }
            });
            let first = first.await.unwrap().unwrap();
            let second = second.await.unwrap().unwrap();

            // Submissions serialise on the game, so only the later one sees completion.
            let finished: Vec<_> = [&first, &second]
                .into_iter()
                .filter(|response| response.phase == VisibleGamePhase::Read)
                .collect();
            assert_eq!(finished.len(), 1);

            let mut phase_events = 0;
            while let Ok(event) = rx.try_recv() {
                if event.event == EVENT_PHASE_CHANGED {
                    phase_events += 1;
                }
            }
            assert_eq!(phase_events, 1);

            let archive = story_archive(&state, game.id).await.unwrap();
            let stories: HashSet<String> = archive.iter().map(|e| e.story.clone()).collect();
            let expected: HashSet<String> = ["x1 in y2.", "y1 in x2."]
                .into_iter()
                .map(String::from)
                .collect();
            assert_eq!(stories, expected);

            let winner = finished[0];
            let Some(EntryDto::Story(entry)) = &winner.entry else {
                panic!("expected story entry");
            };
            let own = archive
                .iter()
                .find(|e| e.player_id == winner.player_id)
                .map(|e| e.story.clone());
            assert_eq!(entry.story, own);

            let again = story_archive(&state, game.id).await.unwrap();
            let again: Vec<_> = again.into_iter().map(|e| (e.player_id, e.story)).collect();
            let before: Vec<_> = archive.into_iter().map(|e| (e.player_id, e.story)).collect();
            assert_eq!(again, before);
        }
    }
}
