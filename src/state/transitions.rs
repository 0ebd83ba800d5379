use tracing::info;
use uuid::Uuid;

use crate::{
    dao::game_store::GameTransaction,
    error::ServiceError,
    services::events::broadcast_phase_changed,
    state::{
        SharedState,
        game::{Game, PlayerWithEntry},
        state_machine::{GameEvent, GameStateMachine, Plan},
    },
};

/// Players of the transaction's game, in join order, with their entries.
pub async fn load_players(
    tx: &mut dyn GameTransaction,
) -> Result<Vec<PlayerWithEntry>, ServiceError> {
    Ok(tx
        .players_with_entries()
        .await?
        .into_iter()
        .map(Into::into)
        .collect())
}

/// Plan `event` against the game as `tx` sees it and stage the phase swap in the
/// same transaction. Nothing is visible until the caller commits.
pub async fn stage_transition(
    tx: &mut dyn GameTransaction,
    event: GameEvent,
) -> Result<(Plan, Game), ServiceError> {
    let game: Game = tx.game().clone().into();
    let plan = GameStateMachine::for_game(&game).plan(event)?;
    let updated = tx.update_game_phase(plan.to, plan.from).await?;
    Ok((plan, updated.into()))
}

/// Execute a host-requested transition inside one transaction, then broadcast the
/// resulting phase change. `guard` sees the game and its players before the swap and
/// may veto it.
pub async fn run_transition_with_broadcast<F>(
    state: &SharedState,
    game_id: Uuid,
    event: GameEvent,
    guard: F,
) -> Result<Game, ServiceError>
where
    F: FnOnce(&Game, &[PlayerWithEntry]) -> Result<(), ServiceError> + Send,
{
    let store = state.require_game_store().await?;
    let game = state
        .with_store_timeout(async move {
            let mut tx = store.begin(game_id).await?;
            let current: Game = tx.game().clone().into();
            GameStateMachine::for_game(&current).plan(event)?;

            let players = load_players(tx.as_mut()).await?;
            guard(&current, &players)?;

            let (plan, game) = stage_transition(tx.as_mut(), event).await?;
            tx.commit().await?;
            info!(
                game_id = %game_id,
                event = ?plan.event,
                from = ?plan.from,
                to = ?plan.to,
                "game phase changed"
            );
            Ok::<_, ServiceError>(game)
        })
        .await?;

    broadcast_phase_changed(state, &game);
    Ok(game)
}
