use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::Identity,
    dto::{events::ServerEvent, ws::ClientMessage},
    error::ServiceError,
    services::events,
    state::{Room, SharedState, rooms::ConnectionId},
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised while handling frames of an identified connection.
#[derive(Debug, Error)]
enum SocketError {
    /// Poke target is not a player of the sender's game.
    #[error("poke ignored: `{0}` is not a player of this game")]
    UnknownTarget(Uuid),
    /// Error from persistence or state management operations.
    #[error("service error: {0}")]
    Service(#[from] ServiceError),
}

/// Handle the full lifecycle of one client WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket identification timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let (identity, player_id) = match identify(&state, &initial_message) {
        Ok(identified) => identified,
        Err(reason) => {
            warn!(%reason, "rejecting websocket client");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    // Room events are serialised here so the registry never touches socket types.
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<ServerEvent>();
    let forward_tx = outbound_tx.clone();
    let forward_task = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(event = %event.event, error = %err, "failed to serialize event");
                    continue;
                }
            };
            if forward_tx.send(Message::Text(payload.into())).is_err() {
                break;
            }
        }
    });

    let connection_id = Uuid::new_v4();
    let rooms = join_connection(&state, connection_id, &identity, player_id, events_tx);
    info!(
        game_id = %identity.game_id,
        player_id = %player_id,
        connection_id = %connection_id,
        "client connected"
    );

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientMessage::from_json_str(&text) {
                Ok(ClientMessage::Poke { to }) => {
                    if let Err(err) = handle_poke(&state, &identity, player_id, to).await {
                        warn!(player_id = %player_id, error = %err, "poke not delivered");
                    }
                }
                Ok(ClientMessage::Identification { .. }) => {
                    warn!(player_id = %player_id, "ignoring duplicate identification message");
                }
                Ok(ClientMessage::Unknown) => {
                    warn!(player_id = %player_id, "ignoring unknown message type");
                }
                Err(err) => {
                    warn!(player_id = %player_id, error = %err, "failed to parse client message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(player_id = %player_id, "client closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(player_id = %player_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.rooms().leave(connection_id, &rooms);
    info!(player_id = %player_id, connection_id = %connection_id, "client disconnected");

    // Leaving the rooms dropped the last event sender, so the forwarder winds down.
    let _ = forward_task.await;
    finalize(writer_task, outbound_tx).await;
}

/// Parse the first frame and verify it carries a player credential.
fn identify(state: &SharedState, text: &str) -> Result<(Identity, Uuid), String> {
    let identity = match ClientMessage::from_json_str(text) {
        Ok(ClientMessage::Identification { token }) => state
            .identity()
            .authenticate(&token)
            .map_err(|err| err.to_string())?,
        Ok(_) => return Err("first message was not identification".into()),
        Err(err) => return Err(format!("failed to parse identification: {err}")),
    };
    let player_id = identity.player_id().map_err(|err| err.to_string())?;
    Ok((identity, player_id))
}

/// Subscribe an identified connection to its game room and its own player room.
fn join_connection(
    state: &SharedState,
    connection_id: ConnectionId,
    identity: &Identity,
    player_id: Uuid,
    events_tx: mpsc::UnboundedSender<ServerEvent>,
) -> [Room; 2] {
    let rooms = [Room::Game(identity.game_id), Room::Player(player_id)];
    state.rooms().join(connection_id, &rooms, events_tx);
    rooms
}

/// Forward a poke to `to`, provided they play in the sender's game.
async fn handle_poke(
    state: &SharedState,
    identity: &Identity,
    from: Uuid,
    to: Uuid,
) -> Result<(), SocketError> {
    let store = state.require_game_store().await?;
    let (sender, target) = state
        .with_store_timeout(async {
            let sender = store.find_player(from).await?;
            let target = store.find_player(to).await?;
            Ok::<_, ServiceError>((sender, target))
        })
        .await?;

    let Some(target) = target.filter(|player| player.game_id == identity.game_id) else {
        return Err(SocketError::UnknownTarget(to));
    };
    let nickname = sender.map(|player| player.nickname).unwrap_or_default();
    let delivered = events::send_poke(state, from, target.id, &nickname);
    info!(from = %from, to = %to, delivered, "poke");
    Ok(())
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        services::test_support::{TestGame, join_as, join_host, test_state, token_for},
        state::game::GameType,
    };

    fn identification(token: &str) -> String {
        json!({"type": "identification", "token": token}).to_string()
    }

    #[tokio::test]
    async fn identification_requires_a_player_credential() {
        let state = test_state().await;
        let game = TestGame::create(&state, GameType::Name).await;
        let host = join_host(&state, &game, "ada").await;

        let (identity, player_id) =
            identify(&state, &identification(&token_for(&state, &host))).unwrap();
        assert_eq!(identity.game_id, game.id);
        assert_eq!(player_id, host.player_id().unwrap());

        let creator_token = state
            .identity()
            .issue_game_token(game.id, std::time::SystemTime::now())
            .unwrap();
        assert!(identify(&state, &identification(&creator_token)).is_err());
        assert!(identify(&state, &identification("not-a-token")).is_err());
        let poke = json!({"type": "poke", "to": Uuid::nil()}).to_string();
        assert!(identify(&state, &poke).is_err());
        assert!(identify(&state, "garbage").is_err());
    }

    #[tokio::test]
    async fn identified_connection_joins_game_and_player_rooms() {
        let state = test_state().await;
        let game = TestGame::create(&state, GameType::Name).await;
        let host = join_host(&state, &game, "ada").await;
        let (identity, player_id) =
            identify(&state, &identification(&token_for(&state, &host))).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection_id = Uuid::new_v4();
        let rooms = join_connection(&state, connection_id, &identity, player_id, tx);
        assert_eq!(rooms, [Room::Game(game.id), Room::Player(player_id)]);

        let event = ServerEvent::json("test.game", &json!({})).unwrap();
        assert_eq!(state.rooms().broadcast(Room::Game(game.id), &event), 1);
        let event = ServerEvent::json("test.player", &json!({})).unwrap();
        assert_eq!(state.rooms().broadcast(Room::Player(player_id), &event), 1);
        assert_eq!(rx.try_recv().unwrap().event, "test.game");
        assert_eq!(rx.try_recv().unwrap().event, "test.player");

        state.rooms().leave(connection_id, &rooms);
        assert_eq!(state.rooms().broadcast(Room::Game(game.id), &event), 0);
    }

    #[tokio::test]
    async fn poke_across_games_is_dropped() {
        let state = test_state().await;
        let game = TestGame::create(&state, GameType::Name).await;
        let ada = join_host(&state, &game, "ada").await;
        let bob = join_as(&state, &game, "bob").await;
        let other = TestGame::create(&state, GameType::Name).await;
        let stranger = join_host(&state, &other, "eve").await;
        let stranger_id = stranger.player_id().unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        join_connection(&state, Uuid::new_v4(), &stranger, stranger_id, tx);

        let ada_id = ada.player_id().unwrap();
        let err = handle_poke(&state, &ada, ada_id, stranger_id)
            .await
            .unwrap_err();
        assert!(matches!(err, SocketError::UnknownTarget(id) if id == stranger_id));
        assert!(rx.try_recv().is_err());

        let bob_id = bob.player_id().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        join_connection(&state, Uuid::new_v4(), &bob, bob_id, tx);
        handle_poke(&state, &ada, ada_id, bob_id).await.unwrap();
        assert_eq!(rx.try_recv().unwrap().event, crate::services::events::EVENT_POKE);
    }
}
