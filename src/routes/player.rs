use axum::{
    Json, Router,
    extract::State,
    routing::{get, patch, post, put},
};
use axum_valid::Valid;

use crate::{
    auth::extractor::Authenticated,
    dto::{
        entry::{EntryResponse, SubmitNameRequest, SubmitStoryRequest},
        game::{PlayerSummary, UpdatePlayerRequest},
    },
    error::AppError,
    services::{game_service, submission_service},
    state::SharedState,
};

/// Routes acting as the player behind the bearer credential.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/players/me", patch(update_player))
        .route("/players/me/entry", get(get_own_entry))
        .route("/players/me/name", put(submit_name))
        .route("/players/me/story", post(submit_story))
}

#[utoipa::path(
    patch,
    path = "/players/me",
    tag = "player",
    request_body = UpdatePlayerRequest,
    responses(
        (status = 200, description = "Player renamed", body = PlayerSummary),
        (status = 409, description = "Game already started or nickname taken")
    ),
    security(("bearer" = []))
)]
/// Change the caller's nickname while the game is still gathering players.
pub async fn update_player(
    State(state): State<SharedState>,
    Authenticated(identity): Authenticated,
    Valid(Json(payload)): Valid<Json<UpdatePlayerRequest>>,
) -> Result<Json<PlayerSummary>, AppError> {
    Ok(Json(
        game_service::update_player(&state, &identity, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/players/me/entry",
    tag = "player",
    responses((status = 200, description = "Caller's entry", body = EntryResponse)),
    security(("bearer" = []))
)]
/// Caller's entry, with the next hint for STORY games.
pub async fn get_own_entry(
    State(state): State<SharedState>,
    Authenticated(identity): Authenticated,
) -> Result<Json<EntryResponse>, AppError> {
    Ok(Json(game_service::get_own_entry(&state, &identity).await?))
}

#[utoipa::path(
    put,
    path = "/players/me/name",
    tag = "player",
    request_body = SubmitNameRequest,
    responses(
        (status = 200, description = "Name stored", body = EntryResponse),
        (status = 409, description = "Wrong phase or game type")
    ),
    security(("bearer" = []))
)]
/// Submit or replace the caller's name in a NAME game.
pub async fn submit_name(
    State(state): State<SharedState>,
    Authenticated(identity): Authenticated,
    Valid(Json(payload)): Valid<Json<SubmitNameRequest>>,
) -> Result<Json<EntryResponse>, AppError> {
    Ok(Json(
        submission_service::submit_name(&state, &identity, payload).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/players/me/story",
    tag = "player",
    request_body = SubmitStoryRequest,
    responses(
        (status = 200, description = "Round value stored", body = EntryResponse),
        (status = 409, description = "Wrong phase, wrong game type or ahead of the table")
    ),
    security(("bearer" = []))
)]
/// Append the caller's value for their next story round.
pub async fn submit_story(
    State(state): State<SharedState>,
    Authenticated(identity): Authenticated,
    Valid(Json(payload)): Valid<Json<SubmitStoryRequest>>,
) -> Result<Json<EntryResponse>, AppError> {
    Ok(Json(
        submission_service::submit_story(&state, &identity, payload).await?,
    ))
}
