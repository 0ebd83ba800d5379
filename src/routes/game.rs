use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    auth::extractor::{Authenticated, MaybeAuthenticated},
    dto::game::{
        CreateGameRequest, CreatedGameResponse, GameSummary, JoinGameRequest, JoinGameResponse,
        PlayerProgress, RevealedName, StoryArchiveEntry,
    },
    error::AppError,
    services::game_service,
    state::SharedState,
};

/// Routes addressing a game: lifecycle, roster and results.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", post(create_game))
        .route("/games/{id}", get(get_game))
        .route("/games/code/{code}", get(get_game_by_code))
        .route("/games/{id}/players", get(list_players).post(join_game))
        .route("/games/{id}/start", post(start_game))
        .route("/games/{id}/end", post(end_game))
        .route("/games/{id}/recreate", post(recreate_game))
        .route("/games/{id}/names", get(reveal_names))
        .route("/games/{id}/stories", get(story_archive))
}

/// Create a game and receive the creator credential.
#[utoipa::path(
    post,
    path = "/games",
    tag = "game",
    request_body = CreateGameRequest,
    responses(
        (status = 201, description = "Game created", body = CreatedGameResponse)
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Json(payload): Json<CreateGameRequest>,
) -> Result<(StatusCode, Json<CreatedGameResponse>), AppError> {
    let created = game_service::create_game(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "game",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Game found", body = GameSummary),
        (status = 404, description = "Unknown game")
    )
)]
/// Fetch a game summary by id.
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameSummary>, AppError> {
    Ok(Json(game_service::get_game(&state, id).await?))
}

/// Look a game up by join code, case-insensitively.
#[utoipa::path(
    get,
    path = "/games/code/{code}",
    tag = "game",
    params(("code" = String, Path, description = "Join code")),
    responses(
        (status = 200, description = "Game found", body = GameSummary),
        (status = 404, description = "No game with this code")
    )
)]
pub async fn get_game_by_code(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<GameSummary>, AppError> {
    Ok(Json(game_service::get_game_by_code(&state, &code).await?))
}

#[utoipa::path(
    get,
    path = "/games/{id}/players",
    tag = "game",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses((status = 200, description = "Roster", body = [PlayerProgress]))
)]
/// Roster with per-player progress; values stay hidden.
pub async fn list_players(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PlayerProgress>>, AppError> {
    Ok(Json(game_service::list_players(&state, id).await?))
}

/// Join a game. The first join sending the creator credential as bearer becomes host.
#[utoipa::path(
    post,
    path = "/games/{id}/players",
    tag = "game",
    params(("id" = Uuid, Path, description = "Game identifier")),
    request_body = JoinGameRequest,
    responses(
        (status = 201, description = "Player joined", body = JoinGameResponse),
        (status = 409, description = "Game already started or nickname taken")
    )
)]
pub async fn join_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    MaybeAuthenticated(caller): MaybeAuthenticated,
    Valid(Json(payload)): Valid<Json<JoinGameRequest>>,
) -> Result<(StatusCode, Json<JoinGameResponse>), AppError> {
    let joined = game_service::join_game(&state, id, payload, caller).await?;
    Ok((StatusCode::CREATED, Json(joined)))
}

#[utoipa::path(
    post,
    path = "/games/{id}/start",
    tag = "game",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Game started", body = GameSummary),
        (status = 403, description = "Caller is not host")
    ),
    security(("bearer" = []))
)]
/// Host opens the PLAY phase.
pub async fn start_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Authenticated(identity): Authenticated,
) -> Result<Json<GameSummary>, AppError> {
    Ok(Json(game_service::start_game(&state, &identity, id).await?))
}

/// Hide the results of a NAME game.
#[utoipa::path(
    post,
    path = "/games/{id}/end",
    tag = "game",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Game ended", body = GameSummary),
        (status = 403, description = "Caller is not host")
    ),
    security(("bearer" = []))
)]
pub async fn end_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Authenticated(identity): Authenticated,
) -> Result<Json<GameSummary>, AppError> {
    Ok(Json(game_service::end_game(&state, &identity, id).await?))
}

/// Start a follow-up game of the same type.
#[utoipa::path(
    post,
    path = "/games/{id}/recreate",
    tag = "game",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 201, description = "Game recreated", body = CreatedGameResponse),
        (status = 403, description = "Caller is not host")
    ),
    security(("bearer" = []))
)]
pub async fn recreate_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Authenticated(identity): Authenticated,
) -> Result<(StatusCode, Json<CreatedGameResponse>), AppError> {
    let created = game_service::recreate_game(&state, &identity, id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/games/{id}/names",
    tag = "results",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses((status = 200, description = "Names in reveal order", body = [RevealedName]))
)]
/// Submitted names, highest order first.
pub async fn reveal_names(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<RevealedName>>, AppError> {
    Ok(Json(game_service::reveal_names(&state, id).await?))
}

#[utoipa::path(
    get,
    path = "/games/{id}/stories",
    tag = "results",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses((status = 200, description = "Assembled stories", body = [StoryArchiveEntry]))
)]
/// Assembled story of every player.
pub async fn story_archive(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<StoryArchiveEntry>>, AppError> {
    Ok(Json(game_service::story_archive(&state, id).await?))
}
