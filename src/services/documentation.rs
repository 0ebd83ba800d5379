use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Parlor Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
        crate::routes::game::create_game,
        crate::routes::game::get_game,
        crate::routes::game::get_game_by_code,
        crate::routes::game::list_players,
        crate::routes::game::join_game,
        crate::routes::game::start_game,
        crate::routes::game::end_game,
        crate::routes::game::recreate_game,
        crate::routes::game::reveal_names,
        crate::routes::game::story_archive,
        crate::routes::player::update_player,
        crate::routes::player::get_own_entry,
        crate::routes::player::submit_name,
        crate::routes::player::submit_story,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::phase::VisibleGamePhase,
            crate::dto::game::CreateGameRequest,
            crate::dto::game::CreatedGameResponse,
            crate::dto::game::GameSummary,
            crate::dto::game::JoinGameRequest,
            crate::dto::game::JoinGameResponse,
            crate::dto::game::UpdatePlayerRequest,
            crate::dto::game::PlayerSummary,
            crate::dto::game::PlayerProgress,
            crate::dto::game::RevealedName,
            crate::dto::game::StoryArchiveEntry,
            crate::dto::entry::SubmitNameRequest,
            crate::dto::entry::SubmitStoryRequest,
            crate::dto::entry::EntryResponse,
            crate::dto::entry::EntryDto,
            crate::dto::entry::NameEntryDto,
            crate::dto::entry::StoryEntryDto,
            crate::dto::entry::HintDto,
            crate::dto::events::PhaseChangedEvent,
            crate::dto::events::GameRecreatedEvent,
            crate::dto::events::PokeEvent,
            crate::dto::ws::ClientMessage,
            crate::state::game::GameType,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "Game lifecycle and roster"),
        (name = "player", description = "Operations on the calling player"),
        (name = "results", description = "Revealed names and assembled stories"),
        (name = "events", description = "WebSocket event stream"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` scheme referenced by authenticated routes.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
