use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Cube Tag Back.
#[openapi(
    paths(crate::routes::health::healthcheck, crate::routes::websocket::ws_handler,),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::dto::ws::PlayerSummary,
            crate::dto::ws::BackgroundSnapshot,
            crate::dto::ws::LobbyKickReason,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "WebSocket operations for game clients"),
    )
)]
pub struct ApiDoc;
