use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for MVP Anthem Back.
///
/// The host bridge messages are listed as schemas; they travel as WebSocket text frames on `/ws`.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::public::get_catalog,
        crate::routes::public::get_preference,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::public::CatalogResponse,
            crate::dto::public::PreferenceResponse,
            crate::dto::catalog::CatalogDocument,
            crate::dto::ws::HostInbound,
            crate::dto::ws::HostEffect,
            crate::dto::ws::HostAck,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "public", description = "Read-only catalog and preference views"),
        (name = "host", description = "WebSocket bridge to the game server"),
    )
)]
/// OpenAPI document of the HTTP and WebSocket surface.
pub struct ApiDoc;
