/// Round MVP announcements.
pub mod award_service;
/// Catalog resolution across the local file, the remote source and the built-in default.
pub mod catalog_service;
/// Chat command parsing and admin catalog jobs.
pub mod command_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Single task owning the roster and the notifier.
pub mod game_loop;
/// Health check service.
pub mod health_service;
/// Preference menu and selections.
pub mod menu_service;
/// Public service for read-only catalog and preference views.
pub mod public_service;
/// Preference store connection supervisor.
pub mod storage_supervisor;
/// Host bridge connection and effect forwarding.
pub mod websocket_service;
