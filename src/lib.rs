//! Library crate for mvp-anthem-back, exposing modules for binaries and tests.

/// Configuration file loading and defaults.
pub mod config;
/// Persistence: preference stores and catalog sources.
pub mod dao;
/// Wire and HTTP payloads.
pub mod dto;
/// Error types surfaced by services and routes.
pub mod error;
/// HTTP and WebSocket routing.
pub mod routes;
/// Application services, including the game loop.
pub mod services;
/// Shared runtime state.
pub mod state;
