use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Catalog file and wire documents.
pub mod catalog;
/// Healthcheck payloads.
pub mod health;
/// Public HTTP payloads.
pub mod public;
/// Lenient JSON parsing shared by config and catalog files.
pub mod tolerant;
/// Field validators for inbound messages.
pub mod validation;
/// Host bridge WebSocket messages.
pub mod ws;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
