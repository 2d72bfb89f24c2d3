use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Version of the catalog currently served.
    pub catalog_version: String,
    /// Preferences changed in memory and not yet persisted.
    pub dirty_preferences: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(catalog_version: String, dirty_preferences: usize) -> Self {
        Self {
            status: "ok".to_string(),
            catalog_version,
            dirty_preferences,
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(catalog_version: String, dirty_preferences: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            catalog_version,
            dirty_preferences,
        }
    }
}
