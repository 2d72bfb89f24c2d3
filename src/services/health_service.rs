use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report storage health, the served catalog version and how many preferences await a flush.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_preference_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let version = state.catalog().version.clone();
    let dirty = state.preferences().dirty_count();
    if state.is_degraded().await {
        HealthResponse::degraded(version, dirty)
    } else {
        HealthResponse::ok(version, dirty)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::preference_store::memory::MemoryStore,
        services::catalog_service::CatalogSynchronizer,
        state::{AppState, catalog::RewardCatalog},
    };

    #[tokio::test]
    async fn reports_degraded_until_a_store_is_installed() {
        let mut config = AppConfig::default();
        config.settings.catalog_url = String::new();
        let synchronizer = CatalogSynchronizer::from_config(&config);
        let (state, _events) =
            AppState::new(config, synchronizer, RewardCatalog::builtin_default());
        state.preferences().set(1, "Ace".into(), "MVP.002_ace".into());

        let health = health_status(&state).await;
        assert_eq!(health.status, "degraded");
        assert_eq!(health.catalog_version, "1.0.0");
        assert_eq!(health.dirty_preferences, 1);

        state
            .set_preference_store(Arc::new(MemoryStore::default()))
            .await;
        assert_eq!(health_status(&state).await.status, "ok");
    }
}
