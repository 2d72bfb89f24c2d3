//! Service helpers that expose read-only projections of the catalog and cached preferences.

use crate::{
    dto::{
        public::{CatalogResponse, PreferenceResponse},
        validation::validate_player_id,
    },
    error::ServiceError,
    state::{SharedState, preferences::PlayerPreference},
};

/// Return the catalog currently in effect.
pub fn get_catalog(state: &SharedState) -> CatalogResponse {
    CatalogResponse::from(&state.catalog_snapshot())
}

/// Return a player's selection, loading it from storage on a cache miss.
pub async fn get_preference(
    state: &SharedState,
    player_id: u64,
) -> Result<PreferenceResponse, ServiceError> {
    validate_player_id(player_id)
        .map_err(|_| ServiceError::InvalidInput("player id must be non-zero".into()))?;

    let preferences = state.preferences();
    let preference = if preferences.contains(player_id) {
        let (reward_name, reward_sound) = preferences.get(player_id);
        PlayerPreference {
            player_id,
            reward_name,
            reward_sound,
        }
    } else {
        let store = state.require_preference_store().await?;
        preferences.get_or_load(store.as_ref(), player_id).await?
    };

    Ok(PreferenceResponse::new(
        preference,
        preferences.is_dirty(player_id),
    ))
}
