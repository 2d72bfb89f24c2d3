use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::{catalog::CatalogDocument, format_system_time},
    state::{CatalogSnapshot, preferences::PlayerPreference},
};

/// Catalog currently served, in file shape, with the time it was installed.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResponse {
    /// Catalog content.
    #[serde(flatten)]
    pub catalog: CatalogDocument,
    /// RFC 3339 timestamp.
    pub loaded_at: String,
}

impl From<&CatalogSnapshot> for CatalogResponse {
    fn from(snapshot: &CatalogSnapshot) -> Self {
        Self {
            catalog: CatalogDocument::from(snapshot.catalog.as_ref()),
            loaded_at: format_system_time(snapshot.loaded_at),
        }
    }
}

/// Reward selection of one player.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceResponse {
    /// Decimal string, since 64-bit ids do not survive JavaScript numbers.
    pub player_id: String,
    /// Display name of the selected reward.
    pub reward_name: Option<String>,
    /// Sound of the selected reward.
    pub reward_sound: Option<String>,
    /// Changed in memory and not yet persisted.
    pub dirty: bool,
}

impl PreferenceResponse {
    /// View of `preference`; `dirty` comes from the cache entry.
    pub fn new(preference: PlayerPreference, dirty: bool) -> Self {
        Self {
            player_id: preference.player_id.to_string(),
            reward_name: preference.reward_name,
            reward_sound: preference.reward_sound,
            dirty,
        }
    }
}
