use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::PreferenceEntity;

/// Stored shape of a preference inside the `mvp_player_preferences` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPreferenceDocument {
    #[serde(rename = "_id")]
    id: i64,
    reward_name: Option<String>,
    reward_sound: Option<String>,
    updated_at: DateTime,
}

impl From<PreferenceEntity> for MongoPreferenceDocument {
    fn from(value: PreferenceEntity) -> Self {
        Self {
            id: player_key(value.player_id),
            reward_name: value.reward_name,
            reward_sound: value.reward_sound,
            updated_at: DateTime::now(),
        }
    }
}

impl From<MongoPreferenceDocument> for PreferenceEntity {
    fn from(value: MongoPreferenceDocument) -> Self {
        Self {
            player_id: value.id as u64,
            reward_name: value.reward_name,
            reward_sound: value.reward_sound,
        }
    }
}

/// BSON has no unsigned 64-bit integer; ids are stored bit-preserving as `i64`.
fn player_key(player_id: u64) -> i64 {
    player_id as i64
}

/// Filter selecting `player_id`'s document.
pub fn doc_id(player_id: u64) -> Document {
    doc! {"_id": player_key(player_id)}
}
