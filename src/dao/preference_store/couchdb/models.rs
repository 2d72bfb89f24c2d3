use serde::{Deserialize, Serialize};

use crate::dao::{models::PreferenceEntity, preference_store::couchdb::error::CouchDaoError};

/// Id prefix separating preference documents from anything else in the database.
pub const PREFERENCE_PREFIX: &str = "preference:";

/// Stored shape of one player's preference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchPreferenceDocument {
    /// `preference:<player id>`.
    #[serde(rename = "_id")]
    pub id: String,
    /// Revision to overwrite; absent for a first write.
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Display name of the selected reward.
    pub reward_name: Option<String>,
    /// Sound identifier of the selected reward.
    pub reward_sound: Option<String>,
}

impl CouchPreferenceDocument {
    /// Document for `preference`, without a revision.
    pub fn from_entity(preference: PreferenceEntity) -> Self {
        Self {
            id: preference_doc_id(preference.player_id),
            rev: None,
            reward_name: preference.reward_name,
            reward_sound: preference.reward_sound,
        }
    }

    /// Map back to a preference, rejecting ids that do not name a player.
    pub fn try_into_entity(self) -> Result<PreferenceEntity, CouchDaoError> {
        let player_id = parse_preference_doc_id(&self.id)?;
        Ok(PreferenceEntity {
            player_id,
            reward_name: self.reward_name,
            reward_sound: self.reward_sound,
        })
    }
}

/// Document id holding `player_id`'s preference.
pub fn preference_doc_id(player_id: u64) -> String {
    format!("{PREFERENCE_PREFIX}{player_id}")
}

fn parse_preference_doc_id(doc_id: &str) -> Result<u64, CouchDaoError> {
    doc_id
        .strip_prefix(PREFERENCE_PREFIX)
        .ok_or_else(|| CouchDaoError::InvalidDocument {
            doc_id: doc_id.to_owned(),
            message: "missing preference prefix".into(),
        })?
        .parse::<u64>()
        .map_err(|err| CouchDaoError::InvalidDocument {
            doc_id: doc_id.to_owned(),
            message: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_round_trips_to_player_id() {
        let doc = CouchPreferenceDocument::from_entity(PreferenceEntity {
            player_id: 76561198000000001,
            reward_name: Some("Ace".into()),
            reward_sound: Some("MVP.002_ace".into()),
        });
        assert_eq!(doc.id, "preference:76561198000000001");
        let entity = doc.try_into_entity().unwrap();
        assert_eq!(entity.player_id, 76561198000000001);
    }

    #[test]
    fn foreign_documents_are_rejected() {
        let doc = CouchPreferenceDocument {
            id: "game::42".into(),
            rev: None,
            reward_name: None,
            reward_sound: None,
        };
        assert!(matches!(
            doc.try_into_entity(),
            Err(CouchDaoError::InvalidDocument { .. })
        ));
    }
}
