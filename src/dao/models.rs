use serde::{Deserialize, Serialize};

/// Persisted MVP preference of a single player, one record per player ever seen.
///
/// Both fields are nullable: clearing a preference writes two nulls instead of deleting the row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreferenceEntity {
    /// 64-bit platform identifier of the player.
    pub player_id: u64,
    /// Display name of the selected reward.
    pub reward_name: Option<String>,
    /// Sound identifier of the selected reward.
    pub reward_sound: Option<String>,
}

impl PreferenceEntity {
    /// Record with both fields unset.
    pub fn empty(player_id: u64) -> Self {
        Self {
            player_id,
            reward_name: None,
            reward_sound: None,
        }
    }
}
