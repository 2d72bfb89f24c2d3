//! Messages exchanged with the game server over the `/ws` host bridge.

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, PickFirst, serde_as};
use thiserror::Error;
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dto::validation::{validate_command_name, validate_display_name, validate_player_id},
    state::roster::PlayerInfo,
};

/// Error raised when an inbound frame cannot be turned into a [`HostInbound`].
#[derive(Debug, Error)]
pub enum InboundError {
    /// The frame is not JSON of a known message shape.
    #[error("malformed host message: {0}")]
    Parse(#[from] serde_json::Error),
    /// The message parsed but carries invalid fields.
    #[error("invalid host message: {0}")]
    Invalid(#[from] ValidationErrors),
}

#[serde_as]
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, PartialEq)]
/// Events reported by the game server.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostInbound {
    /// First frame of every connection.
    Hello {
        /// Name the game server goes by, for logs.
        server: String,
    },
    /// A player joined, or the host replays a player after reconnecting.
    PlayerConnected {
        /// Who joined.
        player: PlayerPayload,
    },
    /// A player left the server.
    #[serde(rename_all = "camelCase")]
    PlayerDisconnected {
        /// Player who left.
        #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
        #[schema(value_type = u64)]
        player_id: u64,
    },
    /// A new round started.
    RoundStart,
    /// The host named the MVP of the round that just ended.
    #[serde(rename_all = "camelCase")]
    RoundMvp {
        /// Awarded player.
        #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
        #[schema(value_type = u64)]
        player_id: u64,
    },
    /// The match is over.
    MatchEnd,
    /// Chat command typed by a player, without its leading `!` or `css_` prefix.
    #[serde(rename_all = "camelCase")]
    Command {
        /// Player who typed the command.
        #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
        #[schema(value_type = u64)]
        player_id: u64,
        /// Command name.
        command: String,
        /// Words following the command.
        #[serde(default)]
        args: Vec<String>,
    },
    /// Option picked in a menu previously sent with [`HostEffect::ShowMenu`].
    #[serde(rename_all = "camelCase")]
    MenuSelect {
        /// Player who picked the option.
        #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
        #[schema(value_type = u64)]
        player_id: u64,
        /// The picked option.
        selection: MenuSelection,
    },
}

#[serde_as]
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
/// Player description attached to `player_connected`.
pub struct PlayerPayload {
    /// 64-bit platform id; accepted as a number or a decimal string.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[schema(value_type = u64)]
    pub id: u64,
    /// In-game name.
    pub name: String,
    /// Controlled by the server.
    #[serde(default)]
    pub bot: bool,
    /// Watching without playing.
    #[serde(default)]
    pub spectator: bool,
    /// Admin flags the host grants the player.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl From<PlayerPayload> for PlayerInfo {
    fn from(value: PlayerPayload) -> Self {
        Self {
            id: value.id,
            name: value.name,
            bot: value.bot,
            spectator: value.spectator,
            capabilities: value.capabilities,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// What a player asked for in the menu.
pub enum MenuAction {
    /// Make the reward the player's MVP reward.
    Equip,
    /// Play the reward's sound to the player only.
    Preview,
    /// Clear the player's reward.
    Remove,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
/// Menu option chosen by a player. `category` and `reward` are required for equip and preview.
pub struct MenuSelection {
    /// What to do.
    pub action: MenuAction,
    /// Category name of the target reward.
    #[serde(default)]
    pub category: Option<String>,
    /// Key of the target reward.
    #[serde(default)]
    pub reward: Option<String>,
}

impl Validate for HostInbound {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut check = |field: &'static str, outcome: Result<(), ValidationError>| {
            if let Err(err) = outcome {
                errors.add(field, err);
            }
        };

        match self {
            HostInbound::Hello { server } => check("server", validate_display_name(server)),
            HostInbound::PlayerConnected { player } => {
                check("id", validate_player_id(player.id));
                check("name", validate_display_name(&player.name));
            }
            HostInbound::PlayerDisconnected { player_id } | HostInbound::RoundMvp { player_id } => {
                check("playerId", validate_player_id(*player_id))
            }
            HostInbound::Command {
                player_id, command, ..
            } => {
                check("playerId", validate_player_id(*player_id));
                check("command", validate_command_name(command));
            }
            HostInbound::MenuSelect {
                player_id,
                selection,
            } => {
                check("playerId", validate_player_id(*player_id));
                let needs_target = matches!(selection.action, MenuAction::Equip | MenuAction::Preview);
                let has_target = selection.category.as_deref().is_some_and(|c| !c.is_empty())
                    && selection.reward.as_deref().is_some_and(|r| !r.is_empty());
                if needs_target && !has_target {
                    let mut err = ValidationError::new("selection_target");
                    err.message = Some("Equip and preview need a category and a reward".into());
                    check("selection", Err(err));
                }
            }
            HostInbound::RoundStart | HostInbound::MatchEnd => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl HostInbound {
    /// Parse and validate a text frame.
    pub fn from_json_str(text: &str) -> Result<Self, InboundError> {
        let message: Self = serde_json::from_str(text)?;
        message.validate()?;
        Ok(message)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, PartialEq)]
/// Instructions the game server executes on its main thread.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEffect {
    /// Play `sound` to one player, originating from that player.
    #[serde(rename_all = "camelCase")]
    PlaySound {
        /// Listener.
        player_id: u64,
        /// Sound event name.
        sound: String,
    },
    /// Print a chat line to one player.
    #[serde(rename_all = "camelCase")]
    PrintChat {
        /// Recipient.
        player_id: u64,
        /// Text, prefix included.
        message: String,
    },
    /// Show plain text in the center of one player's screen.
    #[serde(rename_all = "camelCase")]
    PrintCenter {
        /// Recipient.
        player_id: u64,
        /// Text to show.
        message: String,
    },
    /// Show the alert banner to one player.
    #[serde(rename_all = "camelCase")]
    PrintAlert {
        /// Recipient.
        player_id: u64,
        /// Text to show.
        message: String,
    },
    /// Draw the HTML center panel for one player, for a single frame.
    #[serde(rename_all = "camelCase")]
    PrintCenterHtml {
        /// Recipient.
        player_id: u64,
        /// Markup to draw.
        html: String,
    },
    /// Zero the host's own MVP counter for the player.
    #[serde(rename_all = "camelCase")]
    ResetMvpCount {
        /// Awarded player.
        player_id: u64,
    },
    /// Swallow the host's built-in MVP announcement for this award.
    #[serde(rename_all = "camelCase")]
    SuppressDefaultBroadcast {
        /// Awarded player.
        player_id: u64,
    },
    /// Open the preference menu for one player.
    #[serde(rename_all = "camelCase")]
    ShowMenu {
        /// Player who asked for the menu.
        player_id: u64,
        /// Menu content.
        menu: MenuView,
    },
    /// Sounds that must be loaded before they can be played.
    PrecacheSounds {
        /// Every sound of the installed catalog.
        sounds: Vec<String>,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
/// Preference menu as seen by one player: the current selection and what they may pick.
pub struct MenuView {
    /// Equipped reward, if any.
    pub current: Option<CurrentSelection>,
    /// Categories with at least one reward the player may pick.
    pub categories: Vec<MenuCategory>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
/// Reward a player currently has equipped.
pub struct CurrentSelection {
    /// Display name of the reward.
    pub name: String,
    /// Sound of the reward.
    pub sound: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
/// Category entry of a [`MenuView`].
pub struct MenuCategory {
    /// Category name.
    pub name: String,
    /// Rewards the player may pick, in catalog order.
    pub rewards: Vec<MenuReward>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
/// Reward entry of a [`MenuCategory`].
pub struct MenuReward {
    /// Catalog key, sent back in [`MenuSelection::reward`].
    pub key: String,
    /// Display name.
    pub name: String,
    /// Whether a preview may be requested.
    pub preview_enabled: bool,
    /// Whether this is the player's current reward.
    pub equipped: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Acknowledgement sent to the host after a valid `hello`.
pub struct HostAck {
    /// Always `ok`.
    pub status: String,
    /// Version of the catalog currently installed.
    pub catalog_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_player_connected_with_string_id() {
        let message = HostInbound::from_json_str(
            r#"{"type":"player_connected","player":{"id":"76561198000000001","name":"alice","capabilities":["@css/vip"]}}"#,
        )
        .unwrap();
        let HostInbound::PlayerConnected { player } = message else {
            panic!("unexpected variant");
        };
        assert_eq!(player.id, 76561198000000001);
        assert!(!player.bot);
        assert_eq!(player.capabilities, ["@css/vip"]);
    }

    #[test]
    fn parses_unit_and_camel_case_variants() {
        assert_eq!(
            HostInbound::from_json_str(r#"{"type":"round_start"}"#).unwrap(),
            HostInbound::RoundStart
        );
        assert_eq!(
            HostInbound::from_json_str(r#"{"type":"round_mvp","playerId":7}"#).unwrap(),
            HostInbound::RoundMvp { player_id: 7 }
        );
    }

    #[test]
    fn rejects_invalid_messages() {
        assert!(matches!(
            HostInbound::from_json_str(r#"{"type":"round_mvp","playerId":0}"#),
            Err(InboundError::Invalid(_))
        ));
        assert!(matches!(
            HostInbound::from_json_str(r#"{"type":"hello","server":""}"#),
            Err(InboundError::Invalid(_))
        ));
        assert!(matches!(
            HostInbound::from_json_str(r#"{"type":"command","playerId":1,"command":""}"#),
            Err(InboundError::Invalid(_))
        ));
        assert!(matches!(
            HostInbound::from_json_str(
                r#"{"type":"menu_select","playerId":1,"selection":{"action":"equip"}}"#
            ),
            Err(InboundError::Invalid(_))
        ));
        assert!(matches!(
            HostInbound::from_json_str(r#"{"type":"teleport"}"#),
            Err(InboundError::Parse(_))
        ));
    }

    #[test]
    fn remove_selection_needs_no_target() {
        let message = HostInbound::from_json_str(
            r#"{"type":"menu_select","playerId":1,"selection":{"action":"remove"}}"#,
        )
        .unwrap();
        assert!(matches!(message, HostInbound::MenuSelect { .. }));
    }

    #[test]
    fn effects_serialize_with_snake_case_tags_and_camel_case_fields() {
        let effect = HostEffect::PrintCenterHtml {
            player_id: 1,
            html: "<b>x</b>".into(),
        };
        assert_eq!(
            serde_json::to_value(&effect).unwrap(),
            serde_json::json!({"type": "print_center_html", "playerId": 1, "html": "<b>x</b>"})
        );
    }
}
