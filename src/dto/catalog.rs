//! On-disk and over-the-wire shape of the reward catalog.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{NoneAsEmptyString, serde_as};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    dto::tolerant::{self, field_mut, fold_keys, for_each_entry},
    state::catalog::{Category, MessageToggles, Reward, RewardCatalog},
};

const CATALOG_KEYS: &[(&str, &str)] = &[
    ("version", "version"),
    ("categories", "categories"),
    ("mvpsettings", "categories"),
];

const CATEGORY_KEYS: &[(&str, &str)] = &[
    ("flags", "flags"),
    ("categoryflags", "flags"),
    ("rewards", "rewards"),
    ("mvps", "rewards"),
];

const REWARD_KEYS: &[(&str, &str)] = &[
    ("name", "name"),
    ("mvpname", "name"),
    ("sound", "sound"),
    ("mvpsound", "sound"),
    ("previewenabled", "previewEnabled"),
    ("enablepreview", "previewEnabled"),
    ("showchatmessage", "showChatMessage"),
    ("showcentermessage", "showCenterMessage"),
    ("showalertmessage", "showAlertMessage"),
    ("showhtmlmessage", "showHtmlMessage"),
    ("steamid", "steamId"),
    ("flags", "flags"),
];

/// Failure to turn catalog text into a [`RewardCatalog`].
#[derive(Debug, Error)]
pub enum CatalogParseError {
    /// The text is not JSON, even leniently.
    #[error("catalog is not valid JSON")]
    Syntax(#[from] json5::Error),
    /// The JSON does not have the catalog shape.
    #[error("catalog has an unexpected shape")]
    Shape(#[from] serde_json::Error),
}

/// Root of a catalog document.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDocument {
    /// Catalog version, compared numerically when both sides parse.
    #[serde(default = "default_version")]
    pub version: String,
    /// Categories by name, in file order.
    #[serde(default)]
    pub categories: IndexMap<String, CategoryDocument>,
}

/// A category entry of the catalog document.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDocument {
    /// Capabilities of which a player needs one to see the category; empty means everyone.
    #[serde(default)]
    pub flags: Vec<String>,
    /// Rewards by key, in file order.
    #[serde(default)]
    pub rewards: IndexMap<String, RewardDocument>,
}

/// A reward entry of the catalog document.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RewardDocument {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Sound event played on award.
    #[serde(default)]
    pub sound: String,
    /// Whether players may preview the sound.
    #[serde(default = "enabled")]
    pub preview_enabled: bool,
    /// Print the chat line on award.
    #[serde(default = "enabled")]
    pub show_chat_message: bool,
    /// Show the center text on award.
    #[serde(default = "enabled")]
    pub show_center_message: bool,
    /// Show the alert banner on award.
    #[serde(default = "enabled")]
    pub show_alert_message: bool,
    /// Show the HTML panel on award.
    #[serde(default = "enabled")]
    pub show_html_message: bool,
    /// Player the reward is reserved for; the empty string means unrestricted.
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    #[schema(value_type = String)]
    pub steam_id: Option<u64>,
    /// Capabilities of which a player needs one to pick the reward.
    #[serde(default)]
    pub flags: Vec<String>,
}

fn default_version() -> String {
    "1.0.0".to_owned()
}

fn enabled() -> bool {
    true
}

/// Parse catalog text leniently: comments, trailing commas, any key casing and the legacy
/// plugin field names are accepted.
pub fn parse_catalog(text: &str) -> Result<RewardCatalog, CatalogParseError> {
    let mut value = tolerant::parse_value(text)?;
    normalize(&mut value);
    let document: CatalogDocument = serde_json::from_value(value)?;
    Ok(document.into())
}

/// Render a catalog as pretty-printed canonical JSON.
pub fn render_catalog(catalog: &RewardCatalog) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&CatalogDocument::from(catalog))
}

fn normalize(value: &mut Value) {
    fold_keys(value, CATALOG_KEYS);
    let Some(categories) = field_mut(value, "categories") else {
        return;
    };
    for_each_entry(categories, |category| {
        fold_keys(category, CATEGORY_KEYS);
        if let Some(rewards) = field_mut(category, "rewards") {
            for_each_entry(rewards, |reward| fold_keys(reward, REWARD_KEYS));
        }
    });
}

impl From<CatalogDocument> for RewardCatalog {
    fn from(value: CatalogDocument) -> Self {
        let categories = value
            .categories
            .into_iter()
            .map(|(name, category)| {
                let rewards = category
                    .rewards
                    .into_iter()
                    .map(|(key, reward)| {
                        let reward = Reward {
                            key: key.clone(),
                            display_name: reward.name,
                            sound_id: reward.sound,
                            preview_enabled: reward.preview_enabled,
                            messages: MessageToggles {
                                chat: reward.show_chat_message,
                                center: reward.show_center_message,
                                alert: reward.show_alert_message,
                                html: reward.show_html_message,
                            },
                            restrict_to_player_id: reward.steam_id,
                            required_flags: reward.flags,
                        };
                        (key, reward)
                    })
                    .collect();
                (
                    name,
                    Category {
                        access_flags: category.flags,
                        rewards,
                    },
                )
            })
            .collect();

        Self {
            version: value.version,
            categories,
        }
    }
}

impl From<&RewardCatalog> for CatalogDocument {
    fn from(value: &RewardCatalog) -> Self {
        let categories = value
            .categories
            .iter()
            .map(|(name, category)| {
                let rewards = category
                    .rewards
                    .iter()
                    .map(|(key, reward)| {
                        (
                            key.clone(),
                            RewardDocument {
                                name: reward.display_name.clone(),
                                sound: reward.sound_id.clone(),
                                preview_enabled: reward.preview_enabled,
                                show_chat_message: reward.messages.chat,
                                show_center_message: reward.messages.center,
                                show_alert_message: reward.messages.alert,
                                show_html_message: reward.messages.html,
                                steam_id: reward.restrict_to_player_id,
                                flags: reward.required_flags.clone(),
                            },
                        )
                    })
                    .collect();
                (
                    name.clone(),
                    CategoryDocument {
                        flags: category.access_flags.clone(),
                        rewards,
                    },
                )
            })
            .collect();

        Self {
            version: value.version.clone(),
            categories,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_catalog_parses_back_to_an_equal_value() {
        let mut catalog = RewardCatalog::builtin_default();
        let vip = catalog.categories.get_mut("VIP MVP").unwrap();
        let exclusive = vip.rewards.get_mut("mvp.vip.1").unwrap();
        exclusive.restrict_to_player_id = Some(76561198000000042);
        exclusive.required_flags = vec!["#css/donator".into()];

        let text = render_catalog(&catalog).unwrap();
        assert_eq!(parse_catalog(&text).unwrap(), catalog);
    }

    #[test]
    fn legacy_plugin_layout_is_understood() {
        let text = r#"{
            "Version": "2.1.0",
            "MVPSettings": {
                "PUBLIC MVP": {
                    "CategoryFlags": [],
                    "MVPs": {
                        "mvp.1": {
                            "MVPName": "Flawless",
                            "MVPSound": "MVP.001_bamia",
                            "EnablePreview": false,
                            "ShowChatMessage": true,
                            "ShowCenterMessage": false,
                            "ShowAlertMessage": false,
                            "ShowHtmlMessage": true,
                            "SteamID": "",
                            "Flags": [],
                        },
                    },
                },
            },
        }"#;

        let catalog = parse_catalog(text).unwrap();
        assert_eq!(catalog.version, "2.1.0");
        let (_, reward) = catalog.reward("PUBLIC MVP", "mvp.1").unwrap();
        assert_eq!(reward.display_name, "Flawless");
        assert!(!reward.preview_enabled);
        assert!(!reward.messages.center);
        assert!(reward.messages.html);
        assert_eq!(reward.restrict_to_player_id, None);
    }

    #[test]
    fn keys_are_case_insensitive_and_comments_ignored() {
        let text = r#"
            // catalog pushed by the community server
            {
                "VERSION": "1.0.0",
                "CATEGORIES": {
                    "Mixed": {
                        "REWARDS": {
                            "x": { "NAME": "X", "sound": "S.X", "SteamId": "7" }
                        }
                    }
                }
            }"#;
        let catalog = parse_catalog(text).unwrap();
        let (_, reward) = catalog.reward("Mixed", "x").unwrap();
        assert_eq!(reward.sound_id, "S.X");
        assert_eq!(reward.restrict_to_player_id, Some(7));
        assert!(reward.messages.chat);
    }

    #[test]
    fn category_order_is_preserved() {
        let text = r#"{"version":"1.0.0","categories":{"Zeta":{},"Alpha":{},"Mid":{}}}"#;
        let catalog = parse_catalog(text).unwrap();
        let names: Vec<&str> = catalog.categories.keys().map(String::as_str).collect();
        assert_eq!(names, ["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn garbage_is_reported_not_panicked() {
        assert!(matches!(
            parse_catalog("{ not json"),
            Err(CatalogParseError::Syntax(_))
        ));
        assert!(matches!(
            parse_catalog(r#"{"categories": []}"#),
            Err(CatalogParseError::Shape(_))
        ));
    }
}
