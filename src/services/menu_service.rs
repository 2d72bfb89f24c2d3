//! Preference menu: access rules, the per-player menu view and selection handling.

use tracing::{debug, info};

use crate::{
    config::{AppConfig, render_award},
    dto::ws::{
        CurrentSelection, HostEffect, MenuAction, MenuCategory, MenuReward, MenuSelection,
        MenuView,
    },
    state::{
        catalog::{Category, Reward, RewardCatalog},
        preferences::PreferenceCache,
        roster::{CapabilityCheck, PlayerInfo},
    },
};

/// A category is open when it lists no flags or the player holds any of them.
pub fn category_accessible(
    caps: &dyn CapabilityCheck,
    player: &PlayerInfo,
    category: &Category,
) -> bool {
    category.access_flags.is_empty() || caps.has_any(player, &category.access_flags)
}

/// A reward is open to the player it is reserved for, to holders of any of its flags, or to
/// everyone when it has neither a reservation nor flags.
pub fn reward_accessible(caps: &dyn CapabilityCheck, player: &PlayerInfo, reward: &Reward) -> bool {
    if reward.restrict_to_player_id == Some(player.id) {
        return true;
    }
    if !reward.required_flags.is_empty() {
        return caps.has_any(player, &reward.required_flags);
    }
    reward.restrict_to_player_id.is_none()
}

/// Menu of everything `player` may pick, or `None` when nothing is accessible.
pub fn build_menu(
    caps: &dyn CapabilityCheck,
    catalog: &RewardCatalog,
    preferences: &PreferenceCache,
    player: &PlayerInfo,
) -> Option<MenuView> {
    let current = match preferences.get(player.id) {
        (Some(name), Some(sound)) if !name.is_empty() && !sound.is_empty() => {
            Some(CurrentSelection { name, sound })
        }
        _ => None,
    };

    let categories: Vec<MenuCategory> = catalog
        .categories
        .iter()
        .filter(|(_, category)| category_accessible(caps, player, category))
        .filter_map(|(name, category)| {
            let rewards: Vec<MenuReward> = category
                .rewards
                .values()
                .filter(|reward| reward_accessible(caps, player, reward))
                .map(|reward| MenuReward {
                    key: reward.key.clone(),
                    name: reward.display_name.clone(),
                    preview_enabled: reward.preview_enabled,
                    equipped: current.as_ref().is_some_and(|current| {
                        current.name == reward.display_name && current.sound == reward.sound_id
                    }),
                })
                .collect();
            (!rewards.is_empty()).then(|| MenuCategory {
                name: name.clone(),
                rewards,
            })
        })
        .collect();

    if categories.is_empty() {
        return None;
    }
    Some(MenuView {
        current,
        categories,
    })
}

/// Effects answering a menu command.
pub fn open_menu(
    config: &AppConfig,
    caps: &dyn CapabilityCheck,
    catalog: &RewardCatalog,
    preferences: &PreferenceCache,
    player: &PlayerInfo,
) -> Vec<HostEffect> {
    match build_menu(caps, catalog, preferences, player) {
        Some(menu) => vec![HostEffect::ShowMenu {
            player_id: player.id,
            menu,
        }],
        None => vec![HostEffect::PrintChat {
            player_id: player.id,
            message: config.messages.chat_line(&config.messages.unavailable),
        }],
    }
}

/// Apply a menu selection after re-checking it against the catalog and access rules.
pub fn apply_selection(
    config: &AppConfig,
    caps: &dyn CapabilityCheck,
    catalog: &RewardCatalog,
    preferences: &PreferenceCache,
    player: &PlayerInfo,
    selection: &MenuSelection,
) -> Vec<HostEffect> {
    let messages = &config.messages;
    let chat = |text: String| HostEffect::PrintChat {
        player_id: player.id,
        message: messages.chat_line(&text),
    };

    if selection.action == MenuAction::Remove {
        preferences.remove(player.id);
        info!(player_id = player.id, "MVP selection removed");
        return vec![chat(messages.removed.clone())];
    }

    let target = selection
        .category
        .as_deref()
        .zip(selection.reward.as_deref())
        .and_then(|(category, key)| catalog.reward(category, key))
        .filter(|(category, reward)| {
            category_accessible(caps, player, category) && reward_accessible(caps, player, reward)
        });
    let Some((_, reward)) = target else {
        debug!(player_id = player.id, ?selection, "rejected menu selection");
        return vec![chat(messages.unavailable.clone())];
    };

    match selection.action {
        MenuAction::Equip => {
            preferences.set(
                player.id,
                reward.display_name.clone(),
                reward.sound_id.clone(),
            );
            info!(player_id = player.id, reward = %reward.key, "MVP equipped");
            vec![chat(render_award(
                &messages.equipped,
                &player.name,
                &reward.display_name,
            ))]
        }
        MenuAction::Preview if reward.preview_enabled => vec![
            HostEffect::PlaySound {
                player_id: player.id,
                sound: reward.sound_id.clone(),
            },
            chat(render_award(
                &messages.previewed,
                &player.name,
                &reward.display_name,
            )),
        ],
        MenuAction::Preview | MenuAction::Remove => vec![chat(messages.unavailable.clone())],
    }
}
