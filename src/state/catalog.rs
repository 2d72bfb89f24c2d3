//! Reward catalog: named rewards grouped into access-gated categories.

use indexmap::IndexMap;

/// Immutable snapshot of every reward a player can pick.
///
/// Categories and rewards keep the order in which they were declared; award resolution walks them
/// in that order and stops at the first match.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RewardCatalog {
    /// Version string used to decide whether a remote copy supersedes the local one.
    pub version: String,
    /// Categories keyed by display name.
    pub categories: IndexMap<String, Category>,
}

/// Access-gated grouping of rewards.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Category {
    /// Capability tokens granting access; empty means free for everyone.
    pub access_flags: Vec<String>,
    /// Rewards keyed by their catalog key (e.g. `mvp.1`).
    pub rewards: IndexMap<String, Reward>,
}

/// A selectable cosmetic audio/visual unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reward {
    /// Catalog key, unique within its category.
    pub key: String,
    /// Name shown in menus and stored as the preference.
    pub display_name: String,
    /// Sound event played when awarded.
    pub sound_id: String,
    /// Whether picking it plays the sound to the picker.
    pub preview_enabled: bool,
    /// Announcements produced on award.
    pub messages: MessageToggles,
    /// Only this player may pick the reward, unless required flags grant it to others too.
    pub restrict_to_player_id: Option<u64>,
    /// Capability tokens, any of which grants the reward.
    pub required_flags: Vec<String>,
}

/// Which announcement types a reward produces when awarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageToggles {
    /// Chat line to everyone.
    pub chat: bool,
    /// Center-screen text.
    pub center: bool,
    /// Alert box.
    pub alert: bool,
    /// Center HTML panel.
    pub html: bool,
}

impl Default for MessageToggles {
    fn default() -> Self {
        Self {
            chat: true,
            center: true,
            alert: true,
            html: true,
        }
    }
}

/// Result of resolving a stored preference against the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedReward<'a> {
    /// Name of the category holding the reward.
    pub category: &'a str,
    /// The matched reward.
    pub reward: &'a Reward,
}

impl RewardCatalog {
    /// Find the first reward whose display name and sound id both match exactly.
    ///
    /// Two rewards sharing the pair are indistinguishable here; the earlier one wins.
    pub fn find_by_name_and_sound(&self, name: &str, sound: &str) -> Option<ResolvedReward<'_>> {
        self.categories.iter().find_map(|(category, entry)| {
            entry
                .rewards
                .values()
                .find(|reward| reward.display_name == name && reward.sound_id == sound)
                .map(|reward| ResolvedReward {
                    category: category.as_str(),
                    reward,
                })
        })
    }

    /// Look a reward up by category name and key, as selected from the menu.
    pub fn reward(&self, category: &str, key: &str) -> Option<(&Category, &Reward)> {
        let entry = self.categories.get(category)?;
        entry.rewards.get(key).map(|reward| (entry, reward))
    }

    /// Every distinct sound id, in catalog order.
    pub fn sound_ids(&self) -> Vec<String> {
        let mut sounds: Vec<String> = Vec::new();
        for reward in self.categories.values().flat_map(|c| c.rewards.values()) {
            if !reward.sound_id.is_empty() && !sounds.contains(&reward.sound_id) {
                sounds.push(reward.sound_id.clone());
            }
        }
        sounds
    }

    /// Total number of rewards across categories.
    pub fn reward_count(&self) -> usize {
        self.categories.values().map(|c| c.rewards.len()).sum()
    }

    /// Built-in catalog used when neither the local file nor the remote source is available.
    ///
    /// Ships one free category and one gated category so both menu paths stay reachable offline.
    pub fn builtin_default() -> Self {
        let announced = MessageToggles {
            chat: true,
            center: false,
            alert: false,
            html: true,
        };
        let reward = |key: &str, name: &str, sound: &str| Reward {
            key: key.to_owned(),
            display_name: name.to_owned(),
            sound_id: sound.to_owned(),
            preview_enabled: true,
            messages: announced,
            restrict_to_player_id: None,
            required_flags: Vec::new(),
        };

        let mut public = Category::default();
        for r in [
            reward("mvp.1", "Flawless", "MVP.001_bamia"),
            reward("mvp.2", "Ace", "MVP.002_ace"),
        ] {
            public.rewards.insert(r.key.clone(), r);
        }

        let mut vip = Category {
            access_flags: vec!["@css/vip".to_owned()],
            ..Category::default()
        };
        let exclusive = reward("mvp.vip.1", "VIP Exclusive", "MVP.vip_001");
        vip.rewards.insert(exclusive.key.clone(), exclusive);

        let mut categories = IndexMap::new();
        categories.insert("PUBLIC MVP".to_owned(), public);
        categories.insert("VIP MVP".to_owned(), vip);

        Self {
            version: "1.0.0".to_owned(),
            categories,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn reward(key: &str, name: &str, sound: &str) -> Reward {
        Reward {
            key: key.into(),
            display_name: name.into(),
            sound_id: sound.into(),
            preview_enabled: true,
            messages: MessageToggles::default(),
            restrict_to_player_id: None,
            required_flags: Vec::new(),
        }
    }

    pub(crate) fn catalog_with(version: &str, categories: Vec<(&str, Category)>) -> RewardCatalog {
        RewardCatalog {
            version: version.into(),
            categories: categories
                .into_iter()
                .map(|(name, category)| (name.to_owned(), category))
                .collect(),
        }
    }

    pub(crate) fn category(flags: &[&str], rewards: Vec<Reward>) -> Category {
        Category {
            access_flags: flags.iter().map(|f| f.to_string()).collect(),
            rewards: rewards.into_iter().map(|r| (r.key.clone(), r)).collect(),
        }
    }

    #[test]
    fn resolves_by_name_and_sound_pair() {
        let catalog = RewardCatalog::builtin_default();
        let resolved = catalog
            .find_by_name_and_sound("Ace", "MVP.002_ace")
            .expect("ace is in the default catalog");
        assert_eq!(resolved.reward.key, "mvp.2");
        assert_eq!(resolved.category, "PUBLIC MVP");

        assert!(catalog.find_by_name_and_sound("Ace", "MVP.001_bamia").is_none());
        assert!(catalog.find_by_name_and_sound("ace", "MVP.002_ace").is_none());
    }

    #[test]
    fn duplicate_name_and_sound_pairs_resolve_to_the_first_declared() {
        // Known ambiguity: identity is the (name, sound) pair, not the key.
        let catalog = catalog_with(
            "1.0.0",
            vec![
                ("First", category(&[], vec![reward("a.1", "Twin", "S.1")])),
                ("Second", category(&[], vec![reward("b.1", "Twin", "S.1")])),
            ],
        );
        let resolved = catalog.find_by_name_and_sound("Twin", "S.1").unwrap();
        assert_eq!(resolved.category, "First");
        assert_eq!(resolved.reward.key, "a.1");
    }

    #[test]
    fn builtin_default_has_free_and_gated_categories() {
        let catalog = RewardCatalog::builtin_default();
        assert!(catalog.reward_count() > 0);
        assert!(catalog.categories.values().any(|c| c.access_flags.is_empty()));
        assert!(catalog.categories.values().any(|c| !c.access_flags.is_empty()));
    }

    #[test]
    fn sound_ids_are_deduplicated_in_order() {
        let catalog = catalog_with(
            "1.0.0",
            vec![(
                "Only",
                category(
                    &[],
                    vec![
                        reward("a", "A", "S.2"),
                        reward("b", "B", "S.1"),
                        reward("c", "C", "S.2"),
                    ],
                ),
            )],
        );
        assert_eq!(catalog.sound_ids(), vec!["S.2".to_owned(), "S.1".to_owned()]);
    }
}
