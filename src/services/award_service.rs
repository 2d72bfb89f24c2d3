//! Round MVP processing: resolve the awarded player's reward and announce it to every human.

use std::time::Instant;

use tracing::debug;

use crate::{
    config::{AppConfig, MessageKind, render_award},
    dto::ws::HostEffect,
    state::{
        catalog::RewardCatalog,
        notifier::{AwardNotifier, Channel, Render},
        preferences::PreferenceCache,
        roster::Roster,
    },
};

/// Everything award processing reads; only the notifier is mutated.
pub struct AwardContext<'a> {
    /// Templates and switches.
    pub config: &'a AppConfig,
    /// Catalog the preference is resolved against.
    pub catalog: &'a RewardCatalog,
    /// Source of the awarded player's selection.
    pub preferences: &'a PreferenceCache,
    /// Connected players; humans receive the announcement.
    pub roster: &'a Roster,
}

/// Announce the MVP award of `player_id`.
///
/// Returns the immediate effects; timed channels are armed on `notifier` and drawn by the caller's
/// next [`AwardNotifier::tick`].
pub fn process_award(
    ctx: &AwardContext<'_>,
    notifier: &mut AwardNotifier,
    player_id: u64,
    now: Instant,
) -> Vec<HostEffect> {
    let mut effects = Vec::new();

    let Some(awarded) = ctx.roster.player(player_id) else {
        debug!(player_id, "award for a player not on the roster");
        return effects;
    };

    if ctx.config.settings.disable_player_default_mvp {
        effects.push(HostEffect::ResetMvpCount { player_id });
    }

    let (name, sound) = ctx.preferences.get(player_id);
    let (Some(name), Some(sound)) = (name, sound) else {
        return effects;
    };
    if name.is_empty() || sound.is_empty() {
        return effects;
    }

    let Some(resolved) = ctx.catalog.find_by_name_and_sound(&name, &sound) else {
        debug!(player_id, %name, %sound, "stored preference no longer matches the catalog");
        return effects;
    };
    let reward = resolved.reward;

    effects.push(HostEffect::SuppressDefaultBroadcast { player_id });

    for human in ctx.roster.humans() {
        effects.push(HostEffect::PlaySound {
            player_id: human.id,
            sound: reward.sound_id.clone(),
        });
    }

    let messages = &ctx.config.messages;
    let render = |kind| {
        messages
            .template(&reward.key, kind)
            .map(|template| render_award(template, &awarded.name, &reward.display_name))
    };

    if reward.messages.chat {
        if let Some(text) = render(MessageKind::Chat) {
            let line = messages.chat_line(&text);
            for human in ctx.roster.humans() {
                effects.push(HostEffect::PrintChat {
                    player_id: human.id,
                    message: line.clone(),
                });
            }
        }
    }

    let timed = [
        (reward.messages.html, MessageKind::Html, Channel::CenterHtml),
        (reward.messages.center, MessageKind::Center, Channel::Center),
        (reward.messages.alert, MessageKind::Alert, Channel::Alert),
    ];
    for (enabled, kind, channel) in timed {
        if !enabled {
            continue;
        }
        if let Some(text) = render(kind) {
            notifier.activate(channel, text, now);
        }
    }

    effects
}

/// Turn notifier output into one effect per human.
pub fn broadcast_renders(renders: Vec<Render>, roster: &Roster) -> Vec<HostEffect> {
    let mut effects = Vec::new();
    for render in renders {
        for human in roster.humans() {
            let player_id = human.id;
            let text = render.text.clone();
            effects.push(match render.channel {
                Channel::CenterHtml => HostEffect::PrintCenterHtml {
                    player_id,
                    html: text,
                },
                Channel::Center => HostEffect::PrintCenter {
                    player_id,
                    message: text,
                },
                Channel::Alert => HostEffect::PrintAlert {
                    player_id,
                    message: text,
                },
            });
        }
    }
    effects
}
