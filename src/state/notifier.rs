//! Timed announcement channels driven by the game loop tick.

use std::time::{Duration, Instant};

/// Screen area an announcement occupies while active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// HTML center panel; the host clears it every frame, so it is redrawn on every tick.
    CenterHtml,
    /// Plain center text, sent once on activation.
    Center,
    /// Alert banner, sent once on activation.
    Alert,
}

impl Channel {
    /// Every channel, in drawing order.
    pub const ALL: [Channel; 3] = [Channel::CenterHtml, Channel::Center, Channel::Alert];

    fn index(self) -> usize {
        match self {
            Channel::CenterHtml => 0,
            Channel::Center => 1,
            Channel::Alert => 2,
        }
    }
}

/// How long each channel stays active after an award.
///
/// The re-broadcast cadence is not part of this; the HTML channel is redrawn on every tick and the
/// caller decides how often to tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifierTimings {
    /// Lifetime of the HTML center panel.
    pub center_html: Duration,
    /// Lifetime of the plain center text.
    pub center: Duration,
    /// Lifetime of the alert banner.
    pub alert: Duration,
}

impl NotifierTimings {
    fn duration(&self, channel: Channel) -> Duration {
        match channel {
            Channel::CenterHtml => self.center_html,
            Channel::Center => self.center,
            Channel::Alert => self.alert,
        }
    }
}

impl Default for NotifierTimings {
    fn default() -> Self {
        Self {
            center_html: Duration::from_secs(7),
            center: Duration::from_secs(7),
            alert: Duration::from_secs(7),
        }
    }
}

/// A channel that has to be (re)drawn on the host now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Render {
    /// Area to draw into.
    pub channel: Channel,
    /// Rendered announcement.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveNotice {
    text: String,
    expires_at: Instant,
    drawn: bool,
    timer: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum Slot {
    #[default]
    Idle,
    Active(ActiveNotice),
}

/// Per-channel notification state. Each channel holds at most one expiry deadline.
#[derive(Debug)]
pub struct AwardNotifier {
    timings: NotifierTimings,
    slots: [Slot; 3],
    next_timer: u64,
}

impl AwardNotifier {
    /// Create a notifier with every channel idle.
    pub fn new(timings: NotifierTimings) -> Self {
        Self {
            timings,
            slots: Default::default(),
            next_timer: 0,
        }
    }

    /// Show `text` on `channel`, replacing whatever was active there along with its deadline.
    ///
    /// Returns the id of the timer now owning the channel.
    pub fn activate(&mut self, channel: Channel, text: String, now: Instant) -> u64 {
        let timer = self.next_timer;
        self.next_timer += 1;
        self.slots[channel.index()] = Slot::Active(ActiveNotice {
            text,
            expires_at: now + self.timings.duration(channel),
            drawn: false,
            timer,
        });
        timer
    }

    /// Advance every channel to `now` and return what has to be drawn.
    ///
    /// An expired channel goes idle without a final draw. The HTML channel is drawn on every call
    /// while active; the others only on the first call after activation.
    pub fn tick(&mut self, now: Instant) -> Vec<Render> {
        let mut renders = Vec::new();

        for channel in Channel::ALL {
            let slot = &mut self.slots[channel.index()];
            let expired = match slot {
                Slot::Active(notice) => now >= notice.expires_at,
                Slot::Idle => continue,
            };
            if expired {
                *slot = Slot::Idle;
                continue;
            }
            let Slot::Active(notice) = slot else {
                continue;
            };

            let repeats = matches!(channel, Channel::CenterHtml);
            if notice.drawn && !repeats {
                continue;
            }

            notice.drawn = true;
            renders.push(Render {
                channel,
                text: notice.text.clone(),
            });
        }

        renders
    }

    /// Cancel every channel, e.g. when a new round starts.
    pub fn reset(&mut self) {
        self.slots = Default::default();
    }
}

#[cfg(test)]
impl AwardNotifier {
    /// Text currently shown on `channel`, if it is active.
    pub fn active_text(&self, channel: Channel) -> Option<&str> {
        match &self.slots[channel.index()] {
            Slot::Active(notice) => Some(notice.text.as_str()),
            Slot::Idle => None,
        }
    }

    /// Deadline of the notice on `channel`, if it is active.
    pub fn expires_at(&self, channel: Channel) -> Option<Instant> {
        match &self.slots[channel.index()] {
            Slot::Active(notice) => Some(notice.expires_at),
            Slot::Idle => None,
        }
    }

    /// Id of the timer owning `channel`, if it is active.
    pub fn timer(&self, channel: Channel) -> Option<u64> {
        match &self.slots[channel.index()] {
            Slot::Active(notice) => Some(notice.timer),
            Slot::Idle => None,
        }
    }

    /// Number of pending expiry deadlines across all channels.
    pub fn outstanding_timers(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Active(_)))
            .count()
    }
}
