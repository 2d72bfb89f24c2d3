//! Application-level configuration loading: settings, timers, command names and chat texts.

use std::{
    collections::HashMap,
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{dto::tolerant, state::notifier::NotifierTimings};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/config.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "MVP_ANTHEM_CONFIG_PATH";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Behaviour switches and catalog locations.
    pub settings: Settings,
    /// Announcement lifetimes and loop cadences.
    pub timer: TimerConfig,
    /// Chat command names and admin capability.
    pub commands: CommandConfig,
    /// Player-facing texts.
    pub messages: MessageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
/// General behaviour switches and catalog locations.
pub struct Settings {
    /// Zero the host's own MVP counter and suppress its default announcement.
    pub disable_player_default_mvp: bool,
    /// Remote catalog URL; empty disables the remote source.
    pub catalog_url: String,
    /// Local catalog file.
    pub catalog_path: PathBuf,
    /// Bound on the remote catalog request.
    pub fetch_timeout_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            disable_player_default_mvp: true,
            catalog_url: "https://cdn.vhming.com/json/fetch/mvp.json".into(),
            catalog_path: PathBuf::from("config/mvp-settings.json"),
            fetch_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
/// Announcement durations (seconds) and loop cadences.
pub struct TimerConfig {
    /// Seconds the HTML center panel stays up.
    pub center_html_duration: u64,
    /// Seconds the plain center text stays up.
    pub center_duration: u64,
    /// Seconds the alert banner stays up.
    pub alert_duration: u64,
    /// Game loop tick; the HTML panel is redrawn on each one.
    pub rebroadcast_interval_ms: u64,
    /// Wait after a player connects before their preference is loaded.
    pub prefetch_delay_seconds: u64,
    /// Period of the background flush of dirty preferences.
    pub flush_interval_seconds: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            center_html_duration: 7,
            center_duration: 7,
            alert_duration: 7,
            rebroadcast_interval_ms: 100,
            prefetch_delay_seconds: 3,
            flush_interval_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
/// Chat command names and the capability tokens guarding them.
pub struct CommandConfig {
    /// Names that open the preference menu.
    pub menu_commands: Vec<String>,
    /// Admin command running a full catalog synchronization.
    pub fetch_command: String,
    /// Admin command re-reading the local catalog file.
    pub reload_command: String,
    /// Capability required for the admin commands.
    pub admin_capability: String,
    /// Token that implies every other token.
    pub superuser_capability: String,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            menu_commands: vec!["mvp".into(), "music".into()],
            fetch_command: "mvp_fetch".into(),
            reload_command: "mvp_reload".into(),
            admin_capability: "@css/root".into(),
            superuser_capability: "@css/root".into(),
        }
    }
}

/// Kind of award announcement a template renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Chat line.
    Chat,
    /// Plain center text.
    Center,
    /// Alert banner.
    Alert,
    /// HTML center panel.
    Html,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
/// Optional template per announcement kind. An empty string disables that kind.
pub struct MessageTemplates {
    /// Chat line template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat: Option<String>,
    /// Center text template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center: Option<String>,
    /// Alert banner template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
    /// HTML panel template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

impl MessageTemplates {
    fn get(&self, kind: MessageKind) -> Option<&str> {
        match kind {
            MessageKind::Chat => self.chat.as_deref(),
            MessageKind::Center => self.center.as_deref(),
            MessageKind::Alert => self.alert.as_deref(),
            MessageKind::Html => self.html.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
/// Every text the service sends to players.
pub struct MessageConfig {
    /// Prepended to every chat line.
    pub prefix: String,
    /// Award templates used when a reward has no override.
    pub defaults: MessageTemplates,
    /// Templates keyed by reward key, taking precedence over [`MessageConfig::defaults`].
    pub overrides: HashMap<String, MessageTemplates>,
    /// Reply to a non-admin running an admin command.
    pub no_permission: String,
    /// Sent when a fetch is accepted.
    pub fetching: String,
    /// Fetch result; `{version}` is the installed version.
    pub fetch_succeeded: String,
    /// Fetch result when the remote failed; `{error}` describes why.
    pub fetch_failed: String,
    /// Sent when a reload is accepted.
    pub reloading: String,
    /// Reload result; `{version}` is the loaded version.
    pub reload_succeeded: String,
    /// Reload failure; `{error}` describes why.
    pub reload_failed: String,
    /// Confirms an equip; `{mvp}` is the reward name.
    pub equipped: String,
    /// Confirms a preview; `{mvp}` is the reward name.
    pub previewed: String,
    /// Confirms a removal.
    pub removed: String,
    /// Reply when the menu would be empty or the picked reward is not available.
    pub unavailable: String,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            prefix: "[MVP] ".into(),
            defaults: MessageTemplates {
                chat: Some("{player} is the MVP! Now playing: {mvp}".into()),
                center: Some("MVP: {player} ({mvp})".into()),
                alert: Some("MVP: {player}".into()),
                html: Some(
                    "<font color='#FFD700'>MVP: {player}</font><br><font color='#87CEFA'>{mvp}</font>"
                        .into(),
                ),
            },
            overrides: HashMap::new(),
            no_permission: "You don't have permission to use this command.".into(),
            fetching: "Fetching MVP settings from the remote source...".into(),
            fetch_succeeded: "MVP settings updated successfully! Version: {version}".into(),
            fetch_failed: "Failed to fetch MVP settings: {error}".into(),
            reloading: "Reloading MVP settings from local file...".into(),
            reload_succeeded: "MVP settings reloaded successfully! Version: {version}".into(),
            reload_failed: "Failed to reload MVP settings: {error}".into(),
            equipped: "You equipped {mvp}.".into(),
            previewed: "Previewing {mvp}.".into(),
            removed: "Your MVP selection was removed.".into(),
            unavailable: "No MVP is available to you.".into(),
        }
    }
}

impl MessageConfig {
    /// Template for `kind`, looked up for the reward key first and then in the defaults.
    pub fn template(&self, reward_key: &str, kind: MessageKind) -> Option<&str> {
        self.overrides
            .get(reward_key)
            .and_then(|templates| templates.get(kind))
            .or_else(|| self.defaults.get(kind))
            .filter(|template| !template.is_empty())
    }

    /// Chat line with the configured prefix.
    pub fn chat_line(&self, text: &str) -> String {
        format!("{}{}", self.prefix, text)
    }
}

/// Substitute `{player}` and `{mvp}` in an award template.
pub fn render_award(template: &str, player: &str, mvp: &str) -> String {
    template.replace("{player}", player).replace("{mvp}", mvp)
}

/// Failure to read the configuration file; always recovered by falling back to defaults.
#[derive(Debug, Error)]
enum ConfigError {
    #[error("failed to read config")]
    Read(#[source] std::io::Error),
    #[error("config is not valid JSON")]
    Syntax(#[source] json5::Error),
    #[error("config has an unexpected shape")]
    Shape(#[source] serde_json::Error),
}

impl AppConfig {
    /// Load the configuration from disk.
    ///
    /// A missing file is created from the built-in defaults; an unreadable or invalid one is
    /// reported and replaced by the defaults in memory only.
    pub fn load() -> Self {
        Self::load_from(&resolve_config_path())
    }

    /// Load the configuration from an explicit path.
    pub fn load_from(path: &Path) -> Self {
        match read_config(path) {
            Ok(config) => {
                info!(path = %path.display(), "loaded configuration");
                config
            }
            Err(ConfigError::Read(err)) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; writing built-in defaults"
                );
                let config = Self::default();
                if let Err(err) = write_config(path, &config) {
                    warn!(path = %path.display(), error = %err, "failed to write default config");
                }
                config
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to load config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Announcement durations for the notifier.
    pub fn notifier_timings(&self) -> NotifierTimings {
        NotifierTimings {
            center_html: Duration::from_secs(self.timer.center_html_duration),
            center: Duration::from_secs(self.timer.center_duration),
            alert: Duration::from_secs(self.timer.alert_duration),
        }
    }

    /// Tick period of the game loop; never zero.
    pub fn rebroadcast_interval(&self) -> Duration {
        Duration::from_millis(self.timer.rebroadcast_interval_ms.max(1))
    }

    /// Debounce between a connect and the preference prefetch; zero prefetches at once.
    pub fn prefetch_delay(&self) -> Duration {
        Duration::from_secs(self.timer.prefetch_delay_seconds)
    }

    /// Period of the background flush; never zero.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.timer.flush_interval_seconds.max(1))
    }

    /// Bound on the remote catalog request; never zero.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.fetch_timeout_seconds.max(1))
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(ConfigError::Read)?;
    let mut value = tolerant::parse_value(&text).map_err(ConfigError::Syntax)?;
    let template = serde_json::to_value(AppConfig::default()).map_err(ConfigError::Shape)?;
    tolerant::fold_like(&mut value, &template);
    serde_json::from_value(value).map_err(ConfigError::Shape)
}

fn write_config(path: &Path, config: &AppConfig) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;
    fs::write(path, text)
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config/config.json");

        let config = AppConfig::load_from(&path);
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());
        assert_eq!(AppConfig::load_from(&path), AppConfig::default());
    }

    #[test]
    fn partial_file_is_merged_with_defaults_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                // tuned for a 128-tick server
                "Settings": { "DisablePlayerDefaultMVP": false, "CATALOGURL": "" },
                "timer": { "centerHtmlDuration": 5, },
                "messages": { "overrides": { "mvp.2": { "chat": "{player} aced it" } } },
            }"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path);
        assert!(!config.settings.disable_player_default_mvp);
        assert!(config.settings.catalog_url.is_empty());
        assert_eq!(config.timer.center_html_duration, 5);
        assert_eq!(config.timer.alert_duration, 7);
        assert_eq!(config.commands.menu_commands, ["mvp", "music"]);
        assert_eq!(
            config.messages.template("mvp.2", MessageKind::Chat),
            Some("{player} aced it")
        );
    }

    #[test]
    fn invalid_file_falls_back_to_defaults_without_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ settings: [ }").unwrap();

        assert_eq!(AppConfig::load_from(&path), AppConfig::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ settings: [ }");
    }

    #[test]
    fn templates_prefer_reward_overrides_then_defaults() {
        let mut messages = MessageConfig::default();
        messages.overrides.insert(
            "mvp.1".into(),
            MessageTemplates {
                html: Some("<b>{mvp}</b>".into()),
                alert: Some(String::new()),
                ..MessageTemplates::default()
            },
        );

        assert_eq!(
            messages.template("mvp.1", MessageKind::Html),
            Some("<b>{mvp}</b>")
        );
        assert_eq!(
            messages.template("mvp.1", MessageKind::Chat),
            messages.defaults.chat.as_deref()
        );
        assert_eq!(messages.template("mvp.1", MessageKind::Alert), None);
    }

    #[test]
    fn award_placeholders_are_substituted() {
        assert_eq!(
            render_award("{player} is the MVP with {mvp}", "alice", "Ace"),
            "alice is the MVP with Ace"
        );
    }
}
