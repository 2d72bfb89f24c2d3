//! Chat commands: opening the menu and the admin catalog refresh commands.

use tracing::{info, warn};

use crate::{
    config::{CommandConfig, MessageConfig},
    error::CatalogError,
    services::catalog_service::{CatalogSynchronizer, SyncOutcome},
    state::{
        catalog::RewardCatalog,
        roster::{CapabilityCheck, PlayerInfo},
    },
};

/// Commands understood by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand {
    /// Show the preference menu.
    OpenMenu,
    /// Admin catalog refresh.
    Catalog(CatalogJob),
}

/// Admin catalog refresh requested from chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogJob {
    /// Full synchronization against the remote source.
    Fetch,
    /// Re-read the local file only.
    Reload,
}

/// Result of a [`CatalogJob`], produced off the game loop.
#[derive(Debug)]
pub enum CatalogOutcome {
    /// Full synchronization finished; it always yields a catalog.
    Fetched(SyncOutcome),
    /// Local re-read finished.
    Reloaded(Result<RewardCatalog, CatalogError>),
}

/// Map a raw command name onto a [`ChatCommand`].
///
/// Names are compared case-insensitively, with the host's `css_` and `!` prefixes ignored.
pub fn parse_command(commands: &CommandConfig, raw: &str) -> Option<ChatCommand> {
    let name = raw.trim();
    let name = name.strip_prefix('!').unwrap_or(name);
    let name = name
        .get(..4)
        .filter(|prefix| prefix.eq_ignore_ascii_case("css_"))
        .map_or(name, |_| &name[4..]);

    if name.eq_ignore_ascii_case(&commands.fetch_command) {
        Some(ChatCommand::Catalog(CatalogJob::Fetch))
    } else if name.eq_ignore_ascii_case(&commands.reload_command) {
        Some(ChatCommand::Catalog(CatalogJob::Reload))
    } else if commands
        .menu_commands
        .iter()
        .any(|menu| name.eq_ignore_ascii_case(menu))
    {
        Some(ChatCommand::OpenMenu)
    } else {
        None
    }
}

/// Whether `player` may run admin catalog commands.
pub fn is_admin(commands: &CommandConfig, caps: &dyn CapabilityCheck, player: &PlayerInfo) -> bool {
    caps.has_capability(player, &commands.admin_capability)
}

impl CatalogJob {
    /// Text sent to the admin as soon as the job is accepted.
    pub fn accepted_text<'a>(&self, messages: &'a MessageConfig) -> &'a str {
        match self {
            CatalogJob::Fetch => &messages.fetching,
            CatalogJob::Reload => &messages.reloading,
        }
    }

    /// Execute the job; meant to run off the game loop.
    pub async fn run(self, synchronizer: &CatalogSynchronizer) -> CatalogOutcome {
        match self {
            CatalogJob::Fetch => CatalogOutcome::Fetched(synchronizer.synchronize().await),
            CatalogJob::Reload => CatalogOutcome::Reloaded(synchronizer.reload_local().await),
        }
    }
}

impl CatalogOutcome {
    /// Split into the catalog to install, if any, and the text reporting the result.
    pub fn into_parts(self, messages: &MessageConfig) -> (Option<RewardCatalog>, String) {
        match self {
            CatalogOutcome::Fetched(SyncOutcome {
                catalog,
                origin,
                remote_error,
            }) => {
                let text = match remote_error {
                    Some(err) => messages.fetch_failed.replace("{error}", &err.to_string()),
                    None => messages
                        .fetch_succeeded
                        .replace("{version}", &catalog.version),
                };
                info!(version = %catalog.version, ?origin, "catalog fetched on request");
                (Some(catalog), text)
            }
            CatalogOutcome::Reloaded(Ok(catalog)) => {
                info!(version = %catalog.version, "catalog reloaded on request");
                let text = messages
                    .reload_succeeded
                    .replace("{version}", &catalog.version);
                (Some(catalog), text)
            }
            CatalogOutcome::Reloaded(Err(err)) => {
                warn!(error = %err, "catalog reload failed");
                (
                    None,
                    messages.reload_failed.replace("{error}", &err.to_string()),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::{
        config::AppConfig,
        services::catalog_service::CatalogOrigin,
        state::roster::{TokenCapabilities, tests::human},
    };

    #[test]
    fn parses_configured_names_with_host_prefixes() {
        let commands = CommandConfig::default();
        assert_eq!(parse_command(&commands, "mvp"), Some(ChatCommand::OpenMenu));
        assert_eq!(parse_command(&commands, "css_music"), Some(ChatCommand::OpenMenu));
        assert_eq!(parse_command(&commands, "!MVP"), Some(ChatCommand::OpenMenu));
        assert_eq!(
            parse_command(&commands, "css_mvp_fetch"),
            Some(ChatCommand::Catalog(CatalogJob::Fetch))
        );
        assert_eq!(
            parse_command(&commands, "mvp_reload"),
            Some(ChatCommand::Catalog(CatalogJob::Reload))
        );
        assert_eq!(parse_command(&commands, "kill"), None);
        assert_eq!(parse_command(&commands, "css"), None);
    }

    #[test]
    fn admin_capability_is_required() {
        let commands = CommandConfig::default();
        let caps = TokenCapabilities::new("@css/root");
        let root = PlayerInfo {
            capabilities: vec!["@css/root".into()],
            ..human(1, "root")
        };
        assert!(is_admin(&commands, &caps, &root));
        assert!(!is_admin(&commands, &caps, &human(2, "guest")));
    }

    #[test]
    fn outcomes_render_version_or_error() {
        let messages = AppConfig::default().messages;

        let fetched = CatalogOutcome::Fetched(SyncOutcome {
            catalog: RewardCatalog::builtin_default(),
            origin: CatalogOrigin::Local,
            remote_error: None,
        });
        let (catalog, text) = fetched.into_parts(&messages);
        assert!(catalog.is_some());
        assert_eq!(text, "MVP settings updated successfully! Version: 1.0.0");

        let failed = CatalogOutcome::Reloaded(Err(CatalogError::Missing(PathBuf::from("x.json"))));
        let (catalog, text) = failed.into_parts(&messages);
        assert!(catalog.is_none());
        assert_eq!(
            text,
            "Failed to reload MVP settings: catalog file `x.json` does not exist"
        );
    }
}
