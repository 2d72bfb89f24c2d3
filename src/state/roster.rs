//! Players currently connected to the game server.

use indexmap::IndexMap;
use uuid::Uuid;

/// What the host tells us about a connected player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerInfo {
    /// 64-bit platform id.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Controlled by the server.
    pub bot: bool,
    /// Watching, not playing.
    pub spectator: bool,
    /// Opaque capability tokens (admin flags) granted by the host.
    pub capabilities: Vec<String>,
}

impl PlayerInfo {
    /// Humans receive sounds and announcements; bots and spectators do not.
    pub fn is_human(&self) -> bool {
        !self.bot && !self.spectator
    }
}

/// One connection lifetime of a player.
#[derive(Debug, Clone)]
pub struct Session {
    /// Fresh for every connect.
    pub id: Uuid,
    /// Latest info from the host.
    pub player: PlayerInfo,
}

/// Connected players in join order, each with its live session id.
#[derive(Debug, Default)]
pub struct Roster {
    sessions: IndexMap<u64, Session>,
}

impl Roster {
    /// Empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a player. A player already present keeps its session and gets refreshed info.
    ///
    /// Returns the session id and whether it is new.
    pub fn connect(&mut self, player: PlayerInfo) -> (Uuid, bool) {
        if let Some(session) = self.sessions.get_mut(&player.id) {
            session.player = player;
            return (session.id, false);
        }

        let id = Uuid::new_v4();
        self.sessions.insert(player.id, Session { id, player });
        (id, true)
    }

    /// Drop the player, returning the session that ended.
    pub fn disconnect(&mut self, player_id: u64) -> Option<Session> {
        self.sessions.shift_remove(&player_id)
    }

    /// Info of a connected player.
    pub fn player(&self, player_id: u64) -> Option<&PlayerInfo> {
        self.sessions.get(&player_id).map(|session| &session.player)
    }

    /// Live session of a connected player.
    pub fn session_id(&self, player_id: u64) -> Option<Uuid> {
        self.sessions.get(&player_id).map(|session| session.id)
    }

    /// True while `session` is still the player's live connection.
    pub fn is_current(&self, player_id: u64, session: Uuid) -> bool {
        self.session_id(player_id) == Some(session)
    }

    /// Whether the player is connected.
    pub fn contains(&self, player_id: u64) -> bool {
        self.sessions.contains_key(&player_id)
    }

    /// Connected humans in join order.
    pub fn humans(&self) -> impl Iterator<Item = &PlayerInfo> {
        self.sessions
            .values()
            .map(|session| &session.player)
            .filter(|player| player.is_human())
    }

    /// Forget everyone, e.g. when the host link is replaced.
    pub fn clear(&mut self) -> Vec<Session> {
        self.sessions.drain(..).map(|(_, session)| session).collect()
    }
}

/// Boolean capability predicate; how tokens are spelled is the host's business.
pub trait CapabilityCheck: Send + Sync {
    /// Whether `player` holds `token`.
    fn has_capability(&self, player: &PlayerInfo, token: &str) -> bool;

    /// Whether `player` holds at least one of `tokens`.
    fn has_any(&self, player: &PlayerInfo, tokens: &[String]) -> bool {
        tokens.iter().any(|token| self.has_capability(player, token))
    }
}

/// Grants a token when the player holds it verbatim or holds the superuser token.
#[derive(Debug, Clone)]
pub struct TokenCapabilities {
    superuser: String,
}

impl TokenCapabilities {
    /// Checker treating `superuser` as a grant of every token.
    pub fn new(superuser: impl Into<String>) -> Self {
        Self {
            superuser: superuser.into(),
        }
    }
}

impl CapabilityCheck for TokenCapabilities {
    fn has_capability(&self, player: &PlayerInfo, token: &str) -> bool {
        player
            .capabilities
            .iter()
            .any(|held| held == token || (!self.superuser.is_empty() && *held == self.superuser))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn human(id: u64, name: &str) -> PlayerInfo {
        PlayerInfo {
            id,
            name: name.into(),
            bot: false,
            spectator: false,
            capabilities: Vec::new(),
        }
    }

    #[test]
    fn humans_exclude_bots_and_spectators() {
        let mut roster = Roster::new();
        roster.connect(human(1, "alice"));
        roster.connect(PlayerInfo {
            bot: true,
            ..human(2, "BOT Bob")
        });
        roster.connect(PlayerInfo {
            spectator: true,
            ..human(3, "carol")
        });
        roster.connect(human(4, "dave"));

        let ids: Vec<u64> = roster.humans().map(|p| p.id).collect();
        assert_eq!(ids, [1, 4]);
    }

    #[test]
    fn reconnect_gets_a_new_session_but_refresh_keeps_it() {
        let mut roster = Roster::new();
        let (first, fresh) = roster.connect(human(1, "alice"));
        assert!(fresh);

        let (same, fresh) = roster.connect(PlayerInfo {
            spectator: true,
            ..human(1, "alice")
        });
        assert_eq!(first, same);
        assert!(!fresh);
        assert_eq!(roster.humans().count(), 0);

        roster.disconnect(1);
        assert!(!roster.is_current(1, first));
        let (second, _) = roster.connect(human(1, "alice"));
        assert_ne!(first, second);
        assert!(roster.is_current(1, second));
    }

    #[test]
    fn superuser_token_grants_everything() {
        let caps = TokenCapabilities::new("@css/root");
        let vip = PlayerInfo {
            capabilities: vec!["@css/vip".into()],
            ..human(1, "vip")
        };
        let root = PlayerInfo {
            capabilities: vec!["@css/root".into()],
            ..human(2, "root")
        };

        assert!(caps.has_capability(&vip, "@css/vip"));
        assert!(!caps.has_capability(&vip, "@css/root"));
        assert!(caps.has_capability(&root, "@css/vip"));
        assert!(caps.has_any(&vip, &["#css/donator".into(), "@css/vip".into()]));
        assert!(!caps.has_any(&human(3, "nobody"), &["@css/vip".into()]));
    }
}
