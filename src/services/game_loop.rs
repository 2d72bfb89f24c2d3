//! The game loop: the single task that owns the roster and the award notifier.
//!
//! Host messages, timer ticks and the results of background work all arrive here as
//! [`LoopEvent`]s and are handled strictly in arrival order. Store reads and writes and catalog
//! refreshes run on spawned tasks, which report back through the same channel; a result is only
//! applied if the session it was started for is still alive.

use std::time::{Duration, Instant};

use tokio::{
    sync::mpsc,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{HostEffect, HostInbound},
    services::{
        award_service::{AwardContext, broadcast_renders, process_award},
        command_service::{CatalogOutcome, ChatCommand, is_admin, parse_command},
        menu_service::{apply_selection, open_menu},
    },
    state::{
        SharedState,
        notifier::AwardNotifier,
        roster::{PlayerInfo, Roster},
    },
};

/// Who asked for a catalog refresh, so the reply can be dropped if they left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    /// Admin who ran the command.
    pub player_id: u64,
    /// Their session when the command arrived.
    pub session: Uuid,
}

/// Everything the game loop reacts to.
#[derive(Debug)]
pub enum LoopEvent {
    /// Validated message from the connected host.
    Host(HostInbound),
    /// A host completed its `hello`.
    HostAttached {
        /// Name from the hello.
        server: String,
    },
    /// The active host link went away.
    HostDetached {
        /// Name from the hello.
        server: String,
    },
    /// The connect debounce elapsed for this session.
    PrefetchDue {
        /// Player to load.
        player_id: u64,
        /// Session that scheduled the prefetch.
        session: Uuid,
    },
    /// The background preference load finished.
    PrefetchCompleted {
        /// Player that was loaded.
        player_id: u64,
        /// Session that scheduled the prefetch.
        session: Uuid,
    },
    /// Background flush after a disconnect finished.
    DisconnectFlushed {
        /// Player who left.
        player_id: u64,
        /// False when the entry may still hold unsaved changes.
        flushed: bool,
    },
    /// Background flush after the match ended finished.
    MatchEndFlushed,
    /// A catalog job finished.
    CatalogResolved {
        /// Admin to report to; `None` for jobs nobody asked for.
        requester: Option<Requester>,
        /// Job result.
        outcome: CatalogOutcome,
    },
    /// Stop the loop.
    Shutdown,
}

/// Owner of per-session state; see the module documentation.
pub struct GameLoop {
    state: SharedState,
    events: mpsc::UnboundedReceiver<LoopEvent>,
    effects: mpsc::UnboundedSender<HostEffect>,
    roster: Roster,
    notifier: AwardNotifier,
}

impl GameLoop {
    /// Loop fed by `events` and emitting to `effects`, starting with an empty roster.
    pub fn new(
        state: SharedState,
        events: mpsc::UnboundedReceiver<LoopEvent>,
        effects: mpsc::UnboundedSender<HostEffect>,
    ) -> Self {
        let notifier = AwardNotifier::new(state.config().notifier_timings());
        Self {
            state,
            events,
            effects,
            roster: Roster::new(),
            notifier,
        }
    }

    /// Run until [`LoopEvent::Shutdown`] arrives or every event sender is gone.
    pub async fn run(mut self) {
        let config = self.state.config().clone();

        let mut rebroadcast = time::interval(config.rebroadcast_interval());
        rebroadcast.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let flush_every = config.flush_interval();
        let mut flush = time::interval_at(time::Instant::now() + flush_every, flush_every);
        flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("game loop started");
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(LoopEvent::Shutdown) | None => break,
                    Some(event) => self.handle(event, Instant::now()),
                },
                _ = rebroadcast.tick() => self.tick(Instant::now()),
                _ = flush.tick() => self.spawn_flush_all(None),
            }
        }
        info!("game loop stopped");
    }

    fn handle(&mut self, event: LoopEvent, now: Instant) {
        match event {
            LoopEvent::Host(message) => self.handle_host(message, now),
            LoopEvent::HostAttached { server } => {
                info!(%server, "host attached");
                self.reset_session();
                self.emit_precache();
            }
            LoopEvent::HostDetached { server } => {
                info!(%server, "host detached");
                self.reset_session();
                self.spawn_flush_all(None);
            }
            LoopEvent::PrefetchDue { player_id, session } => {
                if self.roster.is_current(player_id, session) {
                    self.spawn_prefetch(player_id, session);
                } else {
                    debug!(player_id, "prefetch skipped; session ended");
                }
            }
            LoopEvent::PrefetchCompleted { player_id, session } => {
                if !self.roster.is_current(player_id, session)
                    && !self.roster.contains(player_id)
                    && self.state.preferences().evict_if_clean(player_id)
                {
                    debug!(player_id, "discarded prefetch for a departed player");
                }
            }
            LoopEvent::DisconnectFlushed { player_id, flushed } => {
                if !flushed {
                    return;
                }
                if self.roster.contains(player_id) {
                    debug!(player_id, "player reconnected before eviction; keeping entry");
                } else if self.state.preferences().evict_if_clean(player_id) {
                    debug!(player_id, "evicted preference after disconnect");
                }
            }
            LoopEvent::MatchEndFlushed => {
                let roster = &self.roster;
                let evicted = self
                    .state
                    .preferences()
                    .evict_clean_where(|player_id| !roster.contains(player_id));
                debug!(evicted, "evicted preferences after match end");
            }
            LoopEvent::CatalogResolved { requester, outcome } => {
                self.apply_catalog_outcome(requester, outcome)
            }
            LoopEvent::Shutdown => {}
        }
    }

    fn handle_host(&mut self, message: HostInbound, now: Instant) {
        match message {
            HostInbound::Hello { server } => {
                debug!(%server, "ignoring hello forwarded to the game loop");
            }
            HostInbound::PlayerConnected { player } => {
                let player = PlayerInfo::from(player);
                let player_id = player.id;
                let wants_prefetch = !player.bot;
                let (session, fresh) = self.roster.connect(player);
                if fresh && wants_prefetch {
                    self.schedule_prefetch(player_id, session);
                }
            }
            HostInbound::PlayerDisconnected { player_id } => {
                if self.roster.disconnect(player_id).is_none() {
                    debug!(player_id, "disconnect for an unknown player");
                    return;
                }
                self.spawn_disconnect_flush(player_id);
            }
            HostInbound::RoundStart => self.notifier.reset(),
            HostInbound::RoundMvp { player_id } => {
                let config = self.state.config().clone();
                let catalog = self.state.catalog();
                let ctx = AwardContext {
                    config: &config,
                    catalog: &catalog,
                    preferences: self.state.preferences(),
                    roster: &self.roster,
                };
                let effects = process_award(&ctx, &mut self.notifier, player_id, now);
                self.emit_all(effects);
                self.tick(now);
            }
            HostInbound::MatchEnd => self.spawn_flush_all(Some(LoopEvent::MatchEndFlushed)),
            HostInbound::Command {
                player_id, command, ..
            } => self.handle_command(player_id, &command),
            HostInbound::MenuSelect {
                player_id,
                selection,
            } => {
                let Some(player) = self.roster.player(player_id) else {
                    debug!(player_id, "menu selection from an unknown player");
                    return;
                };
                let effects = apply_selection(
                    self.state.config(),
                    self.state.capabilities(),
                    &self.state.catalog(),
                    self.state.preferences(),
                    player,
                    &selection,
                );
                self.emit_all(effects);
            }
        }
    }

    fn handle_command(&mut self, player_id: u64, command: &str) {
        let config = self.state.config().clone();
        let (Some(player), Some(session)) = (
            self.roster.player(player_id),
            self.roster.session_id(player_id),
        ) else {
            debug!(player_id, command, "command from an unknown player");
            return;
        };

        match parse_command(&config.commands, command) {
            None => debug!(player_id, command, "unrecognized command"),
            Some(ChatCommand::OpenMenu) => {
                let effects = open_menu(
                    &config,
                    self.state.capabilities(),
                    &self.state.catalog(),
                    self.state.preferences(),
                    player,
                );
                self.emit_all(effects);
            }
            Some(ChatCommand::Catalog(job)) => {
                if !is_admin(&config.commands, self.state.capabilities(), player) {
                    self.chat(player_id, &config.messages.no_permission);
                    return;
                }
                info!(player_id, ?job, "catalog refresh requested");
                self.chat(player_id, job.accepted_text(&config.messages));

                let state = self.state.clone();
                let requester = Requester { player_id, session };
                tokio::spawn(async move {
                    let outcome = job.run(state.synchronizer()).await;
                    state.send_event(LoopEvent::CatalogResolved {
                        requester: Some(requester),
                        outcome,
                    });
                });
            }
        }
    }

    fn apply_catalog_outcome(&mut self, requester: Option<Requester>, outcome: CatalogOutcome) {
        let config = self.state.config().clone();
        let (catalog, text) = outcome.into_parts(&config.messages);
        if let Some(catalog) = catalog {
            self.state.install_catalog(catalog);
            self.emit_precache();
        }

        match requester {
            Some(Requester { player_id, session }) if self.roster.is_current(player_id, session) => {
                self.chat(player_id, &text)
            }
            Some(Requester { player_id, .. }) => {
                debug!(player_id, "catalog refresh finished after the requester left")
            }
            None => {}
        }
    }

    /// Draw due notifier channels.
    fn tick(&mut self, now: Instant) {
        let renders = self.notifier.tick(now);
        if renders.is_empty() {
            return;
        }
        let effects = broadcast_renders(renders, &self.roster);
        self.emit_all(effects);
    }

    fn reset_session(&mut self) {
        let dropped = self.roster.clear();
        if !dropped.is_empty() {
            debug!(players = dropped.len(), "roster cleared");
        }
        self.notifier.reset();
    }

    fn schedule_prefetch(&self, player_id: u64, session: Uuid) {
        let state = self.state.clone();
        let delay = state.config().prefetch_delay();
        tokio::spawn(async move {
            if delay > Duration::ZERO {
                time::sleep(delay).await;
            }
            state.send_event(LoopEvent::PrefetchDue { player_id, session });
        });
    }

    fn spawn_prefetch(&self, player_id: u64, session: Uuid) {
        let state = self.state.clone();
        tokio::spawn(async move {
            match state.require_preference_store().await {
                Ok(store) => {
                    if let Err(err) = state
                        .preferences()
                        .get_or_load(store.as_ref(), player_id)
                        .await
                    {
                        warn!(player_id, error = %err, "failed to prefetch preference");
                    }
                }
                Err(err) => debug!(player_id, error = %err, "prefetch skipped"),
            }
            state.send_event(LoopEvent::PrefetchCompleted { player_id, session });
        });
    }

    fn spawn_disconnect_flush(&self, player_id: u64) {
        let state = self.state.clone();
        tokio::spawn(async move {
            let preferences = state.preferences();
            let flushed = match state.require_preference_store().await {
                Ok(store) => match preferences.flush_one(store.as_ref(), player_id).await {
                    Ok(_) => true,
                    Err(err) => {
                        warn!(player_id, error = %err, "failed to flush preference on disconnect");
                        false
                    }
                },
                Err(err) => {
                    let dirty = preferences.is_dirty(player_id);
                    if dirty {
                        warn!(player_id, error = %err, "keeping unsaved preference of departed player");
                    }
                    !dirty
                }
            };
            state.send_event(LoopEvent::DisconnectFlushed { player_id, flushed });
        });
    }

    /// Flush every dirty entry in the background, then queue `then` if given.
    fn spawn_flush_all(&self, then: Option<LoopEvent>) {
        let state = self.state.clone();
        tokio::spawn(async move {
            flush_dirty(&state).await;
            if let Some(event) = then {
                state.send_event(event);
            }
        });
    }

    fn emit_precache(&self) {
        let sounds = self.state.catalog().sound_ids();
        self.emit(HostEffect::PrecacheSounds { sounds });
    }

    fn chat(&self, player_id: u64, text: &str) {
        let message = self.state.config().messages.chat_line(text);
        self.emit(HostEffect::PrintChat { player_id, message });
    }

    fn emit_all(&self, effects: Vec<HostEffect>) {
        for effect in effects {
            self.emit(effect);
        }
    }

    fn emit(&self, effect: HostEffect) {
        if self.effects.send(effect).is_err() {
            debug!("effect forwarder stopped; effect dropped");
        }
    }
}

/// Write every dirty preference through the installed store, logging what could not be saved.
pub async fn flush_dirty(state: &SharedState) {
    let preferences = state.preferences();
    let dirty = preferences.dirty_count();
    if dirty == 0 {
        return;
    }

    match state.require_preference_store().await {
        Ok(store) => {
            let report = preferences.flush_all(store.as_ref()).await;
            if report.failed > 0 {
                warn!(
                    written = report.written,
                    failed = report.failed,
                    "some preferences could not be saved"
                );
            } else {
                info!(written = report.written, "preferences saved");
            }
        }
        Err(err) => warn!(dirty, error = %err, "cannot save preferences"),
    }
}
