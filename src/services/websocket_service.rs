use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{HostAck, HostEffect, HostInbound},
    services::game_loop::LoopEvent,
    state::{HostConnection, SharedState},
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// The writer task of a host connection is gone.
#[derive(Debug, Error)]
#[error("connection closed")]
struct ConnectionClosed;

/// Handle the full lifecycle of the game server's WebSocket connection.
///
/// The first frame must be a `hello` within [`IDENT_TIMEOUT`]. A later `hello` on another socket
/// takes over the bridge and this one is closed.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sender.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("host identification timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let server = match HostInbound::from_json_str(&initial_message) {
        Ok(HostInbound::Hello { server }) => server,
        Ok(_) => {
            warn!("first host message was not hello");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Err(err) => {
            warn!(error = %err, "failed to parse or validate host hello");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let connection_id = Uuid::new_v4();
    let replaced = state
        .attach_host(HostConnection {
            id: connection_id,
            server: server.clone(),
            tx: outbound_tx.clone(),
        })
        .await;
    if let Some(previous) = replaced {
        info!(previous = %previous.server, %server, "host link replaced");
        let _ = previous.tx.send(Message::Close(None));
    }
    info!(%server, "host connected");

    let ack = HostAck {
        status: "ok".into(),
        catalog_version: state.catalog().version.clone(),
    };
    if send_message_to_websocket(&outbound_tx, &ack).is_err() {
        info!(%server, "connection closed during acknowledgement, terminating");
        state.detach_host(connection_id).await;
        finalize(writer_task, outbound_tx).await;
        return;
    }
    state.send_event(LoopEvent::HostAttached {
        server: server.clone(),
    });

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(%server, payload = %text, "received host message");
                match HostInbound::from_json_str(&text) {
                    Ok(HostInbound::Hello { .. }) => {
                        warn!(%server, "ignoring duplicate hello message");
                    }
                    Ok(inbound) => state.send_event(LoopEvent::Host(inbound)),
                    Err(err) => {
                        warn!(%server, error = %err, "failed to parse or validate host message");
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(%server, "host closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%server, error = %err, "websocket error");
                break;
            }
        }
    }

    if state.detach_host(connection_id).await {
        state.send_event(LoopEvent::HostDetached {
            server: server.clone(),
        });
    }
    info!(%server, "host disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Forward effects produced by the game loop to whichever host is connected.
///
/// Effects produced while no host is attached are dropped; the host rebuilds its state from the
/// events it sends after connecting.
pub async fn forward_effects(state: SharedState, mut effects: mpsc::UnboundedReceiver<HostEffect>) {
    while let Some(effect) = effects.recv().await {
        let Some(tx) = state.host_sender().await else {
            debug!(?effect, "no host connected; effect dropped");
            continue;
        };
        if send_message_to_websocket(&tx, &effect).is_err() {
            debug!(?effect, "host writer closed; effect dropped");
        }
    }
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Serialization failures are logged and swallowed; only a closed writer is reported.
fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), ConnectionClosed>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        services::catalog_service::CatalogSynchronizer,
        state::{AppState, catalog::RewardCatalog},
    };

    fn state() -> SharedState {
        let mut config = AppConfig::default();
        config.settings.catalog_url = String::new();
        let synchronizer = CatalogSynchronizer::from_config(&config);
        AppState::new(config, synchronizer, RewardCatalog::builtin_default()).0
    }

    #[tokio::test]
    async fn effects_reach_the_attached_host_as_json_frames() {
        let state = state();
        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        state
            .attach_host(HostConnection {
                id: Uuid::new_v4(),
                server: "test".into(),
                tx: host_tx,
            })
            .await;

        let (effects_tx, effects_rx) = mpsc::unbounded_channel();
        let forwarder = tokio::spawn(forward_effects(state.clone(), effects_rx));
        effects_tx
            .send(HostEffect::ResetMvpCount { player_id: 3 })
            .unwrap();
        drop(effects_tx);
        forwarder.await.unwrap();

        let Some(Message::Text(text)) = host_rx.recv().await else {
            panic!("expected a text frame");
        };
        assert_eq!(text.as_str(), r#"{"type":"reset_mvp_count","playerId":3}"#);
    }

    #[tokio::test]
    async fn stale_connection_cannot_detach_its_replacement() {
        let state = state();
        let (first_tx, _first_rx) = mpsc::unbounded_channel();
        let (second_tx, _second_rx) = mpsc::unbounded_channel();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        state
            .attach_host(HostConnection {
                id: first,
                server: "a".into(),
                tx: first_tx,
            })
            .await;
        let replaced = state
            .attach_host(HostConnection {
                id: second,
                server: "b".into(),
                tx: second_tx,
            })
            .await;
        assert_eq!(replaced.map(|host| host.id), Some(first));

        assert!(!state.detach_host(first).await);
        assert_eq!(state.host_server().await.as_deref(), Some("b"));
        assert!(state.detach_host(second).await);
    }
}
