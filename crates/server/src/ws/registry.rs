use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};

/// Frames handed to a socket's write task. `Close` tells it to shut the
/// WebSocket down (superseded connection, revoked session).
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Event(String),
    Ping,
    Close,
}

pub type LiveSender = mpsc::UnboundedSender<OutboundFrame>;

/// One live channel per device session, keyed by session id. A reconnect
/// supersedes: registering over an existing entry closes the old socket.
/// All map access goes through one lock, so operations on a single key
/// apply in a global order. Sends never block; the socket write task owns
/// the blocking side of each channel.
#[derive(Default)]
pub struct ConnectionRegistry {
    channels: RwLock<HashMap<String, LiveSender>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the channel for a session. Any previous channel is told to
    /// close; the fresh one gets a ping so dead sockets surface early.
    pub async fn register(&self, session_id: &str, tx: LiveSender) {
        let mut channels = self.channels.write().await;
        if let Some(old) = channels.insert(session_id.to_string(), tx.clone()) {
            let _ = old.send(OutboundFrame::Close);
        }
        let _ = tx.send(OutboundFrame::Ping);
    }

    /// Attempts live delivery. `false` means the device is unreachable:
    /// never registered, or its channel is dead (evicted here so later
    /// sends fail fast).
    pub async fn send(&self, session_id: &str, payload: &str) -> bool {
        let tx = { self.channels.read().await.get(session_id).cloned() };
        let Some(tx) = tx else {
            return false;
        };
        if tx.is_closed() || tx.send(OutboundFrame::Event(payload.to_string())).is_err() {
            self.unregister(session_id, &tx).await;
            return false;
        }
        true
    }

    /// Removes the session's channel, but only if `tx` is still the
    /// registered one. A disconnecting socket that has already been
    /// superseded by a reconnect must not evict its replacement.
    pub async fn unregister(&self, session_id: &str, tx: &LiveSender) -> bool {
        let mut channels = self.channels.write().await;
        if channels
            .get(session_id)
            .is_some_and(|current| current.same_channel(tx))
        {
            channels.remove(session_id);
            return true;
        }
        false
    }

    /// Force-closes whatever channel the session holds. Used when the
    /// session itself ends (logout, revocation, account deletion).
    pub async fn disconnect(&self, session_id: &str) -> bool {
        let removed = self.channels.write().await.remove(session_id);
        match removed {
            Some(tx) => {
                let _ = tx.send(OutboundFrame::Close);
                true
            }
            None => false,
        }
    }

    pub async fn is_connected(&self, session_id: &str) -> bool {
        self.channels
            .read()
            .await
            .get(session_id)
            .is_some_and(|tx| !tx.is_closed())
    }

    pub async fn connection_count(&self) -> usize {
        self.channels.read().await.len()
    }
}
