// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Fan-out of rendered diagrams to every connected viewer.
//!
//! The hub does not know how a viewer is attached. A transport registers a [`ViewerSink`] and
//! forwards whatever the viewer sends back through [`BroadcastHub::handle_incoming`]. Two
//! transports exist: websocket sessions (see [`ws`]) and the in-process relay (see [`relay`])
//! used when the viewer lives in the same process as the hub.

pub mod relay;
pub mod ws;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::protocol::{Envelope, TransportError};

pub use relay::{RelayConnection, RelaySink};
pub use ws::WsSink;

pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_millis(500);

/// Delivery half of a viewer transport.
pub trait ViewerSink: Send + Sync + 'static {
    /// Queues `envelope` for the viewer without waiting for it to be written.
    ///
    /// Returns [`TransportError::Closed`] once the viewer is gone.
    fn deliver(&self, envelope: &Envelope) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewer-{}", self.0)
    }
}

/// Outcome of one [`BroadcastHub::broadcast`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
}

struct Connection {
    sink: Arc<dyn ViewerSink>,
    pending_visibility: Vec<oneshot::Sender<bool>>,
    last_visibility: Option<bool>,
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    connections: BTreeMap<ConnectionId, Connection>,
}

struct HubInner {
    state: Mutex<HubState>,
    /// Held for the whole fan-out so each viewer sees broadcasts in call order.
    fanout: Mutex<()>,
    visibility_timeout: Duration,
}

#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

impl fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("connections", &self.connection_count())
            .field("visibility_timeout", &self.inner.visibility_timeout)
            .finish()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_VISIBILITY_TIMEOUT)
    }
}

impl BroadcastHub {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(HubInner {
                state: Mutex::new(HubState::default()),
                fanout: Mutex::new(()),
                visibility_timeout,
            }),
        }
    }

    pub fn visibility_timeout(&self) -> Duration {
        self.inner.visibility_timeout
    }

    fn state(&self) -> MutexGuard<'_, HubState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, sink: Arc<dyn ViewerSink>) -> ConnectionId {
        let mut state = self.state();
        state.next_id += 1;
        let id = ConnectionId(state.next_id);
        state.connections.insert(
            id,
            Connection {
                sink,
                pending_visibility: Vec::new(),
                last_visibility: None,
            },
        );
        info!(connection = %id, viewers = state.connections.len(), "viewer registered");
        id
    }

    /// Removes a viewer; pending visibility queries for it resolve as not visible.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let mut state = self.state();
        let removed = state.connections.remove(&id).is_some();
        if removed {
            info!(connection = %id, viewers = state.connections.len(), "viewer unregistered");
        }
        removed
    }

    pub fn connection_count(&self) -> usize {
        self.state().connections.len()
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.state().connections.keys().copied().collect()
    }

    /// Delivers `envelope` to every viewer registered at call time.
    ///
    /// Viewers whose sink reports closed are unregistered after the fan-out; they never keep
    /// other viewers from receiving the event.
    pub fn broadcast(&self, envelope: &Envelope) -> BroadcastReport {
        let _order = self.inner.fanout.lock().unwrap_or_else(PoisonError::into_inner);

        let targets = self
            .state()
            .connections
            .iter()
            .map(|(id, connection)| (*id, connection.sink.clone()))
            .collect::<Vec<_>>();

        let mut report = BroadcastReport::default();
        let mut closed = Vec::new();
        for (id, sink) in targets {
            match sink.deliver(envelope) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    warn!(connection = %id, error = %err, "dropping viewer after failed delivery");
                    closed.push(id);
                }
            }
        }

        report.dropped = closed.len();
        for id in closed {
            self.unregister(id);
        }
        debug!(
            kind = envelope.type_name(),
            delivered = report.delivered,
            dropped = report.dropped,
            "broadcast"
        );
        report
    }

    /// Asks one viewer whether it is visible.
    ///
    /// Resolves to `false` when the viewer is unknown, disconnects, or does not answer within
    /// the visibility timeout.
    pub async fn query_visibility(&self, id: ConnectionId) -> bool {
        let (tx, rx) = oneshot::channel();
        let sink = {
            let mut state = self.state();
            let Some(connection) = state.connections.get_mut(&id) else {
                return false;
            };
            connection.pending_visibility.retain(|pending| !pending.is_closed());
            connection.pending_visibility.push(tx);
            connection.sink.clone()
        };

        if let Err(err) = sink.deliver(&Envelope::VisibilityQuery) {
            debug!(connection = %id, error = %err, "visibility query not delivered");
            self.unregister(id);
            return false;
        }

        match tokio::time::timeout(self.inner.visibility_timeout, rx).await {
            Ok(Ok(visible)) => visible,
            Ok(Err(_)) => false,
            Err(_) => {
                debug!(connection = %id, "visibility query timed out");
                false
            }
        }
    }

    /// Queries every viewer concurrently; `true` if at least one reports visible.
    pub async fn query_all_visibility(&self) -> bool {
        let queries = self.connection_ids().into_iter().map(|id| self.query_visibility(id));
        join_all(queries).await.into_iter().any(|visible| visible)
    }

    /// Most recent visibility answer received from `id`.
    pub fn last_visibility(&self, id: ConnectionId) -> Option<bool> {
        self.state().connections.get(&id).and_then(|connection| connection.last_visibility)
    }

    /// Handles a message a viewer sent to the hub.
    pub fn handle_incoming(&self, id: ConnectionId, envelope: Envelope) {
        match envelope {
            Envelope::VisibilityResponse { is_visible } => {
                let mut state = self.state();
                let Some(connection) = state.connections.get_mut(&id) else {
                    return;
                };
                connection.last_visibility = Some(is_visible);
                for pending in connection.pending_visibility.drain(..) {
                    let _ = pending.send(is_visible);
                }
            }
            other => {
                debug!(connection = %id, kind = other.type_name(), "ignoring viewer message");
            }
        }
    }

    /// Decodes a raw text frame from a viewer; malformed frames are logged and ignored.
    pub fn handle_text(&self, id: ConnectionId, text: &str) {
        match Envelope::decode(text) {
            Ok(envelope) => self.handle_incoming(id, envelope),
            Err(err) => debug!(connection = %id, error = %err, "ignoring malformed viewer frame"),
        }
    }
}
