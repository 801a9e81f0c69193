// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! In-process viewer transport.
//!
//! A desktop shell that hosts the viewer next to the hub relays envelopes over channels instead
//! of a socket. The protocol is identical.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::{BroadcastHub, ConnectionId, ViewerSink};
use crate::protocol::{Envelope, TransportError};

#[derive(Debug, Clone)]
pub struct RelaySink {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl RelaySink {
    pub fn new(tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { tx }
    }
}

impl ViewerSink for RelaySink {
    fn deliver(&self, envelope: &Envelope) -> Result<(), TransportError> {
        self.tx.send(envelope.clone()).map_err(|_| TransportError::Closed)
    }
}

/// Viewer end of an in-process relay.
///
/// Dropping the connection unregisters it from the hub.
#[derive(Debug)]
pub struct RelayConnection {
    hub: BroadcastHub,
    id: ConnectionId,
    incoming: mpsc::UnboundedReceiver<Envelope>,
}

impl RelayConnection {
    pub fn open(hub: &BroadcastHub) -> Self {
        let (tx, incoming) = mpsc::unbounded_channel();
        let id = hub.register(Arc::new(RelaySink::new(tx)));
        Self {
            hub: hub.clone(),
            id,
            incoming,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Next envelope from the hub; `None` once the hub dropped this viewer.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.incoming.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.incoming.try_recv().ok()
    }

    pub fn send(&self, envelope: Envelope) {
        self.hub.handle_incoming(self.id, envelope);
    }
}

impl Drop for RelayConnection {
    fn drop(&mut self) {
        self.hub.unregister(self.id);
    }
}
