// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Websocket viewer transport.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use super::{BroadcastHub, ViewerSink};
use crate::protocol::{Envelope, TransportError};

/// Encodes envelopes into text frames for a socket writer task.
#[derive(Debug, Clone)]
pub struct WsSink {
    tx: mpsc::UnboundedSender<String>,
}

impl WsSink {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl ViewerSink for WsSink {
    fn deliver(&self, envelope: &Envelope) -> Result<(), TransportError> {
        self.tx.send(envelope.encode()).map_err(|_| TransportError::Closed)
    }
}

/// Runs one viewer session until the socket closes.
pub async fn serve_socket(hub: BroadcastHub, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let id = hub.register(Arc::new(WsSink::new(tx)));

    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => hub.handle_text(id, text.as_str()),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(connection = %id, error = %err, "viewer socket error");
                break;
            }
        }
    }

    hub.unregister(id);
    writer.abort();
}
