// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use futures_util::future::BoxFuture;
use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::hub::{BroadcastHub, RelayConnection};
use crate::protocol::{Envelope, TransportError};

/// An open, bidirectional viewer channel. Dropping it closes the transport.
pub trait ViewerLink: Send {
    fn send(&mut self, envelope: Envelope) -> Result<(), TransportError>;

    /// Next envelope from the hub; `None` once the transport closed.
    fn recv(&mut self) -> BoxFuture<'_, Option<Envelope>>;
}

/// Opens [`ViewerLink`]s to a hub.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self) -> BoxFuture<'static, Result<Box<dyn ViewerLink>, TransportError>>;
}

impl ViewerLink for RelayConnection {
    fn send(&mut self, envelope: Envelope) -> Result<(), TransportError> {
        RelayConnection::send(self, envelope);
        Ok(())
    }

    fn recv(&mut self) -> BoxFuture<'_, Option<Envelope>> {
        RelayConnection::recv(self).boxed()
    }
}

/// Attaches to a hub living in the same process.
#[derive(Debug, Clone)]
pub struct RelayConnector {
    hub: BroadcastHub,
}

impl RelayConnector {
    pub fn new(hub: BroadcastHub) -> Self {
        Self { hub }
    }
}

impl Connector for RelayConnector {
    fn connect(&self) -> BoxFuture<'static, Result<Box<dyn ViewerLink>, TransportError>> {
        let hub = self.hub.clone();
        async move { Ok(Box::new(RelayConnection::open(&hub)) as Box<dyn ViewerLink>) }.boxed()
    }
}

/// Connects to a hub's websocket endpoint, e.g. `ws://127.0.0.1:27436/ws`.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connector for WsConnector {
    fn connect(&self) -> BoxFuture<'static, Result<Box<dyn ViewerLink>, TransportError>> {
        let url = self.url.clone();
        async move {
            let (socket, _) = tokio_tungstenite::connect_async(url.as_str()).await.map_err(
                |err| TransportError::Connect {
                    endpoint: url.clone(),
                    message: err.to_string(),
                },
            )?;
            let (mut sink, mut stream) = socket.split();

            let (incoming_tx, incoming) = mpsc::unbounded_channel();
            let reader = tokio::spawn(async move {
                while let Some(frame) = stream.next().await {
                    match frame {
                        Ok(Message::Text(text)) => match Envelope::decode(text.as_str()) {
                            Ok(envelope) => {
                                if incoming_tx.send(envelope).is_err() {
                                    break;
                                }
                            }
                            Err(err) => debug!(error = %err, "ignoring malformed hub frame"),
                        },
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(err) => {
                            debug!(error = %err, "hub socket error");
                            break;
                        }
                    }
                }
            });

            let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<String>();
            let writer = tokio::spawn(async move {
                while let Some(text) = outgoing_rx.recv().await {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                let _ = sink.close().await;
            });

            Ok(Box::new(WsLink {
                outgoing,
                incoming,
                reader,
                writer,
            }) as Box<dyn ViewerLink>)
        }
        .boxed()
    }
}

struct WsLink {
    outgoing: mpsc::UnboundedSender<String>,
    incoming: mpsc::UnboundedReceiver<Envelope>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl ViewerLink for WsLink {
    fn send(&mut self, envelope: Envelope) -> Result<(), TransportError> {
        self.outgoing.send(envelope.encode()).map_err(|_| TransportError::Closed)
    }

    fn recv(&mut self) -> BoxFuture<'_, Option<Envelope>> {
        self.incoming.recv().boxed()
    }
}

impl Drop for WsLink {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
