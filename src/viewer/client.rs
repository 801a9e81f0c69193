// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::future::pending;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use super::connector::{Connector, ViewerLink};
use super::machine::{Action, BackoffPolicy, ConnectionEvent, ConnectionMachine, ConnectionState};
use crate::protocol::{Envelope, TransportError};

const EVENT_CAPACITY: usize = 64;

/// Answers the hub's visibility queries.
pub trait VisibilityProbe: Send + Sync + 'static {
    fn is_visible(&self) -> bool;
}

impl<F> VisibilityProbe for F
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    fn is_visible(&self) -> bool {
        self()
    }
}

/// Visibility flag the owning UI flips on focus/blur.
#[derive(Debug, Clone, Default)]
pub struct VisibilityFlag(Arc<AtomicBool>);

impl VisibilityFlag {
    pub fn new(visible: bool) -> Self {
        Self(Arc::new(AtomicBool::new(visible)))
    }

    pub fn set(&self, visible: bool) {
        self.0.store(visible, Ordering::Relaxed);
    }
}

impl VisibilityProbe for VisibilityFlag {
    fn is_visible(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerEvent {
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// A `render_result` arrived; the owner should display `diagram`, on `background` if set.
    DiagramAdopted {
        diagram: String,
        background: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Start,
    Reconnect,
    Shutdown,
}

/// Owner-side handle of a running viewer connection.
///
/// Dropping the handle stops the driver task.
#[derive(Debug)]
pub struct ViewerHandle {
    control: mpsc::UnboundedSender<Control>,
    state: watch::Receiver<ConnectionState>,
    diagram: watch::Receiver<Option<String>>,
    events: broadcast::Sender<ViewerEvent>,
    task: JoinHandle<()>,
}

impl ViewerHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// The most recently adopted diagram.
    pub fn current_diagram(&self) -> Option<String> {
        self.diagram.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn watch_diagram(&self) -> watch::Receiver<Option<String>> {
        self.diagram.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewerEvent> {
        self.events.subscribe()
    }

    pub fn start(&self) {
        let _ = self.control.send(Control::Start);
    }

    /// Reconnects now, skipping any pending backoff. No-op while connecting or connected.
    pub fn reconnect(&self) {
        let _ = self.control.send(Control::Reconnect);
    }

    pub fn shutdown(&self) {
        let _ = self.control.send(Control::Shutdown);
    }

    /// Waits until the connection reaches `target`.
    pub async fn wait_for_state(&self, target: ConnectionState) {
        let mut state = self.state.clone();
        let _ = state.wait_for(|current| *current == target).await;
    }

    /// Waits until some diagram has been adopted and returns it.
    pub async fn wait_for_diagram(&self) -> Option<String> {
        let mut diagram = self.diagram.clone();
        let adopted = diagram.wait_for(Option::is_some).await.ok()?;
        adopted.clone()
    }
}

impl Drop for ViewerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Drives a [`ConnectionMachine`] against a real transport.
pub struct ViewerClient<C, P> {
    connector: C,
    probe: P,
    policy: BackoffPolicy,
}

impl<C: Connector, P: VisibilityProbe> ViewerClient<C, P> {
    pub fn new(connector: C, probe: P) -> Self {
        Self {
            connector,
            probe,
            policy: BackoffPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Spawns the driver in `disconnected`; call [`ViewerHandle::start`] to connect.
    pub fn spawn(self) -> ViewerHandle {
        let (control, control_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let (diagram_tx, diagram) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let driver = Driver {
            connector: self.connector,
            probe: self.probe,
            machine: ConnectionMachine::new(self.policy),
            control_rx,
            state_tx,
            diagram_tx,
            events: events.clone(),
            link: None,
            connecting: None,
            retry_at: None,
        };
        let task = tokio::spawn(driver.run());

        ViewerHandle {
            control,
            state,
            diagram,
            events,
            task,
        }
    }
}

type PendingConnect = BoxFuture<'static, Result<Box<dyn ViewerLink>, TransportError>>;

enum Wake {
    Control(Option<Control>),
    Opened(Result<Box<dyn ViewerLink>, TransportError>),
    Frame(Option<Envelope>),
    RetryDue,
}

struct Driver<C, P> {
    connector: C,
    probe: P,
    machine: ConnectionMachine,
    control_rx: mpsc::UnboundedReceiver<Control>,
    state_tx: watch::Sender<ConnectionState>,
    diagram_tx: watch::Sender<Option<String>>,
    events: broadcast::Sender<ViewerEvent>,
    link: Option<Box<dyn ViewerLink>>,
    connecting: Option<PendingConnect>,
    retry_at: Option<Instant>,
}

impl<C: Connector, P: VisibilityProbe> Driver<C, P> {
    async fn run(mut self) {
        loop {
            let wake = tokio::select! {
                control = self.control_rx.recv() => Wake::Control(control),
                opened = await_connect(&mut self.connecting) => Wake::Opened(opened),
                frame = await_frame(&mut self.link) => Wake::Frame(frame),
                () = await_retry(self.retry_at) => Wake::RetryDue,
            };

            let event = match wake {
                Wake::Control(None) => break,
                Wake::Control(Some(Control::Start)) => ConnectionEvent::Start,
                Wake::Control(Some(Control::Reconnect)) => ConnectionEvent::ManualReconnect,
                Wake::Control(Some(Control::Shutdown)) => ConnectionEvent::Shutdown,
                Wake::Opened(Ok(link)) => {
                    self.connecting = None;
                    self.link = Some(link);
                    ConnectionEvent::TransportOpened
                }
                Wake::Opened(Err(err)) => {
                    self.connecting = None;
                    debug!(error = %err, "viewer connect failed");
                    ConnectionEvent::TransportFailed
                }
                Wake::Frame(Some(envelope)) => match self.on_envelope(envelope) {
                    Ok(()) => continue,
                    Err(err) => {
                        debug!(error = %err, "viewer reply failed");
                        ConnectionEvent::TransportClosed
                    }
                },
                Wake::Frame(None) => {
                    self.link = None;
                    ConnectionEvent::TransportClosed
                }
                Wake::RetryDue => {
                    self.retry_at = None;
                    ConnectionEvent::TimerFired
                }
            };

            self.apply(event);
        }
    }

    fn apply(&mut self, event: ConnectionEvent) {
        let now = Instant::now();
        let transition = self.machine.handle(event, now.into_std());

        for action in &transition.actions {
            match *action {
                Action::OpenTransport => self.connecting = Some(self.connector.connect()),
                Action::CloseTransport => {
                    self.link = None;
                    self.connecting = None;
                }
                Action::ScheduleRetry(delay) => {
                    debug!(
                        delay_ms = delay.as_millis() as u64,
                        attempt = self.machine.attempts(),
                        "viewer retry scheduled"
                    );
                    self.retry_at = Some(now + delay);
                }
                Action::CancelRetry => self.retry_at = None,
            }
        }

        if transition.changed() {
            info!(from = %transition.from, to = %transition.to, "viewer connection state");
            self.state_tx.send_replace(transition.to);
            let _ = self.events.send(ViewerEvent::StateChanged {
                from: transition.from,
                to: transition.to,
            });
        }
    }

    fn on_envelope(&mut self, envelope: Envelope) -> Result<(), TransportError> {
        match envelope {
            Envelope::RenderResult {
                diagram,
                background,
            } => {
                self.diagram_tx.send_replace(Some(diagram.clone()));
                let _ = self
                    .events
                    .send(ViewerEvent::DiagramAdopted { diagram, background });
                Ok(())
            }
            Envelope::VisibilityQuery => {
                let is_visible = self.probe.is_visible();
                match self.link.as_mut() {
                    Some(link) => link.send(Envelope::VisibilityResponse { is_visible }),
                    None => Err(TransportError::Closed),
                }
            }
            other => {
                debug!(kind = other.type_name(), "ignoring hub message");
                Ok(())
            }
        }
    }
}

async fn await_connect(
    connecting: &mut Option<PendingConnect>,
) -> Result<Box<dyn ViewerLink>, TransportError> {
    match connecting {
        Some(future) => future.await,
        None => pending().await,
    }
}

async fn await_frame(link: &mut Option<Box<dyn ViewerLink>>) -> Option<Envelope> {
    match link {
        Some(link) => link.recv().await,
        None => pending().await,
    }
}

async fn await_retry(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => pending().await,
    }
}
