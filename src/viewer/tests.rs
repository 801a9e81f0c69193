// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use super::*;
use crate::hub::{BroadcastHub, RelayConnection};
use crate::protocol::{Envelope, TransportError};

/// Relay connector whose hub can be switched on and off.
#[derive(Clone)]
struct FlakyConnector {
    hub: BroadcastHub,
    available: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
}

impl FlakyConnector {
    fn new(hub: &BroadcastHub, available: bool) -> Self {
        Self {
            hub: hub.clone(),
            available: Arc::new(AtomicBool::new(available)),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Connector for FlakyConnector {
    fn connect(&self) -> BoxFuture<'static, Result<Box<dyn ViewerLink>, TransportError>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let available = self.available.load(Ordering::SeqCst);
        let hub = self.hub.clone();
        async move {
            if available {
                Ok(Box::new(RelayConnection::open(&hub)) as Box<dyn ViewerLink>)
            } else {
                Err(TransportError::Unavailable)
            }
        }
        .boxed()
    }
}

fn relay_viewer(hub: &BroadcastHub, visible: bool) -> (ViewerHandle, VisibilityFlag) {
    let flag = VisibilityFlag::new(visible);
    let handle = ViewerClient::new(RelayConnector::new(hub.clone()), flag.clone()).spawn();
    handle.start();
    (handle, flag)
}

#[tokio::test(start_paused = true)]
async fn two_viewers_adopt_broadcast_diagram() {
    let hub = BroadcastHub::default();
    let (a, _) = relay_viewer(&hub, true);
    let (b, _) = relay_viewer(&hub, false);
    a.wait_for_state(ConnectionState::Connected).await;
    b.wait_for_state(ConnectionState::Connected).await;
    assert_eq!(hub.connection_count(), 2);

    let report = hub.broadcast(&Envelope::render_result("graph TD;A-->B"));
    assert_eq!(report.delivered, 2);

    assert_eq!(a.wait_for_diagram().await.as_deref(), Some("graph TD;A-->B"));
    assert_eq!(b.wait_for_diagram().await.as_deref(), Some("graph TD;A-->B"));
    assert_eq!(a.current_diagram().as_deref(), Some("graph TD;A-->B"));
}

#[tokio::test(start_paused = true)]
async fn events_report_state_changes_and_adoptions() {
    let hub = BroadcastHub::default();
    let handle = ViewerClient::new(RelayConnector::new(hub.clone()), || true).spawn();
    let mut events = handle.subscribe();
    handle.start();
    handle.wait_for_state(ConnectionState::Connected).await;
    hub.broadcast(&Envelope::render_result("graph LR;X"));

    let expected = [
        ViewerEvent::StateChanged {
            from: ConnectionState::Disconnected,
            to: ConnectionState::Connecting,
        },
        ViewerEvent::StateChanged {
            from: ConnectionState::Connecting,
            to: ConnectionState::Connected,
        },
        ViewerEvent::DiagramAdopted {
            diagram: "graph LR;X".to_owned(),
            background: None,
        },
    ];
    for event in expected {
        assert_eq!(events.recv().await.unwrap(), event);
    }
}

#[tokio::test(start_paused = true)]
async fn viewer_answers_visibility_queries_from_probe() {
    let hub = BroadcastHub::default();
    let (handle, flag) = relay_viewer(&hub, false);
    handle.wait_for_state(ConnectionState::Connected).await;
    let id = hub.connection_ids()[0];

    assert!(!hub.query_visibility(id).await);
    flag.set(true);
    assert!(hub.query_visibility(id).await);
    assert_eq!(hub.last_visibility(id), Some(true));
}

#[tokio::test(start_paused = true)]
async fn unavailable_endpoint_converges_once_it_appears() {
    let hub = BroadcastHub::default();
    let connector = FlakyConnector::new(&hub, false);
    let handle = ViewerClient::new(connector.clone(), || true).spawn();

    let started = tokio::time::Instant::now();
    handle.start();
    handle.wait_for_state(ConnectionState::Reconnecting).await;
    assert!(started.elapsed() < BackoffPolicy::default().base);

    connector.set_available(true);
    handle.wait_for_state(ConnectionState::Connected).await;
    assert_eq!(connector.attempts(), 2);
    assert_eq!(hub.connection_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn retry_budget_exhaustion_fails_and_manual_reconnect_recovers() {
    let hub = BroadcastHub::default();
    let connector = FlakyConnector::new(&hub, false);
    let policy = BackoffPolicy {
        max_attempts: Some(3),
        ..BackoffPolicy::default()
    };
    let handle = ViewerClient::new(connector.clone(), || true).with_policy(policy).spawn();
    let mut states = handle.watch_state();

    handle.start();
    handle.wait_for_state(ConnectionState::Failed).await;
    // One initial attempt plus three retries.
    assert_eq!(connector.attempts(), 4);

    // Stays failed without owner action.
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(*states.borrow_and_update(), ConnectionState::Failed);
    assert_eq!(connector.attempts(), 4);

    connector.set_available(true);
    handle.reconnect();
    handle.wait_for_state(ConnectionState::Connected).await;
}

#[tokio::test(start_paused = true)]
async fn hub_dropping_viewer_triggers_reconnect() {
    let hub = BroadcastHub::default();
    let (handle, _) = relay_viewer(&hub, true);
    handle.wait_for_state(ConnectionState::Connected).await;
    let mut states = handle.watch_state();
    states.borrow_and_update();

    let first = hub.connection_ids()[0];
    hub.unregister(first);

    states.changed().await.unwrap();
    assert_eq!(*states.borrow_and_update(), ConnectionState::Reconnecting);

    handle.wait_for_state(ConnectionState::Connected).await;
    let ids = hub.connection_ids();
    assert_eq!(ids.len(), 1);
    assert_ne!(ids[0], first);
}

#[tokio::test(start_paused = true)]
async fn shutdown_disconnects_and_reconnect_restarts() {
    let hub = BroadcastHub::default();
    let (handle, _) = relay_viewer(&hub, true);
    handle.wait_for_state(ConnectionState::Connected).await;

    handle.shutdown();
    handle.wait_for_state(ConnectionState::Disconnected).await;
    assert_eq!(hub.connection_count(), 0);

    handle.reconnect();
    handle.wait_for_state(ConnectionState::Connected).await;
    assert_eq!(hub.connection_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn reconnect_while_backing_off_skips_the_timer() {
    let hub = BroadcastHub::default();
    let connector = FlakyConnector::new(&hub, false);
    let policy = BackoffPolicy {
        base: Duration::from_secs(3_600),
        max_delay: Duration::from_secs(3_600),
        ..BackoffPolicy::default()
    };
    let handle = ViewerClient::new(connector.clone(), || true).with_policy(policy).spawn();
    handle.start();
    handle.wait_for_state(ConnectionState::Reconnecting).await;

    connector.set_available(true);
    let started = tokio::time::Instant::now();
    handle.reconnect();
    handle.wait_for_state(ConnectionState::Connected).await;
    assert!(started.elapsed() < Duration::from_secs(3_600));
}
