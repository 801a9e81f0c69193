// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        })
    }
}

/// Inputs that drive a [`ConnectionMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The owner starts the connection.
    Start,
    /// The owner asks to reconnect now.
    ManualReconnect,
    /// The owner shuts the connection down.
    Shutdown,
    TransportOpened,
    /// Opening the transport failed.
    TransportFailed,
    /// An open transport closed or errored.
    TransportClosed,
    /// The backoff timer elapsed.
    TimerFired,
}

/// Side effects the driver performs after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    OpenTransport,
    CloseTransport,
    ScheduleRetry(Duration),
    CancelRetry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectionState,
    pub to: ConnectionState,
    pub actions: Vec<Action>,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Exponential backoff with a capped delay and an optional retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub factor: u32,
    pub max_delay: Duration,
    /// Retries allowed after a failure before giving up; `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Time since the first failure of a streak after which the machine gives up.
    pub max_elapsed: Option<Duration>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            factor: 2,
            max_delay: Duration::from_secs(30),
            max_attempts: None,
            max_elapsed: None,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let multiplier = self.factor.max(1).saturating_pow(exponent);
        self.base.saturating_mul(multiplier).min(self.max_delay)
    }

    fn exhausted(&self, attempts: u32, streak_started: Instant, now: Instant) -> bool {
        if self.max_attempts.is_some_and(|max| attempts > max) {
            return true;
        }
        self.max_elapsed
            .is_some_and(|max| now.saturating_duration_since(streak_started) >= max)
    }
}

/// Connection lifecycle of one viewer as a plain value.
///
/// The machine never touches a socket or a timer. It consumes [`ConnectionEvent`]s and returns
/// the [`Action`]s its driver must carry out.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    policy: BackoffPolicy,
    attempts: u32,
    streak_started: Option<Instant>,
}

impl ConnectionMachine {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            policy,
            attempts: 0,
            streak_started: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Failed attempts since the last successful connection.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn handle(&mut self, event: ConnectionEvent, now: Instant) -> Transition {
        use ConnectionEvent as E;
        use ConnectionState as S;

        let from = self.state;
        let actions = match (from, event) {
            (S::Disconnected, E::Start | E::ManualReconnect) | (S::Failed, E::ManualReconnect) => {
                self.reset_streak();
                self.state = S::Connecting;
                vec![Action::OpenTransport]
            }
            (S::Reconnecting, E::Start | E::ManualReconnect) => {
                self.state = S::Connecting;
                vec![Action::CancelRetry, Action::OpenTransport]
            }
            (S::Connecting | S::Connected, E::Start | E::ManualReconnect) => Vec::new(),
            // Only the owner's explicit reconnect leaves `failed`.
            (S::Failed, E::Start) => Vec::new(),

            (S::Connecting, E::TransportOpened) => {
                self.reset_streak();
                self.state = S::Connected;
                Vec::new()
            }
            // An open that raced a shutdown or a newer attempt.
            (_, E::TransportOpened) => vec![Action::CloseTransport],

            (S::Connecting, E::TransportFailed | E::TransportClosed)
            | (S::Connected, E::TransportClosed) => self.schedule_retry(now),
            (_, E::TransportFailed | E::TransportClosed) => Vec::new(),

            (S::Reconnecting, E::TimerFired) => {
                self.state = S::Connecting;
                vec![Action::OpenTransport]
            }
            (_, E::TimerFired) => Vec::new(),

            (S::Disconnected, E::Shutdown) => Vec::new(),
            (_, E::Shutdown) => {
                self.reset_streak();
                self.state = S::Disconnected;
                vec![Action::CancelRetry, Action::CloseTransport]
            }
        };

        Transition {
            from,
            to: self.state,
            actions,
        }
    }

    fn schedule_retry(&mut self, now: Instant) -> Vec<Action> {
        self.attempts = self.attempts.saturating_add(1);
        let streak_started = *self.streak_started.get_or_insert(now);

        if self.policy.exhausted(self.attempts, streak_started, now) {
            self.state = ConnectionState::Failed;
            return vec![Action::CloseTransport];
        }

        self.state = ConnectionState::Reconnecting;
        vec![
            Action::CloseTransport,
            Action::ScheduleRetry(self.policy.delay_for(self.attempts)),
        ]
    }

    fn reset_streak(&mut self) {
        self.attempts = 0;
        self.streak_started = None;
    }
}
