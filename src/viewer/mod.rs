// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Viewer side of the live channel.
//!
//! [`ConnectionMachine`] is the connection lifecycle as a pure state machine with exponential
//! backoff. [`ViewerClient`] drives it against a [`Connector`] (websocket or in-process relay)
//! and exposes state, the adopted diagram and a typed event stream through [`ViewerHandle`].

pub mod client;
pub mod connector;
pub mod machine;

pub use client::{VisibilityFlag, VisibilityProbe, ViewerClient, ViewerEvent, ViewerHandle};
pub use connector::{Connector, RelayConnector, ViewerLink, WsConnector};
pub use machine::{
    Action, BackoffPolicy, ConnectionEvent, ConnectionMachine, ConnectionState, Transition,
};

#[cfg(test)]
mod tests;
