// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Nereid Live: live Mermaid preview and diagram history for MCP agents.
//!
//! An agent renders a diagram through [`mcp`]; it is validated by [`render`], filed under the
//! collection of the agent's repository ([`collection`]) in the [`store`], and fanned out by the
//! [`hub`] to every connected viewer. Viewers keep their channel alive with the reconnecting
//! state machine in [`viewer`].

pub mod collection;
pub mod config;
pub mod http;
pub mod hub;
pub mod launcher;
pub mod logging;
pub mod mcp;
pub mod model;
pub mod protocol;
pub mod render;
pub mod store;
pub mod viewer;
