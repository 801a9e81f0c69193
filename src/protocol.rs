// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Messages exchanged between the hub and its viewers.
//!
//! Every message is a JSON object with a `type` discriminant. Unknown types decode to
//! [`Envelope::Unknown`] so both ends can ignore them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    /// Hub → viewer: a diagram to display, optionally on a CSS background color.
    RenderResult {
        diagram: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        background: Option<String>,
    },
    /// Hub → viewer: asks whether the viewer is visible/focused.
    VisibilityQuery,
    /// Viewer → hub: answer to [`Envelope::VisibilityQuery`].
    VisibilityResponse {
        #[serde(rename = "isVisible")]
        is_visible: bool,
    },
    #[serde(other)]
    Unknown,
}

impl Envelope {
    pub fn render_result(diagram: impl Into<String>) -> Self {
        Self::RenderResult {
            diagram: diagram.into(),
            background: None,
        }
    }

    /// Sets the background of a `render_result`; other messages are returned unchanged.
    pub fn with_background(self, background: Option<String>) -> Self {
        match self {
            Self::RenderResult { diagram, .. } => Self::RenderResult {
                diagram,
                background,
            },
            other => other,
        }
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn encode(&self) -> String {
        // Serializing a tagged enum of strings and bools cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| String::from(r#"{"type":"unknown"}"#))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RenderResult { .. } => "render_result",
            Self::VisibilityQuery => "visibility_query",
            Self::VisibilityResponse { .. } => "visibility_response",
            Self::Unknown => "unknown",
        }
    }
}

/// Connection-level failure on the live channel.
///
/// These never reach a viewer's owner as errors; the viewer folds them into its connection state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("live channel closed")]
    Closed,
    #[error("cannot connect to {endpoint}: {message}")]
    Connect { endpoint: String, message: String },
    #[error("hub is unavailable")]
    Unavailable,
}
