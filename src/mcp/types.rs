// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::render::DiagramKind;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DiagramRenderParams {
    /// Mermaid source of the diagram.
    pub diagram: String,
    /// Short human-readable title shown in the history.
    pub title: String,
    /// Optional CSS background color for the viewer, e.g. `#ffffff` or `transparent`.
    #[serde(default)]
    pub background: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DiagramRenderResponse {
    pub id: String,
    pub title: String,
    pub collection: Option<String>,
    pub kind: DiagramKind,
    /// Background sent to the viewers, normalized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    /// Viewers connected when the diagram was pushed.
    pub viewers: usize,
    /// Whether at least one viewer reported being visible.
    pub viewer_visible: bool,
    /// Whether a new viewer was launched because none was connected.
    pub opened: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ViewerOpenResponse {
    pub opened: bool,
    pub connected_viewers: usize,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct HistoryListParams {
    /// Only list entries in this collection.
    #[serde(default)]
    pub collection: Option<String>,
    /// Keep only the most recent `limit` entries.
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HistoryEntry {
    pub id: String,
    pub title: String,
    pub collection: Option<String>,
    pub diagram: String,
    /// RFC 3339 timestamp.
    pub created_at: String,
    /// RFC 3339 timestamp.
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HistoryListResponse {
    /// Oldest first.
    pub entries: Vec<HistoryEntry>,
    pub total: usize,
    pub collections: Vec<String>,
}
