// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Model Context Protocol (MCP) server surface.
//!
//! Agents render diagrams through this layer; viewers pick them up over the live channel.

mod server;
mod types;

pub use server::NereidLiveMcp;
pub use types::{
    DiagramRenderParams, DiagramRenderResponse, HistoryEntry, HistoryListParams,
    HistoryListResponse, ViewerOpenResponse,
};
