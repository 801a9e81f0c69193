// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::{Json, Parameters};
use rmcp::model::{ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData, ServerHandler, ServiceExt};
use tracing::{debug, info, warn};

use crate::collection::CollectionResolver;
use crate::hub::BroadcastHub;
use crate::launcher::{SystemLauncher, ViewerLauncher};
use crate::model::{CollectionName, DiagramEntry};
use crate::protocol::Envelope;
use crate::render::{
    DiagramRenderer, MermaidSourceValidator, RenderError, RenderOptions, RenderedArtifact,
};
use crate::store::{HistoryStore, StoreError, StoreErrorKind};

use super::types::*;

/// Tool surface of the live preview: render into the history and push to viewers.
#[derive(Clone)]
pub struct NereidLiveMcp {
    store: HistoryStore,
    hub: BroadcastHub,
    resolver: CollectionResolver,
    renderer: Arc<dyn DiagramRenderer>,
    launcher: Arc<dyn ViewerLauncher>,
    work_dir: PathBuf,
    viewer_url: String,
    auto_open: bool,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl NereidLiveMcp {
    pub fn new(store: HistoryStore, hub: BroadcastHub, viewer_url: impl Into<String>) -> Self {
        Self {
            store,
            hub,
            resolver: CollectionResolver::default(),
            renderer: Arc::new(MermaidSourceValidator),
            launcher: Arc::new(SystemLauncher),
            work_dir: PathBuf::from("."),
            viewer_url: viewer_url.into(),
            auto_open: true,
            tool_router: Self::tool_router(),
        }
    }

    /// Directory whose version-control root names the collection of rendered diagrams.
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn with_auto_open(mut self, auto_open: bool) -> Self {
        self.auto_open = auto_open;
        self
    }

    pub fn with_resolver(mut self, resolver: CollectionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_renderer(mut self, renderer: impl DiagramRenderer) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    pub fn with_launcher(mut self, launcher: impl ViewerLauncher) -> Self {
        self.launcher = Arc::new(launcher);
        self
    }

    pub fn viewer_url(&self) -> &str {
        &self.viewer_url
    }

    pub async fn serve_stdio(self) -> Result<(), rmcp::RmcpError> {
        let service = self.serve((tokio::io::stdin(), tokio::io::stdout())).await?;
        service.waiting().await?;
        Ok(())
    }

    /// Validate a Mermaid diagram, record it in the history and push it to every connected
    /// viewer. Launches a viewer when none is connected.
    #[tool(name = "diagram.render")]
    async fn diagram_render(
        &self,
        params: Parameters<DiagramRenderParams>,
    ) -> Result<Json<DiagramRenderResponse>, ErrorData> {
        let DiagramRenderParams {
            diagram,
            title,
            background,
        } = params.0;

        let RenderedArtifact {
            kind,
            source,
            background,
        } = self
            .renderer
            .render(&diagram, &RenderOptions { background })
            .map_err(render_error)?;

        let collection = self.resolver.resolve(&self.work_dir);
        let entry = self
            .store
            .save_diagram(source, &title, collection)
            .await
            .map_err(store_error)?;

        let envelope =
            Envelope::render_result(entry.diagram()).with_background(background.clone());
        let report = self.hub.broadcast(&envelope);
        let viewers = self.hub.connection_count();
        debug!(
            id = %entry.id(),
            delivered = report.delivered,
            dropped = report.dropped,
            "diagram pushed"
        );

        let viewer_visible = viewers > 0 && self.hub.query_all_visibility().await;
        let opened = viewers == 0 && self.auto_open && self.launch_viewer().is_ok();

        Ok(Json(DiagramRenderResponse {
            id: entry.id().to_string(),
            title: entry.title().to_owned(),
            collection: entry.collection().map(|name| name.as_str().to_owned()),
            kind,
            background,
            viewers,
            viewer_visible,
            opened,
        }))
    }

    /// Bring a viewer to the front. A new one is launched only when no connected viewer
    /// reports being visible.
    #[tool(name = "viewer.open")]
    async fn viewer_open(&self) -> Result<Json<ViewerOpenResponse>, ErrorData> {
        let connected_viewers = self.hub.connection_count();
        let visible = self.hub.query_all_visibility().await;

        let opened = if visible {
            false
        } else {
            self.launch_viewer().map_err(|err| {
                ErrorData::internal_error(
                    err.to_string(),
                    Some(serde_json::json!({ "url": self.viewer_url })),
                )
            })?;
            true
        };

        Ok(Json(ViewerOpenResponse {
            opened,
            connected_viewers,
        }))
    }

    /// List recorded diagrams, optionally restricted to one collection.
    #[tool(name = "history.list")]
    async fn history_list(
        &self,
        params: Parameters<HistoryListParams>,
    ) -> Result<Json<HistoryListResponse>, ErrorData> {
        let HistoryListParams { collection, limit } = params.0;
        let collection = parse_collection_filter(collection)?;

        let entries = self
            .store
            .get_diagrams(collection.as_ref().map(CollectionName::as_str))
            .await
            .map_err(store_error)?;
        let collections = self.store.get_collections().await.map_err(store_error)?;

        let total = entries.len();
        let skip = limit.map_or(0, |limit| total.saturating_sub(limit));
        Ok(Json(HistoryListResponse {
            entries: entries.iter().skip(skip).map(history_entry).collect(),
            total,
            collections: collections.into_iter().map(String::from).collect(),
        }))
    }

    fn launch_viewer(&self) -> Result<(), crate::launcher::LaunchError> {
        info!(url = %self.viewer_url, "opening viewer");
        self.launcher.open(&self.viewer_url).inspect_err(|err| {
            warn!(error = %err, "could not open viewer");
        })
    }
}

#[tool_handler]
impl ServerHandler for NereidLiveMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Nereid live diagram preview (tools: diagram.render, viewer.open, history.list). Rendered Mermaid diagrams are stored in a history grouped by project and shown live in connected viewers."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// Error mapping and response shaping for the tool handlers.
include!("server/helpers.rs");
