// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Local HTTP surface: the viewer page, the viewer websocket and the history API.
//!
//! | Method | Path | |
//! |---|---|---|
//! | GET | `/` | viewer page |
//! | GET | `/ws` | viewer websocket |
//! | GET, POST | `/api/diagrams[?collection=]` | list / create entries |
//! | GET, PATCH, DELETE | `/api/diagrams/{id}` | read / update / delete one entry |
//! | PUT | `/api/diagrams/{id}/collection` | move an entry |
//! | GET, POST | `/api/collections` | list / create collections |
//! | DELETE | `/api/collections/{name}` | delete a collection |

use std::net::SocketAddr;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{delete, get, put};
use axum::Router;
use serde::{Deserialize, Deserializer};
use tracing::{debug, error};

use crate::hub::{self, BroadcastHub};
use crate::model::{CollectionName, CollectionNameError, DiagramEntry, DiagramPatch, EntryId, IdError};
use crate::store::{HistoryStore, StoreError, StoreErrorKind};

const VIEWER_PAGE: &str = include_str!("http/viewer.html");

/// Shared state of the HTTP handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: HistoryStore,
    pub hub: BroadcastHub,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(viewer_page))
        .route("/ws", get(viewer_socket))
        .route("/api/diagrams", get(list_diagrams).post(create_diagram))
        .route(
            "/api/diagrams/{id}",
            get(get_diagram).patch(update_diagram).delete(delete_diagram),
        )
        .route("/api/diagrams/{id}/collection", put(move_diagram))
        .route("/api/collections", get(list_collections).post(create_collection))
        .route("/api/collections/{name}", delete(delete_collection))
        .with_state(state)
}

/// Page a browser opens to watch diagrams arrive.
pub fn viewer_url(addr: SocketAddr) -> String {
    format!("http://{addr}/")
}

/// Websocket endpoint viewers connect to.
pub fn ws_url(addr: SocketAddr) -> String {
    format!("ws://{addr}/ws")
}

/// Failure of an API call, rendered as `{ "error": <kind>, "message": <text> }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "invalid_input",
            message: message.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let (status, kind) = match err.kind() {
            StoreErrorKind::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            StoreErrorKind::Conflict => (StatusCode::CONFLICT, "conflict"),
            StoreErrorKind::Storage => {
                error!(error = %err, "history storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage")
            }
        };
        Self {
            status,
            kind,
            message: err.to_string(),
        }
    }
}

impl From<CollectionNameError> for ApiError {
    fn from(err: CollectionNameError) -> Self {
        Self::invalid_input(err.to_string())
    }
}

impl From<IdError> for ApiError {
    fn from(err: IdError) -> Self {
        Self::invalid_input(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.kind,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
struct ListQuery {
    collection: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateDiagramRequest {
    diagram: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    collection: Option<String>,
}

/// Absent fields are left alone; `"collection": null` clears the collection.
#[derive(Debug, Deserialize)]
struct UpdateDiagramRequest {
    #[serde(default)]
    diagram: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    collection: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct MoveDiagramRequest {
    collection: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateCollectionRequest {
    name: String,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn collection_name(raw: Option<String>) -> ApiResult<Option<CollectionName>> {
    raw.map(CollectionName::new).transpose().map_err(ApiError::from)
}

async fn viewer_page() -> Html<&'static str> {
    Html(VIEWER_PAGE)
}

async fn viewer_socket(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    debug!("viewer websocket upgrade");
    ws.on_upgrade(move |socket| hub::ws::serve_socket(state.hub, socket))
}

async fn list_diagrams(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<DiagramEntry>>> {
    let entries = state.store.get_diagrams(query.collection.as_deref()).await?;
    Ok(Json(entries))
}

async fn create_diagram(
    State(state): State<AppState>,
    Json(request): Json<CreateDiagramRequest>,
) -> ApiResult<(StatusCode, Json<DiagramEntry>)> {
    let collection = collection_name(request.collection)?;
    let entry = state
        .store
        .save_diagram(request.diagram, &request.title, collection)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn get_diagram(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DiagramEntry>> {
    let id = EntryId::new(id)?;
    Ok(Json(state.store.get_diagram(&id).await?))
}

async fn update_diagram(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateDiagramRequest>,
) -> ApiResult<Json<DiagramEntry>> {
    let id = EntryId::new(id)?;
    let collection = match request.collection {
        Some(raw) => Some(collection_name(raw)?),
        None => None,
    };
    let patch = DiagramPatch {
        diagram: request.diagram,
        title: request.title,
        collection,
    };
    Ok(Json(state.store.update_diagram(&id, patch).await?))
}

async fn delete_diagram(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = EntryId::new(id)?;
    state.store.delete_diagram(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn move_diagram(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<MoveDiagramRequest>,
) -> ApiResult<Json<DiagramEntry>> {
    let id = EntryId::new(id)?;
    let collection = collection_name(request.collection)?;
    Ok(Json(state.store.move_diagram(&id, collection).await?))
}

async fn list_collections(State(state): State<AppState>) -> ApiResult<Json<Vec<CollectionName>>> {
    Ok(Json(state.store.get_collections().await?))
}

async fn create_collection(
    State(state): State<AppState>,
    Json(request): Json<CreateCollectionRequest>,
) -> ApiResult<(StatusCode, Json<CollectionName>)> {
    let name = CollectionName::new(&request.name)?;
    let created = state.store.create_collection(name).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn delete_collection(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.delete_collection(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
