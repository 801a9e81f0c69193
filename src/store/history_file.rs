// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::model::{CollectionName, DiagramEntry, DiagramPatch, EntryId};

const HISTORY_FILENAME: &str = "nereid-live-history.json";
const HISTORY_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("json error at {path:?}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("unsupported history file version {found} at {path:?}")]
    UnsupportedVersion { path: PathBuf, found: u32 },
    #[error("refusing to write through symlink at {path:?}")]
    SymlinkRefused { path: PathBuf },
    #[error("diagram {id} not found")]
    DiagramNotFound { id: EntryId },
    #[error("collection {name:?} not found")]
    CollectionNotFound { name: String },
    #[error("collection {name:?} already exists")]
    CollectionExists { name: String },
}

/// Coarse classification used by the tool and HTTP surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    Storage,
    NotFound,
    Conflict,
}

impl StoreError {
    pub fn kind(&self) -> StoreErrorKind {
        match self {
            Self::Io { .. }
            | Self::Json { .. }
            | Self::UnsupportedVersion { .. }
            | Self::SymlinkRefused { .. } => StoreErrorKind::Storage,
            Self::DiagramNotFound { .. } | Self::CollectionNotFound { .. } => {
                StoreErrorKind::NotFound
            }
            Self::CollectionExists { .. } => StoreErrorKind::Conflict,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum WriteDurability {
    /// Fast, best-effort persistence.
    ///
    /// - Writes a temp file and renames atomically into place.
    /// - Does not perform per-file fsync/sync.
    #[default]
    BestEffort,

    /// Slower, best-effort durability.
    ///
    /// Attempts to flush written file contents and rename operations to stable storage where
    /// possible. Exact guarantees are platform/filesystem-dependent.
    Durable,
}

/// On-disk shape of the history file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct HistoryDocument {
    version: u32,
    #[serde(default)]
    collections: Vec<CollectionName>,
    #[serde(default)]
    diagrams: Vec<DiagramEntry>,
}

impl Default for HistoryDocument {
    fn default() -> Self {
        Self {
            version: HISTORY_VERSION,
            collections: Vec::new(),
            diagrams: Vec::new(),
        }
    }
}

impl HistoryDocument {
    fn ensure_collection(&mut self, name: &CollectionName) -> bool {
        if self.collections.contains(name) {
            return false;
        }
        self.collections.push(name.clone());
        true
    }

    fn position(&self, id: &EntryId) -> Result<usize, StoreError> {
        self.diagrams
            .iter()
            .position(|entry| entry.id() == id)
            .ok_or_else(|| StoreError::DiagramNotFound { id: id.clone() })
    }

    fn fresh_id(&self) -> EntryId {
        loop {
            let id = EntryId::generate();
            if !self.diagrams.iter().any(|entry| entry.id() == &id) {
                return id;
            }
        }
    }

    /// Collections referenced by entries but missing from the list are re-added.
    fn repair(&mut self) {
        let referenced = self
            .diagrams
            .iter()
            .filter_map(|entry| entry.collection().cloned())
            .collect::<Vec<_>>();
        for name in referenced {
            self.ensure_collection(&name);
        }
        let mut seen = Vec::with_capacity(self.collections.len());
        self.collections.retain(|name| {
            if seen.contains(name) {
                return false;
            }
            seen.push(name.clone());
            true
        });
    }
}

/// File-backed history of rendered diagrams and their collections.
///
/// Every mutation re-reads the whole file, applies the change and rewrites the file atomically.
/// Mutations are serialized through a per-file gate shared by every `HistoryStore` in the
/// process that points at the same file; reads share the gate and never observe a write in
/// progress.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    root: PathBuf,
    durability: WriteDurability,
    gate: Arc<RwLock<()>>,
}

impl HistoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let gate = history_gate(&root.join(HISTORY_FILENAME));
        Self {
            root,
            durability: WriteDurability::default(),
            gate,
        }
    }

    pub fn with_durability(mut self, durability: WriteDurability) -> Self {
        self.durability = durability;
        self
    }

    pub fn durability(&self) -> WriteDurability {
        self.durability
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn history_path(&self) -> PathBuf {
        self.root.join(HISTORY_FILENAME)
    }

    /// Creates a new entry; an unknown `collection` is created on the fly.
    pub async fn save_diagram(
        &self,
        diagram: impl Into<String>,
        title: &str,
        collection: Option<CollectionName>,
    ) -> Result<DiagramEntry, StoreError> {
        let diagram = diagram.into();
        let entry = self
            .mutate(|doc, now| {
                if let Some(name) = &collection {
                    doc.ensure_collection(name);
                }
                let entry = DiagramEntry::new(doc.fresh_id(), diagram, title, collection, now);
                doc.diagrams.push(entry.clone());
                Ok(entry)
            })
            .await?;
        info!(
            id = %entry.id(),
            collection = entry.collection().map(CollectionName::as_str),
            "saved diagram"
        );
        Ok(entry)
    }

    /// Lists entries oldest first, optionally restricted to one collection.
    pub async fn get_diagrams(
        &self,
        collection: Option<&str>,
    ) -> Result<Vec<DiagramEntry>, StoreError> {
        let doc = self.read().await?;
        Ok(doc
            .diagrams
            .into_iter()
            .filter(|entry| match collection {
                Some(name) => entry.collection().is_some_and(|c| c.as_str() == name),
                None => true,
            })
            .collect())
    }

    pub async fn get_diagram(&self, id: &EntryId) -> Result<DiagramEntry, StoreError> {
        let mut doc = self.read().await?;
        let index = doc.position(id)?;
        Ok(doc.diagrams.swap_remove(index))
    }

    pub async fn update_diagram(
        &self,
        id: &EntryId,
        patch: DiagramPatch,
    ) -> Result<DiagramEntry, StoreError> {
        self.mutate(|doc, now| {
            let index = doc.position(id)?;
            if let Some(Some(name)) = &patch.collection {
                doc.ensure_collection(name);
            }
            let entry = &mut doc.diagrams[index];
            entry.apply(patch, now);
            Ok(entry.clone())
        })
        .await
    }

    pub async fn delete_diagram(&self, id: &EntryId) -> Result<(), StoreError> {
        self.mutate(|doc, _| {
            let index = doc.position(id)?;
            doc.diagrams.remove(index);
            Ok(())
        })
        .await?;
        debug!(id = %id, "deleted diagram");
        Ok(())
    }

    pub async fn move_diagram(
        &self,
        id: &EntryId,
        collection: Option<CollectionName>,
    ) -> Result<DiagramEntry, StoreError> {
        let patch = DiagramPatch {
            collection: Some(collection),
            ..DiagramPatch::default()
        };
        self.update_diagram(id, patch).await
    }

    /// Collection names in creation order.
    pub async fn get_collections(&self) -> Result<Vec<CollectionName>, StoreError> {
        Ok(self.read().await?.collections)
    }

    pub async fn create_collection(
        &self,
        name: CollectionName,
    ) -> Result<CollectionName, StoreError> {
        self.mutate(|doc, _| {
            if !doc.ensure_collection(&name) {
                return Err(StoreError::CollectionExists {
                    name: name.as_str().to_owned(),
                });
            }
            Ok(name.clone())
        })
        .await
    }

    /// Removes a collection; its entries are kept and become uncollected.
    pub async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
        self.mutate(|doc, now| {
            let Some(index) = doc.collections.iter().position(|c| c.as_str() == name) else {
                return Err(StoreError::CollectionNotFound {
                    name: name.to_owned(),
                });
            };
            doc.collections.remove(index);
            for entry in &mut doc.diagrams {
                if entry.collection().is_some_and(|c| c.as_str() == name) {
                    entry.apply(
                        DiagramPatch {
                            collection: Some(None),
                            ..DiagramPatch::default()
                        },
                        now,
                    );
                }
            }
            Ok(())
        })
        .await
    }

    async fn read(&self) -> Result<HistoryDocument, StoreError> {
        let _guard = self.gate.read().await;
        let path = self.history_path();
        run_blocking(&path, {
            let path = path.clone();
            move || load_document(&path)
        })
        .await
    }

    /// One read-modify-write cycle under the write side of the gate.
    ///
    /// File IO runs on the blocking pool so a slow (or fsynced) write does not stall the
    /// runtime thread that also serves the viewers.
    async fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut HistoryDocument, DateTime<Utc>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.gate.write().await;
        let path = self.history_path();
        let mut doc = run_blocking(&path, {
            let path = path.clone();
            move || load_document(&path)
        })
        .await?;
        let output = apply(&mut doc, Utc::now())?;

        let written = run_blocking(&path, {
            let root = self.root.clone();
            let path = path.clone();
            let durability = self.durability;
            move || {
                let mut contents = serde_json::to_string_pretty(&doc).map_err(|source| {
                    StoreError::Json {
                        path: path.clone(),
                        source,
                    }
                })?;
                contents.push('\n');
                write_atomic(&root, &path, contents.as_bytes(), durability)
            }
        })
        .await;
        if let Err(err) = written {
            warn!(path = %path.display(), error = %err, "history write failed");
            return Err(err);
        }
        Ok(output)
    }
}

async fn run_blocking<T: Send + 'static>(
    path: &Path,
    job: impl FnOnce() -> Result<T, StoreError> + Send + 'static,
) -> Result<T, StoreError> {
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|err| StoreError::Io {
            path: path.to_path_buf(),
            source: io::Error::other(err),
        })?
}

fn history_gate(path: &Path) -> Arc<RwLock<()>> {
    static GATES: OnceLock<Mutex<HashMap<PathBuf, Arc<RwLock<()>>>>> = OnceLock::new();

    let key = gate_key(path);

    let mut gates = GATES
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    gates.entry(key).or_default().clone()
}

/// `path` with symlinks resolved in its longest existing prefix.
///
/// The data root may not exist yet, so the missing tail is appended to the canonical prefix.
/// Two spellings of one folder then share a gate.
fn gate_key(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut existing = absolute.as_path();
    let mut missing: Vec<OsString> = Vec::new();
    loop {
        if let Ok(canonical) = fs::canonicalize(existing) {
            return missing
                .iter()
                .rev()
                .fold(canonical, |key, part| key.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return absolute.clone(),
        }
    }
}

// Low-level file helpers for the history store.
include!("history_file/helpers.rs");

#[cfg(test)]
mod tests;
