// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::borrow::Borrow;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::EntryId;

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_COLLECTION_NAME_CHARS: usize = 100;
pub const DEFAULT_TITLE: &str = "Untitled";

/// Name of a collection of history entries.
///
/// Names are compared case-sensitively and stored exactly as given, so surrounding whitespace is
/// rejected rather than trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionName(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CollectionNameError {
    #[error("collection name must not be empty")]
    Empty,
    #[error("collection name must not exceed 100 characters")]
    TooLong,
    #[error("collection name must not contain control characters")]
    ControlChar,
    #[error("collection name must not start or end with whitespace")]
    SurroundingWhitespace,
}

impl CollectionName {
    pub fn new(value: impl AsRef<str>) -> Result<Self, CollectionNameError> {
        let value = value.as_ref();
        if value.trim().is_empty() {
            return Err(CollectionNameError::Empty);
        }
        if value.chars().count() > MAX_COLLECTION_NAME_CHARS {
            return Err(CollectionNameError::TooLong);
        }
        if value.chars().any(char::is_control) {
            return Err(CollectionNameError::ControlChar);
        }
        if value.trim() != value {
            return Err(CollectionNameError::SurroundingWhitespace);
        }
        Ok(Self(value.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CollectionName {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<String> for CollectionName {
    type Error = CollectionNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CollectionName> for String {
    fn from(value: CollectionName) -> Self {
        value.0
    }
}

/// A persisted diagram together with its display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramEntry {
    id: EntryId,
    diagram: String,
    title: String,
    collection: Option<CollectionName>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DiagramEntry {
    pub fn new(
        id: EntryId,
        diagram: impl Into<String>,
        title: &str,
        collection: Option<CollectionName>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            diagram: diagram.into(),
            title: normalize_title(title),
            collection,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &EntryId {
        &self.id
    }

    pub fn diagram(&self) -> &str {
        &self.diagram
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn collection(&self) -> Option<&CollectionName> {
        self.collection.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Applies every field present in `patch` and refreshes `updated_at`.
    ///
    /// `updated_at` never moves backwards, even if the wall clock does.
    pub fn apply(&mut self, patch: DiagramPatch, now: DateTime<Utc>) {
        if let Some(diagram) = patch.diagram {
            self.diagram = diagram;
        }
        if let Some(title) = patch.title {
            self.title = normalize_title(&title);
        }
        if let Some(collection) = patch.collection {
            self.collection = collection;
        }
        self.updated_at = now.max(self.updated_at);
    }
}

/// Partial update of a [`DiagramEntry`]; `None` fields are left untouched.
///
/// `collection: Some(None)` clears the collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagramPatch {
    pub diagram: Option<String>,
    pub title: Option<String>,
    pub collection: Option<Option<CollectionName>>,
}

/// Blank titles become [`DEFAULT_TITLE`]; others are kept verbatim up to [`MAX_TITLE_CHARS`].
pub fn normalize_title(raw: &str) -> String {
    if raw.trim().is_empty() {
        return DEFAULT_TITLE.to_owned();
    }
    match raw.char_indices().nth(MAX_TITLE_CHARS) {
        Some((cut, _)) => raw[..cut].to_owned(),
        None => raw.to_owned(),
    }
}
