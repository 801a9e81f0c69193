// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! History data model.
//!
//! A history is an ordered list of diagram entries, each optionally filed under a collection.

pub mod entry;
pub mod ids;

pub use entry::{
    normalize_title, CollectionName, CollectionNameError, DiagramEntry, DiagramPatch,
    DEFAULT_TITLE, MAX_COLLECTION_NAME_CHARS, MAX_TITLE_CHARS,
};
pub use ids::{EntryId, IdError};
