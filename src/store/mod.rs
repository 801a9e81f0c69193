// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Persistence for diagram history on disk.
//!
//! The store keeps every rendered diagram and the collection list in a single JSON file under the
//! configured data root. The file is read in full and rewritten in full on each mutation.

pub mod history_file;

pub use history_file::{HistoryStore, StoreError, StoreErrorKind, WriteDurability};
