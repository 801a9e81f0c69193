// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Derives a collection name from the version-control root enclosing a working directory.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::model::CollectionName;

/// Ancestor directories inspected before giving up.
pub const MAX_ANCESTOR_STEPS: usize = 64;

/// Entries whose presence marks a directory as a repository root.
///
/// `.git` may be a directory or, for worktrees and submodules, a file.
const VCS_MARKERS: &[&str] = &[".git", ".hg", ".jj", ".svn"];

#[derive(Debug, Clone)]
pub struct CollectionResolver {
    max_steps: usize,
}

impl Default for CollectionResolver {
    fn default() -> Self {
        Self {
            max_steps: MAX_ANCESTOR_STEPS,
        }
    }
}

impl CollectionResolver {
    pub fn with_max_steps(max_steps: usize) -> Self {
        Self { max_steps }
    }

    /// Returns the collection for `work_dir`, or `None` when no repository root is found.
    ///
    /// Never fails: unreadable directories and names that are not valid collection names
    /// resolve to `None`.
    pub fn resolve(&self, work_dir: &Path) -> Option<CollectionName> {
        let root = self.find_root(work_dir)?;
        let base = root.file_name()?.to_str()?;
        match CollectionName::new(base) {
            Ok(name) => Some(name),
            Err(err) => {
                debug!(root = %root.display(), error = %err, "repository name is not a collection");
                None
            }
        }
    }

    /// Nearest ancestor of `work_dir` (inclusive) that carries a VCS marker.
    pub fn find_root(&self, work_dir: &Path) -> Option<PathBuf> {
        let start = match std::path::absolute(work_dir) {
            Ok(path) => path,
            Err(err) => {
                debug!(dir = %work_dir.display(), error = %err, "cannot absolutize work dir");
                return None;
            }
        };

        start
            .ancestors()
            .take(self.max_steps.saturating_add(1))
            .find(|dir| is_repository_root(dir))
            .map(Path::to_path_buf)
    }
}

fn is_repository_root(dir: &Path) -> bool {
    VCS_MARKERS
        .iter()
        .any(|marker| std::fs::symlink_metadata(dir.join(marker)).is_ok())
}
