// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the on-disk storage layout.

use std::path::{Path, PathBuf};

/// Default base directory for wallet data.
pub const DATA_ROOT: &str = "./wallet-data";

/// Storage path utilities for the file-backed stores.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all wallet data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding plaintext entries.
    pub fn plaintext_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    /// Directory holding secret entries.
    ///
    /// Hosts that can should mount this on an encrypted volume or back it with
    /// the platform keychain instead.
    pub fn secure_dir(&self) -> PathBuf {
        self.root.join("secure")
    }
}

/// Path of a single entry inside a store directory.
pub fn entry_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(key)
}

/// Keys become file names, so only a conservative character set is allowed.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 128
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}
