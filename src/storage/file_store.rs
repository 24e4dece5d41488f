// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File-backed [`KeyValueStore`]: one file per key under a root directory.
//!
//! ## Security Note
//!
//! This module does **not** encrypt anything. Values that must be secret are
//! already vault bundles by the time they reach storage; the secure store
//! directory is created with owner-only permissions on Unix.
//!
//! Writes go to a temp file first and are renamed into place, so a crash
//! never leaves a half-written entry behind.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::paths::{entry_path, is_valid_key};
use super::KeyValueStore;

/// Error type for storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error during file operations
    Io(io::Error),
    /// Key contains characters that cannot be mapped to a file name
    InvalidKey(String),
    /// Store directory could not be created or is not usable
    Unavailable(String),
    /// Stored value is not valid UTF-8 or was modified outside the store
    IntegrityViolation(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            StorageError::InvalidKey(key) => write!(f, "Invalid storage key: {key}"),
            StorageError::Unavailable(msg) => write!(f, "Storage unavailable: {msg}"),
            StorageError::IntegrityViolation(msg) => write!(f, "Integrity violation: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::PermissionDenied => StorageError::Unavailable(e.to_string()),
            io::ErrorKind::InvalidData => StorageError::IntegrityViolation(e.to_string()),
            _ => StorageError::Io(e),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Directory-backed key/value store.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    ///
    /// Safe to call multiple times (idempotent).
    pub fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            StorageError::Unavailable(format!("cannot create {}: {e}", dir.display()))
        })?;
        restrict_permissions(&dir)?;
        Ok(Self { dir })
    }

    /// Directory this store writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Check that the directory is writable.
    ///
    /// Performs a write-read-delete round trip on a hidden probe file.
    pub fn health_check(&self) -> StorageResult<()> {
        let probe = self.dir.join(".health_check");
        let data = b"health_check_data";

        fs::write(&probe, data)?;
        let read_back = fs::read(&probe)?;
        fs::remove_file(&probe)?;

        if read_back != data {
            return Err(StorageError::IntegrityViolation(
                "Health check data mismatch".to_string(),
            ));
        }
        Ok(())
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        if !is_valid_key(key) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(entry_path(&self.dir, key))
    }

    fn read_entry(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => String::from_utf8(bytes).map(Some).map_err(|_| {
                StorageError::IntegrityViolation(format!("{key} is not valid UTF-8"))
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_entry(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;

        // Write to temp file first, then rename for atomicity
        let temp_path = self.dir.join(format!(".{key}.tmp"));
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(value.as_bytes())?;
            writer.flush()?;
        }

        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn remove_entry(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(dir: &Path) -> StorageResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_dir: &Path) -> StorageResult<()> {
    Ok(())
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.read_entry(key)
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.write_entry(key, value)
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.remove_entry(key)
    }
}
