// Filesystem-backed cache store.
// One JSON document per key at <root>/<kind>/<identifier>.json, written atomically.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{BlocksError, Result};

use super::key::CacheKey;
use super::store::{CacheEntry, CacheStore};

/// Get the platform cache directory (~/.cache/blocks-for-github on Linux).
pub fn default_cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "blocks-for-github").map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Cache store that persists entries as JSON files under a root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at the configured cache directory, or the platform default.
    pub fn from_config(config: &Config) -> Result<Self> {
        config
            .cache_dir
            .clone()
            .or_else(default_cache_dir)
            .map(Self::new)
            .ok_or(BlocksError::NoCacheDir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the document holding `key`.
    ///
    /// Repository slugs nest naturally: `repository/octocat/hello-world.json`.
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        let mut path = self.root.join(key.kind().as_str());
        let mut segments = key.identifier().split('/').peekable();
        while let Some(segment) = segments.next() {
            let name = sanitize_name(segment);
            if segments.peek().is_some() {
                path.push(name);
            } else {
                // Repo names may contain dots, so append rather than set_extension.
                path.push(format!("{}.json", name));
            }
        }
        path
    }

    fn remove(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl CacheStore for FileStore {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(key);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: CacheEntry = match serde_json::from_str(&contents) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(
                    %key,
                    path = %path.display(),
                    error = %e,
                    "discarding unreadable cache entry"
                );
                Self::remove(&path)?;
                return Ok(None);
            }
        };

        if entry.is_expired() {
            debug!(%key, "cache entry expired");
            Self::remove(&path)?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    fn put(&self, key: &CacheKey, value: Value, ttl: Duration) -> Result<()> {
        let path = self.entry_path(key);
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)?;

        let entry = CacheEntry::new(value, ttl);
        let json = serde_json::to_string_pretty(&entry)?;

        // Each writer gets its own temp file; the rename decides the winner.
        let mut file = NamedTempFile::new_in(parent)?;
        file.write_all(json.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&path).map_err(|e| e.error)?;

        Ok(())
    }

    fn delete(&self, key: &CacheKey) -> Result<()> {
        Self::remove(&self.entry_path(key))
    }
}

/// Sanitize a name for use in filesystem paths.
/// Replaces problematic characters with underscores.
fn sanitize_name(name: &str) -> String {
    match name {
        "." | ".." => "_".repeat(name.len()),
        _ => name
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                _ => c,
            })
            .collect(),
    }
}
