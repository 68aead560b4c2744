//! Account Store
//!
//! Durable single-document persistence for paper trading accounts: one JSON
//! file mapping timeframe label -> full account snapshot, rewritten after
//! every trade and loaded at startup.

use crate::types::Account;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The document exists but cannot be parsed. Fatal at startup: silently
    /// discarding history is worse than refusing to start.
    #[error("corrupt account document {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("persistence task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// JSON-file document store for account state.
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    /// Create a store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all accounts. A missing file yields an empty map; a file that
    /// exists but does not parse is an error.
    pub fn load(&self) -> Result<HashMap<String, Account>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No account document at {:?}, starting empty", self.path);
                return Ok(HashMap::new());
            }
            Err(e) => {
                return Err(StoreError::Io {
                    path: self.path.display().to_string(),
                    source: e,
                })
            }
        };

        let accounts: HashMap<String, Account> =
            serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
                path: self.path.display().to_string(),
                source: e,
            })?;

        info!(
            "Loaded {} account(s) from {:?}",
            accounts.len(),
            self.path
        );
        Ok(accounts)
    }

    /// Persist the account document. Serializes up front, then hands the
    /// file write to a blocking thread so disk I/O never stalls a runtime
    /// worker. The caller may pass the owned map or a borrowed view of it.
    pub async fn save<T: Serialize>(&self, accounts: &T) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(accounts)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_document(&path, &content)).await?
    }
}

/// Write to a temp file in the same directory and rename over the target so
/// a crash mid-write never leaves a torn document.
fn write_document(path: &Path, content: &str) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content).map_err(|e| StoreError::Io {
        path: tmp.display().to_string(),
        source: e,
    })?;

    if let Err(e) = fs::rename(&tmp, path) {
        warn!("Failed to commit account document: {}", e);
        let _ = fs::remove_file(&tmp);
        return Err(StoreError::Io {
            path: path.display().to_string(),
            source: e,
        });
    }

    debug!("Saved account document to {:?}", path);
    Ok(())
}
