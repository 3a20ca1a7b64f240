//! Path management for the ledger core
//!
//! Provides XDG-compliant path resolution for per-identity stores and gate
//! records.
//!
//! ## Path Resolution Order
//!
//! 1. `POCKET_LEDGER_DATA_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_DATA_HOME/pocket-ledger` or `~/.local/share/pocket-ledger`
//! 3. Windows: `%APPDATA%\pocket-ledger`

use std::path::PathBuf;

use crate::error::LedgerError;

/// Manages all paths used by the ledger core
#[derive(Debug, Clone)]
pub struct LedgerPaths {
    /// Base directory for all ledger data
    base_dir: PathBuf,
}

impl LedgerPaths {
    /// Create a new LedgerPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, LedgerError> {
        let base_dir = if let Ok(custom) = std::env::var("POCKET_LEDGER_DATA_DIR") {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self { base_dir })
    }

    /// Create LedgerPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Directory holding one subdirectory per identity store
    pub fn stores_dir(&self) -> PathBuf {
        self.base_dir.join("stores")
    }

    /// Directory holding gate records (secret hashes, credential metadata)
    pub fn gates_dir(&self) -> PathBuf {
        self.base_dir.join("gates")
    }

    /// Directory of the document store for one identity
    pub fn store_dir(&self, identity: &str) -> PathBuf {
        self.stores_dir().join(namespace_for_identity(identity))
    }

    /// Documents file of one identity's store
    pub fn documents_file(&self, identity: &str) -> PathBuf {
        self.store_dir(identity).join("documents.json")
    }

    /// Secret-gate record file for one identity
    pub fn secret_gate_file(&self, identity: &str) -> PathBuf {
        self.gates_dir()
            .join(format!("{}.secret.json", namespace_for_identity(identity)))
    }

    /// Platform-credential metadata file for one identity
    pub fn credentials_file(&self, identity: &str) -> PathBuf {
        self.gates_dir()
            .join(format!("{}.credentials.json", namespace_for_identity(identity)))
    }

    /// Ensure the base, stores and gates directories exist
    pub fn ensure_directories(&self) -> Result<(), LedgerError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| LedgerError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(self.stores_dir())
            .map_err(|e| LedgerError::Io(format!("Failed to create stores directory: {}", e)))?;

        std::fs::create_dir_all(self.gates_dir())
            .map_err(|e| LedgerError::Io(format!("Failed to create gates directory: {}", e)))?;

        Ok(())
    }
}

/// Derive the storage namespace for an identity
///
/// Deterministic: the same identity always resolves to the same directory.
/// Non-alphanumeric characters are replaced with `-` and runs collapsed, so
/// `alice@example.com` and `alice example com` share a namespace only if they
/// normalize identically.
pub fn namespace_for_identity(identity: &str) -> String {
    let mut slug = String::with_capacity(identity.len());
    let mut last_dash = true;
    for c in identity.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    format!("user-{}", slug)
}

/// Resolve the default data directory path based on platform
#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, LedgerError> {
    // Unix (Linux/macOS): Use XDG_DATA_HOME if set, otherwise ~/.local/share
    let data_base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").expect("HOME environment variable not set");
            PathBuf::from(home).join(".local").join("share")
        });
    Ok(data_base.join("pocket-ledger"))
}

/// Resolve the default data directory path based on platform
#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, LedgerError> {
    // Windows: Use APPDATA
    let appdata = std::env::var("APPDATA")
        .map_err(|_| LedgerError::Io("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("pocket-ledger"))
}
