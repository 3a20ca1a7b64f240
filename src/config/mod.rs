//! Configuration for the ledger core
//!
//! All tunables are explicit constructor parameters instead of module-level
//! state, with a default factory for the common case.

pub mod paths;

pub use paths::{namespace_for_identity, LedgerPaths};

use crate::error::LedgerResult;

/// Argon2id cost parameters for the secret gate
///
/// Fixed, deliberately slow defaults; lowering them is only sensible in
/// tests.
#[derive(Debug, Clone)]
pub struct KdfConfig {
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Iteration count
    pub time_cost: u32,
    /// Parallelism degree
    pub parallelism: u32,
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            memory_cost: 65536, // 64 MiB
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KdfConfig {
    /// Cheap parameters for tests; never use outside test code
    pub fn insecure_fast() -> Self {
        Self {
            memory_cost: 8,
            time_cost: 1,
            parallelism: 1,
        }
    }
}

/// Top-level configuration for the ledger core services
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Path layout
    pub paths: LedgerPaths,

    /// Gate session duration used when the user's settings are unavailable
    pub default_gate_duration_min: u32,

    /// Clock-skew tolerance for token expiry checks, in seconds
    pub clock_skew_secs: i64,

    /// Relying-party identifier for the platform-authenticator gate
    pub rp_id: String,

    /// Secret-gate key derivation parameters
    pub kdf: KdfConfig,
}

impl CoreConfig {
    /// Resolve configuration with platform-default paths
    pub fn new() -> LedgerResult<Self> {
        Ok(Self::with_paths(LedgerPaths::new()?))
    }

    /// Configuration rooted at an explicit base directory (useful for tests)
    pub fn with_base_dir(base_dir: std::path::PathBuf) -> Self {
        Self::with_paths(LedgerPaths::with_base_dir(base_dir))
    }

    fn with_paths(paths: LedgerPaths) -> Self {
        Self {
            paths,
            default_gate_duration_min: crate::models::DEFAULT_GATE_DURATION_MIN,
            clock_skew_secs: 60,
            rp_id: "localhost".to_string(),
            kdf: KdfConfig::default(),
        }
    }
}
