//! Secret-based gate
//!
//! Derives a keyed hash from a short user secret with Argon2id (slow, salted,
//! fixed cost parameters) and stores only the hash, salt and parameters — the
//! raw secret is never persisted. Verification re-derives with the stored
//! salt and compares in constant time (fixed-length XOR accumulation, no
//! short-circuit) to resist timing attacks.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2, Params,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use zeroize::Zeroizing;

use crate::config::{KdfConfig, LedgerPaths};
use crate::error::{LedgerError, LedgerResult};
use crate::store::file_io::{read_json, write_json_atomic};

/// Persisted gate record: derivation inputs and output, never the secret
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretGateRecord {
    /// Base64 of the derived 32-byte hash
    pub hash: String,
    /// Salt in the PHC string format
    pub salt: String,
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
    pub created_at: DateTime<Utc>,
}

/// Secret gate service
///
/// Constructible with explicit KDF parameters; no shared module state.
pub struct SecretGate {
    paths: LedgerPaths,
    kdf: KdfConfig,
}

impl SecretGate {
    pub fn new(paths: LedgerPaths, kdf: KdfConfig) -> Self {
        Self { paths, kdf }
    }

    /// Whether a secret has been set up for this identity
    pub async fn is_configured(&self, identity: &str) -> bool {
        self.paths.secret_gate_file(identity).exists()
    }

    /// Set up a secret for an identity that has none yet
    pub async fn setup(&self, identity: &str, secret: &str) -> LedgerResult<()> {
        if secret.is_empty() {
            return Err(LedgerError::Gate("secret must not be empty".into()));
        }
        if self.is_configured(identity).await {
            return Err(LedgerError::Gate(
                "a secret is already configured; use change".into(),
            ));
        }

        let salt = SaltString::generate(&mut OsRng);
        let hash = derive(secret, &salt, &self.kdf)?;

        let record = SecretGateRecord {
            hash: BASE64.encode(hash.as_slice()),
            salt: salt.to_string(),
            memory_cost: self.kdf.memory_cost,
            time_cost: self.kdf.time_cost,
            parallelism: self.kdf.parallelism,
            created_at: Utc::now(),
        };
        write_json_atomic(self.paths.secret_gate_file(identity), &record)?;
        info!(identity, "secret gate configured");
        Ok(())
    }

    /// Verify a candidate secret; `Ok(false)` means "wrong secret"
    pub async fn verify(&self, identity: &str, secret: &str) -> LedgerResult<bool> {
        let record = self
            .load(identity)?
            .ok_or_else(|| LedgerError::Gate("no secret configured".into()))?;

        // Re-derive with the stored parameters, not the current config, so
        // older records keep verifying after a config change
        let stored_kdf = KdfConfig {
            memory_cost: record.memory_cost,
            time_cost: record.time_cost,
            parallelism: record.parallelism,
        };
        let salt = SaltString::from_b64(&record.salt)
            .map_err(|e| LedgerError::Gate(format!("stored salt is invalid: {e}")))?;

        let derived = derive(secret, &salt, &stored_kdf)?;
        let stored = BASE64
            .decode(&record.hash)
            .map_err(|e| LedgerError::Gate(format!("stored hash is invalid: {e}")))?;

        Ok(constant_time_eq(derived.as_slice(), &stored))
    }

    /// Replace the secret; the old one must verify first
    pub async fn change(&self, identity: &str, old: &str, new: &str) -> LedgerResult<bool> {
        if !self.verify(identity, old).await? {
            return Ok(false);
        }
        self.remove(identity).await?;
        self.setup(identity, new).await?;
        Ok(true)
    }

    /// Remove the configured secret
    pub async fn remove(&self, identity: &str) -> LedgerResult<()> {
        let path = self.paths.secret_gate_file(identity);
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| LedgerError::Gate(format!("failed to remove secret record: {e}")))?;
            info!(identity, "secret gate removed");
        }
        Ok(())
    }

    fn load(&self, identity: &str) -> LedgerResult<Option<SecretGateRecord>> {
        let path = self.paths.secret_gate_file(identity);
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path)
    }
}

/// Derive the 32-byte gate hash; the output is zeroized on drop
fn derive(secret: &str, salt: &SaltString, kdf: &KdfConfig) -> LedgerResult<Zeroizing<[u8; 32]>> {
    let params = Params::new(kdf.memory_cost, kdf.time_cost, kdf.parallelism, Some(32))
        .map_err(|e| LedgerError::Gate(format!("invalid KDF parameters: {e}")))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let hash = argon2
        .hash_password(secret.as_bytes(), salt)
        .map_err(|e| LedgerError::Gate(format!("key derivation failed: {e}")))?;

    let output = hash
        .hash
        .ok_or_else(|| LedgerError::Gate("no hash output generated".into()))?;
    let bytes = output.as_bytes();
    if bytes.len() < 32 {
        return Err(LedgerError::Gate("hash output too short".into()));
    }

    let mut out = Zeroizing::new([0u8; 32]);
    out.copy_from_slice(&bytes[..32]);
    Ok(out)
}

/// Fixed-length constant-time comparison: XOR-accumulate, never short-circuit
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
