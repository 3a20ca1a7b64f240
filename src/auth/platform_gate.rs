//! Platform-authenticator gate
//!
//! Challenge-response ceremony against a platform authenticator holding an
//! asymmetric key pair. The gate stores only credential metadata (id, public
//! key, timestamps) — private keys never leave the authenticator. Multiple
//! credentials per identity are supported, with per-credential removal and
//! capability probing.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signer, Verifier};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::config::LedgerPaths;
use crate::error::{LedgerError, LedgerResult};
use crate::store::file_io::{read_json, write_json_atomic};

/// Length of ceremony challenges in bytes
pub const CHALLENGE_LEN: usize = 32;

/// Stored metadata for one registered credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub credential_id: String,
    /// Base64 of the raw Ed25519 public key
    pub public_key: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Result of a registration ceremony
#[derive(Debug, Clone)]
pub struct CreatedCredential {
    pub credential_id: String,
    /// Raw 32-byte Ed25519 public key
    pub public_key: [u8; 32],
}

/// Result of an authentication ceremony
#[derive(Debug, Clone)]
pub struct Assertion {
    pub credential_id: String,
    pub signature: Vec<u8>,
}

/// The platform credential ceremony, as provided by the host platform
///
/// The gate never sees private keys; it hands the authenticator a fresh
/// challenge and verifies the returned signature against stored metadata.
#[async_trait]
pub trait PlatformAuthenticator: Send + Sync {
    /// Whether the ceremony is available at all on this platform
    fn is_supported(&self) -> bool;

    /// Whether a platform (built-in) authenticator is usable right now
    async fn is_platform_authenticator_available(&self) -> bool;

    /// Create a new resident credential for `identity` under `rp_id`
    async fn make_credential(
        &self,
        rp_id: &str,
        identity: &str,
        challenge: &[u8],
    ) -> LedgerResult<CreatedCredential>;

    /// Sign `challenge` with one of the allowed credentials
    async fn get_assertion(
        &self,
        rp_id: &str,
        challenge: &[u8],
        allowed: &[String],
    ) -> LedgerResult<Assertion>;
}

/// In-process software authenticator
///
/// Keeps generated key pairs in memory and signs challenges on request.
/// Stands in for a hardware/platform authenticator in tests and headless
/// environments.
#[derive(Default)]
pub struct SoftwareAuthenticator {
    keys: Mutex<HashMap<String, ed25519_dalek::SigningKey>>,
}

impl SoftwareAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlatformAuthenticator for SoftwareAuthenticator {
    fn is_supported(&self) -> bool {
        true
    }

    async fn is_platform_authenticator_available(&self) -> bool {
        true
    }

    async fn make_credential(
        &self,
        _rp_id: &str,
        _identity: &str,
        _challenge: &[u8],
    ) -> LedgerResult<CreatedCredential> {
        let signing = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
        let credential_id = uuid::Uuid::new_v4().simple().to_string();
        let public_key = signing.verifying_key().to_bytes();

        self.keys
            .lock()
            .unwrap()
            .insert(credential_id.clone(), signing);

        Ok(CreatedCredential {
            credential_id,
            public_key,
        })
    }

    async fn get_assertion(
        &self,
        _rp_id: &str,
        challenge: &[u8],
        allowed: &[String],
    ) -> LedgerResult<Assertion> {
        let keys = self.keys.lock().unwrap();
        let (credential_id, signing) = allowed
            .iter()
            .find_map(|id| keys.get(id).map(|key| (id.clone(), key)))
            .ok_or_else(|| LedgerError::Gate("no usable credential".into()))?;

        let signature = signing.sign(challenge).to_vec();
        Ok(Assertion {
            credential_id,
            signature,
        })
    }
}

/// File shape for persisted credential metadata
#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    credentials: Vec<CredentialRecord>,
}

/// Platform-authenticator gate service
pub struct PlatformGate {
    paths: LedgerPaths,
    rp_id: String,
    authenticator: Arc<dyn PlatformAuthenticator>,
}

impl PlatformGate {
    pub fn new(
        paths: LedgerPaths,
        rp_id: impl Into<String>,
        authenticator: Arc<dyn PlatformAuthenticator>,
    ) -> Self {
        Self {
            paths,
            rp_id: rp_id.into(),
            authenticator,
        }
    }

    /// Whether the ceremony is available at all
    pub fn is_supported(&self) -> bool {
        self.authenticator.is_supported()
    }

    /// Whether a platform authenticator is usable right now
    pub async fn is_platform_authenticator_available(&self) -> bool {
        self.authenticator.is_platform_authenticator_available().await
    }

    /// Whether any credential is registered for this identity
    pub async fn has_credentials(&self, identity: &str) -> bool {
        self.load(identity)
            .map(|f| !f.credentials.is_empty())
            .unwrap_or(false)
    }

    /// Registered credential metadata for this identity
    pub async fn list_credentials(&self, identity: &str) -> LedgerResult<Vec<CredentialRecord>> {
        Ok(self.load(identity)?.credentials)
    }

    /// Run the registration ceremony and store the credential metadata
    pub async fn register(&self, identity: &str) -> LedgerResult<CredentialRecord> {
        let challenge = fresh_challenge();
        let created = self
            .authenticator
            .make_credential(&self.rp_id, identity, &challenge)
            .await?;

        let record = CredentialRecord {
            credential_id: created.credential_id,
            public_key: BASE64.encode(created.public_key),
            created_at: Utc::now(),
            last_used_at: None,
        };

        let mut file = self.load(identity)?;
        file.credentials.push(record.clone());
        self.save(identity, &file)?;

        info!(identity, credential = %record.credential_id, "platform credential registered");
        Ok(record)
    }

    /// Run the authentication ceremony; `Ok(false)` means the assertion did
    /// not verify
    pub async fn authenticate(&self, identity: &str) -> LedgerResult<bool> {
        let mut file = self.load(identity)?;
        if file.credentials.is_empty() {
            return Err(LedgerError::Gate("no credentials registered".into()));
        }

        let challenge = fresh_challenge();
        let allowed: Vec<String> = file
            .credentials
            .iter()
            .map(|c| c.credential_id.clone())
            .collect();

        let assertion = self
            .authenticator
            .get_assertion(&self.rp_id, &challenge, &allowed)
            .await?;

        let Some(record) = file
            .credentials
            .iter_mut()
            .find(|c| c.credential_id == assertion.credential_id)
        else {
            debug!(identity, "assertion for unknown credential");
            return Ok(false);
        };

        let key_bytes: [u8; 32] = BASE64
            .decode(&record.public_key)
            .map_err(|e| LedgerError::Gate(format!("stored public key invalid: {e}")))?
            .try_into()
            .map_err(|_| LedgerError::Gate("stored public key has wrong length".into()))?;
        let verifying = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| LedgerError::Gate(format!("stored public key invalid: {e}")))?;

        let Ok(signature) = ed25519_dalek::Signature::from_slice(&assertion.signature) else {
            return Ok(false);
        };
        if verifying.verify(&challenge, &signature).is_err() {
            debug!(identity, "assertion signature did not verify");
            return Ok(false);
        }

        record.last_used_at = Some(Utc::now());
        self.save(identity, &file)?;
        Ok(true)
    }

    /// Remove one credential; returns whether it existed
    pub async fn remove_credential(
        &self,
        identity: &str,
        credential_id: &str,
    ) -> LedgerResult<bool> {
        let mut file = self.load(identity)?;
        let before = file.credentials.len();
        file.credentials.retain(|c| c.credential_id != credential_id);
        let removed = file.credentials.len() != before;
        if removed {
            self.save(identity, &file)?;
            info!(identity, credential = credential_id, "platform credential removed");
        }
        Ok(removed)
    }

    fn load(&self, identity: &str) -> LedgerResult<CredentialFile> {
        read_json(self.paths.credentials_file(identity))
    }

    fn save(&self, identity: &str, file: &CredentialFile) -> LedgerResult<()> {
        write_json_atomic(self.paths.credentials_file(identity), file)
    }
}

fn fresh_challenge() -> [u8; CHALLENGE_LEN] {
    let mut challenge = [0u8; CHALLENGE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut challenge);
    challenge
}
