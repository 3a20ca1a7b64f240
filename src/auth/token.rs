//! Offline credential validator
//!
//! Verifies a compact three-part bearer token (header.payload.signature,
//! base64url) entirely locally against imported public keys. Exactly two
//! asymmetric algorithms are accepted — EdDSA (Ed25519) and ES256 (P-256
//! ECDSA) — and anything else is rejected outright. Validation never panics
//! across this boundary: every failure is a `CredentialError` value.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Duration;
use ed25519_dalek::Verifier;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::clock::{Clock, SystemClock};

/// Validation failure; maps to the `Error`/`JwtStale` auth states
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("malformed token")]
    Malformed,

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("missing required claim: {0}")]
    MissingClaim(&'static str),

    #[error("token expired")]
    Expired,

    #[error("signature verification failed")]
    BadSignature,

    #[error("no trusted key matches the token")]
    NoMatchingKey,

    #[error("issuer mismatch")]
    IssuerMismatch,

    #[error("audience mismatch")]
    AudienceMismatch,

    #[error("invalid public key: {0}")]
    InvalidKey(String),
}

/// The two accepted signature algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAlgorithm {
    /// Ed25519
    EdDsa,
    /// ECDSA over P-256 with SHA-256
    Es256,
}

impl TokenAlgorithm {
    /// Parse the JOSE `alg` header value; anything unknown is rejected
    pub fn parse(alg: &str) -> Result<Self, CredentialError> {
        match alg {
            "EdDSA" => Ok(Self::EdDsa),
            "ES256" => Ok(Self::Es256),
            other => Err(CredentialError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Decoded token header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

/// Decoded and checked token payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub sub: String,
    pub email: String,
    /// Expiry, seconds since the epoch
    pub exp: i64,
    pub iat: Option<i64>,
    pub iss: Option<String>,
    pub aud: Option<String>,
    pub name: Option<String>,
}

/// Payload as it appears on the wire; required claims checked afterwards
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawClaims {
    sub: Option<String>,
    email: Option<String>,
    exp: Option<i64>,
    iat: Option<i64>,
    iss: Option<String>,
    aud: Option<String>,
    name: Option<String>,
}

impl RawClaims {
    fn into_claims(self) -> Result<TokenClaims, CredentialError> {
        Ok(TokenClaims {
            sub: self.sub.ok_or(CredentialError::MissingClaim("sub"))?,
            email: self.email.ok_or(CredentialError::MissingClaim("email"))?,
            exp: self.exp.ok_or(CredentialError::MissingClaim("exp"))?,
            iat: self.iat,
            iss: self.iss,
            aud: self.aud,
            name: self.name,
        })
    }
}

enum KeyMaterial {
    Ed25519(ed25519_dalek::VerifyingKey),
    Es256(p256::ecdsa::VerifyingKey),
}

/// An imported public key the validator trusts
pub struct TrustedKey {
    kid: Option<String>,
    material: KeyMaterial,
}

impl TrustedKey {
    /// Import a raw 32-byte Ed25519 public key
    pub fn ed25519(bytes: &[u8]) -> Result<Self, CredentialError> {
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CredentialError::InvalidKey("Ed25519 key must be 32 bytes".into()))?;
        let key = ed25519_dalek::VerifyingKey::from_bytes(&array)
            .map_err(|e| CredentialError::InvalidKey(e.to_string()))?;
        Ok(Self {
            kid: None,
            material: KeyMaterial::Ed25519(key),
        })
    }

    /// Import a SEC1-encoded P-256 public key (compressed or uncompressed)
    pub fn es256(sec1_bytes: &[u8]) -> Result<Self, CredentialError> {
        let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(sec1_bytes)
            .map_err(|e| CredentialError::InvalidKey(e.to_string()))?;
        Ok(Self {
            kid: None,
            material: KeyMaterial::Es256(key),
        })
    }

    /// Attach a key id for `kid`-based selection
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    fn algorithm(&self) -> TokenAlgorithm {
        match self.material {
            KeyMaterial::Ed25519(_) => TokenAlgorithm::EdDsa,
            KeyMaterial::Es256(_) => TokenAlgorithm::Es256,
        }
    }

    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), CredentialError> {
        match &self.material {
            KeyMaterial::Ed25519(key) => {
                let signature = ed25519_dalek::Signature::from_slice(signature)
                    .map_err(|_| CredentialError::BadSignature)?;
                key.verify(message, &signature)
                    .map_err(|_| CredentialError::BadSignature)
            }
            KeyMaterial::Es256(key) => {
                use p256::ecdsa::signature::Verifier as _;
                let signature = p256::ecdsa::Signature::from_slice(signature)
                    .map_err(|_| CredentialError::BadSignature)?;
                key.verify(message, &signature)
                    .map_err(|_| CredentialError::BadSignature)
            }
        }
    }
}

/// Offline bearer-token validator
pub struct CredentialValidator {
    keys: Vec<TrustedKey>,
    issuer: Option<String>,
    audience: Option<String>,
    clock_skew: Duration,
    clock: Arc<dyn Clock>,
}

impl CredentialValidator {
    pub fn new(keys: Vec<TrustedKey>) -> Self {
        Self {
            keys,
            issuer: None,
            audience: None,
            clock_skew: Duration::seconds(60),
            clock: Arc::new(SystemClock),
        }
    }

    /// Require a specific `iss` claim
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Require a specific `aud` claim
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Clock-skew tolerance applied to expiry checks
    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Decode header and payload without verifying the signature
    pub fn decode_unverified(token: &str) -> Result<(TokenHeader, TokenClaims), CredentialError> {
        let [header_b64, payload_b64, _] = split_token(token)?;
        let header: TokenHeader = decode_json(header_b64)?;
        let raw: RawClaims = decode_json(payload_b64)?;
        Ok((header, raw.into_claims()?))
    }

    /// Fast pre-check: is the token clearly stale?
    ///
    /// Decodes the payload without paying for signature verification, so
    /// callers can short-circuit to the stale state. A malformed token
    /// returns `false` here and is left for full validation to classify.
    pub fn is_expired(&self, token: &str) -> bool {
        match Self::decode_unverified(token) {
            Ok((_, claims)) => self.expired_at(claims.exp),
            Err(_) => false,
        }
    }

    /// Fully validate a token: signature, required claims, expiry, issuer
    /// and audience
    pub async fn validate(&self, token: &str) -> Result<TokenClaims, CredentialError> {
        let [header_b64, payload_b64, signature_b64] = split_token(token)?;

        let header: TokenHeader = decode_json(header_b64)?;
        let algorithm = TokenAlgorithm::parse(&header.alg)?;

        let candidates: Vec<&TrustedKey> = self
            .keys
            .iter()
            .filter(|key| key.algorithm() == algorithm)
            .filter(|key| match (&header.kid, &key.kid) {
                (Some(wanted), Some(kid)) => wanted == kid,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .collect();
        if candidates.is_empty() {
            return Err(CredentialError::NoMatchingKey);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| CredentialError::Malformed)?;
        let message = format!("{header_b64}.{payload_b64}");

        let verified = candidates
            .iter()
            .any(|key| key.verify(message.as_bytes(), &signature).is_ok());
        if !verified {
            debug!(alg = %header.alg, "token signature verification failed");
            return Err(CredentialError::BadSignature);
        }

        let raw: RawClaims = decode_json(payload_b64)?;
        let claims = raw.into_claims()?;

        if self.expired_at(claims.exp) {
            return Err(CredentialError::Expired);
        }

        if let Some(required) = &self.issuer {
            if claims.iss.as_deref() != Some(required.as_str()) {
                return Err(CredentialError::IssuerMismatch);
            }
        }
        if let Some(required) = &self.audience {
            if claims.aud.as_deref() != Some(required.as_str()) {
                return Err(CredentialError::AudienceMismatch);
            }
        }

        Ok(claims)
    }

    fn expired_at(&self, exp: i64) -> bool {
        let now = self.clock.now().timestamp();
        exp + self.clock_skew.num_seconds() < now
    }
}

fn split_token(token: &str) -> Result<[&str; 3], CredentialError> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s), None) if !h.is_empty() && !p.is_empty() && !s.is_empty() => {
            Ok([h, p, s])
        }
        _ => Err(CredentialError::Malformed),
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, CredentialError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| CredentialError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| CredentialError::Malformed)
}
