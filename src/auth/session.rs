//! Session-gate primitive
//!
//! A single session-scoped record proving a gate was recently satisfied.
//! Lives only in process memory (the moral equivalent of session storage):
//! it disappears when the process ends and never holds secret material.
//! Identity-keyed, so either gate method can validate or extend a session
//! the other one started.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::clock::Clock;

/// The session-scoped unlock record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateSession {
    pub identity: String,
    pub expires_at: DateTime<Utc>,
}

/// Shared gate-session state
pub struct SessionGate {
    clock: Arc<dyn Clock>,
    slot: Mutex<Option<GateSession>>,
}

impl SessionGate {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            slot: Mutex::new(None),
        }
    }

    /// Open (or replace) the gate session for an identity
    pub fn set_gate_session(&self, identity: &str, duration_min: u32) {
        let expires_at = self.clock.now() + Duration::minutes(i64::from(duration_min));
        let mut slot = self.slot.lock().unwrap();
        *slot = Some(GateSession {
            identity: identity.to_string(),
            expires_at,
        });
        debug!(identity, %expires_at, "gate session opened");
    }

    /// Whether a valid session exists for this identity
    ///
    /// Self-clearing: an expired or foreign-identity record is dropped on
    /// inspection.
    pub fn is_gate_valid(&self, identity: &str) -> bool {
        let mut slot = self.slot.lock().unwrap();
        match slot.as_ref() {
            Some(session) if session.identity == identity => {
                if session.expires_at > self.clock.now() {
                    true
                } else {
                    debug!(identity, "gate session expired");
                    *slot = None;
                    false
                }
            }
            Some(_) => {
                // A different identity's session is stale by definition
                *slot = None;
                false
            }
            None => false,
        }
    }

    /// Push the expiry forward, but only while the session is still valid
    pub fn extend_gate_session(&self, identity: &str, duration_min: u32) -> bool {
        if !self.is_gate_valid(identity) {
            return false;
        }
        let expires_at = self.clock.now() + Duration::minutes(i64::from(duration_min));
        let mut slot = self.slot.lock().unwrap();
        if let Some(session) = slot.as_mut() {
            session.expires_at = expires_at;
            return true;
        }
        false
    }

    /// Revoke the session explicitly
    pub fn clear_gate_session(&self) {
        let mut slot = self.slot.lock().unwrap();
        if slot.take().is_some() {
            debug!("gate session cleared");
        }
    }

    /// Current session record, if any (expired records included)
    pub fn current(&self) -> Option<GateSession> {
        self.slot.lock().unwrap().clone()
    }
}
