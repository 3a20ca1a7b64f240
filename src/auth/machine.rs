//! Layered authentication state machine
//!
//! Orchestrates token validity, gate configuration and gate-session state
//! into one coherent status, and drives the per-identity store lifecycle:
//! a validated token opens (or switches) the store, logout closes it.
//! Transition methods never return errors — every failure is expressed as a
//! state, because the caller always needs something to render.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::store::StoreRegistry;

use super::platform_gate::PlatformGate;
use super::secret_gate::SecretGate;
use super::session::SessionGate;
use super::token::{CredentialValidator, TokenClaims};

/// Coherent authentication status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// No credential
    Anon,
    /// Valid token, no gate configured
    JwtOk,
    /// Valid token, gate configured and not currently satisfied
    Gated,
    /// Valid token and gate satisfied
    Unlocked,
    /// Token expired while previously authenticated
    JwtStale,
    /// Credential validation failed
    Error,
}

/// Typed event emitted on every transition
#[derive(Debug, Clone)]
pub enum AuthEvent {
    StateChanged { old: AuthStatus, new: AuthStatus },
    JwtValidated { identity: String },
    JwtExpired,
    GateUnlocked,
    GateExpired,
    UserLogout,
}

/// How often callers should re-evaluate token and session expiry
pub const DEFAULT_REEVALUATION_PERIOD: std::time::Duration = std::time::Duration::from_secs(30);

type Listener = Box<dyn Fn(&AuthEvent) + Send + Sync>;

struct MachineState {
    status: AuthStatus,
    identity: Option<String>,
    claims: Option<TokenClaims>,
    token: Option<String>,
}

impl Default for MachineState {
    fn default() -> Self {
        Self {
            status: AuthStatus::Anon,
            identity: None,
            claims: None,
            token: None,
        }
    }
}

/// The authentication state machine
pub struct AuthMachine {
    validator: CredentialValidator,
    secret_gate: Arc<SecretGate>,
    platform_gate: Arc<PlatformGate>,
    session: Arc<SessionGate>,
    registry: Arc<StoreRegistry>,
    state: Mutex<MachineState>,
    listeners: Mutex<Vec<Listener>>,
}

impl AuthMachine {
    pub fn new(
        validator: CredentialValidator,
        secret_gate: Arc<SecretGate>,
        platform_gate: Arc<PlatformGate>,
        session: Arc<SessionGate>,
        registry: Arc<StoreRegistry>,
    ) -> Self {
        Self {
            validator,
            secret_gate,
            platform_gate,
            session,
            registry,
            state: Mutex::new(MachineState::default()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Current status
    pub fn status(&self) -> AuthStatus {
        self.state.lock().unwrap().status
    }

    /// Identity of the current (or stale) credential
    pub fn identity(&self) -> Option<String> {
        self.state.lock().unwrap().identity.clone()
    }

    /// Claims of the last successfully validated token
    pub fn claims(&self) -> Option<TokenClaims> {
        self.state.lock().unwrap().claims.clone()
    }

    /// Register a listener for auth events
    pub fn subscribe(&self, listener: impl Fn(&AuthEvent) + Send + Sync + 'static) {
        self.listeners.lock().unwrap().push(Box::new(listener));
    }

    /// Evaluate a bearer token and settle into the matching state
    ///
    /// Fast expiry pre-check first (no signature cost for clearly-stale
    /// tokens), then full validation, then gate inspection. A validated
    /// identity's store is opened before this returns; switching identity
    /// closes the previous store first.
    pub async fn initialize_with_token(&self, token: &str) -> AuthStatus {
        let token = token.trim();

        if self.validator.is_expired(token) {
            let identity = CredentialValidator::decode_unverified(token)
                .ok()
                .map(|(_, claims)| claims.sub);
            {
                let mut state = self.state.lock().unwrap();
                state.identity = identity.or(state.identity.take());
                state.claims = None;
                state.token = Some(token.to_string());
            }
            self.emit(AuthEvent::JwtExpired);
            return self.transition(AuthStatus::JwtStale);
        }

        let claims = match self.validator.validate(token).await {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "credential validation failed");
                return self.transition(AuthStatus::Error);
            }
        };

        let identity = claims.sub.clone();

        // Switching identity always fully closes the previous store first;
        // two identities' stores are never open concurrently
        let previous = self.state.lock().unwrap().identity.clone();
        if let Some(previous) = previous.filter(|p| p != &identity) {
            self.registry.close(&previous).await;
            self.session.clear_gate_session();
        }

        if let Err(e) = self.registry.open(&identity).await {
            warn!(identity, error = %e, "store open failed");
            return self.transition(AuthStatus::Error);
        }

        {
            let mut state = self.state.lock().unwrap();
            state.identity = Some(identity.clone());
            state.claims = Some(claims);
            state.token = Some(token.to_string());
        }
        info!(identity, "credential validated");
        self.emit(AuthEvent::JwtValidated {
            identity: identity.clone(),
        });

        let gate_configured = self.secret_gate.is_configured(&identity).await
            || self.platform_gate.has_credentials(&identity).await;

        let status = if !gate_configured {
            AuthStatus::JwtOk
        } else if self.session.is_gate_valid(&identity) {
            AuthStatus::Unlocked
        } else {
            AuthStatus::Gated
        };
        self.transition(status)
    }

    /// Attempt a secret unlock; only legal from `Gated`
    ///
    /// On failure the state is unchanged — attempt counting and lockout are
    /// a caller concern, not built in here.
    pub async fn unlock_with_secret(&self, secret: &str) -> bool {
        let Some(identity) = self.gated_identity() else {
            return false;
        };

        match self.secret_gate.verify(&identity, secret).await {
            Ok(true) => {
                self.open_gate_session(&identity).await;
                true
            }
            Ok(false) => false,
            Err(e) => {
                debug!(error = %e, "secret gate verification errored");
                false
            }
        }
    }

    /// Attempt a platform-authenticator unlock; only legal from `Gated`
    pub async fn unlock_with_biometric(&self) -> bool {
        let Some(identity) = self.gated_identity() else {
            return false;
        };

        match self.platform_gate.authenticate(&identity).await {
            Ok(true) => {
                self.open_gate_session(&identity).await;
                true
            }
            Ok(false) => false,
            Err(e) => {
                debug!(error = %e, "platform gate ceremony errored");
                false
            }
        }
    }

    /// Re-check token and gate-session expiry; called periodically and on
    /// demand
    pub async fn reevaluate(&self) -> AuthStatus {
        let (status, identity, token) = {
            let state = self.state.lock().unwrap();
            (state.status, state.identity.clone(), state.token.clone())
        };

        let token_expired = token.map(|t| self.validator.is_expired(&t)).unwrap_or(false);

        match status {
            AuthStatus::JwtOk | AuthStatus::Unlocked if token_expired => {
                self.emit(AuthEvent::JwtExpired);
                self.transition(AuthStatus::JwtStale)
            }
            AuthStatus::Unlocked => {
                let valid = identity
                    .map(|id| self.session.is_gate_valid(&id))
                    .unwrap_or(false);
                if valid {
                    status
                } else {
                    self.emit(AuthEvent::GateExpired);
                    self.transition(AuthStatus::Gated)
                }
            }
            AuthStatus::Gated => {
                // An external unlock may have opened a session meanwhile
                let valid = identity
                    .map(|id| self.session.is_gate_valid(&id))
                    .unwrap_or(false);
                if valid {
                    self.emit(AuthEvent::GateUnlocked);
                    self.transition(AuthStatus::Unlocked)
                } else {
                    status
                }
            }
            _ => status,
        }
    }

    /// Force any state back to `Anon`, closing the store and the session
    pub async fn logout(&self) {
        let identity = self.state.lock().unwrap().identity.clone();
        if let Some(identity) = identity {
            self.registry.close(&identity).await;
        }
        self.session.clear_gate_session();

        {
            let mut state = self.state.lock().unwrap();
            state.identity = None;
            state.claims = None;
            state.token = None;
        }
        self.transition(AuthStatus::Anon);
        self.emit(AuthEvent::UserLogout);
    }

    /// Run `reevaluate` on a fixed interval until the machine is dropped
    ///
    /// `DEFAULT_REEVALUATION_PERIOD` is the usual choice.
    pub fn spawn_reevaluator(
        self: &Arc<Self>,
        period: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                match weak.upgrade() {
                    Some(machine) => {
                        machine.reevaluate().await;
                    }
                    None => break,
                }
            }
        })
    }

    fn gated_identity(&self) -> Option<String> {
        let state = self.state.lock().unwrap();
        if state.status == AuthStatus::Gated {
            state.identity.clone()
        } else {
            None
        }
    }

    async fn open_gate_session(&self, identity: &str) {
        let duration = self.gate_duration_min(identity).await;
        self.session.set_gate_session(identity, duration);
        self.transition(AuthStatus::Unlocked);
        self.emit(AuthEvent::GateUnlocked);
    }

    /// Gate duration from the user's settings, falling back to the config
    /// default when the store is not available
    async fn gate_duration_min(&self, identity: &str) -> u32 {
        if let Some(engine) = self.registry.get(identity).await {
            if let Ok(settings) = engine.get_settings().await {
                return settings.gate_duration_min;
            }
        }
        self.registry.config().default_gate_duration_min
    }

    fn transition(&self, new: AuthStatus) -> AuthStatus {
        let old = {
            let mut state = self.state.lock().unwrap();
            let old = state.status;
            state.status = new;
            old
        };
        if old != new {
            debug!(?old, ?new, "auth state changed");
            self.emit(AuthEvent::StateChanged { old, new });
        }
        new
    }

    /// Fan an event out to every listener, isolating panics per listener so
    /// one failing subscriber cannot starve the rest
    fn emit(&self, event: AuthEvent) {
        let listeners = self.listeners.lock().unwrap();
        for listener in listeners.iter() {
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                warn!(?event, "auth listener panicked during dispatch");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::{Clock, ManualClock};
    use crate::auth::platform_gate::SoftwareAuthenticator;
    use crate::auth::token::TrustedKey;
    use crate::config::{CoreConfig, KdfConfig};
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use chrono::Duration;
    use ed25519_dalek::Signer;
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        clock: Arc<ManualClock>,
        signing: ed25519_dalek::SigningKey,
        machine: Arc<AuthMachine>,
        registry: Arc<StoreRegistry>,
        session: Arc<SessionGate>,
        secret_gate: Arc<SecretGate>,
        platform_gate: Arc<PlatformGate>,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let mut config = CoreConfig::with_base_dir(tmp.path().to_path_buf());
        config.kdf = KdfConfig::insecure_fast();

        let clock = Arc::new(ManualClock::starting_now());
        let signing = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);

        let validator = CredentialValidator::new(vec![TrustedKey::ed25519(
            signing.verifying_key().as_bytes(),
        )
        .unwrap()])
        .with_clock_skew(Duration::seconds(30))
        .with_clock(clock.clone());

        let secret_gate = Arc::new(SecretGate::new(config.paths.clone(), config.kdf.clone()));
        let platform_gate = Arc::new(PlatformGate::new(
            config.paths.clone(),
            config.rp_id.clone(),
            Arc::new(SoftwareAuthenticator::new()),
        ));
        let session = Arc::new(SessionGate::new(clock.clone()));
        let registry = Arc::new(StoreRegistry::new(config));

        let machine = Arc::new(AuthMachine::new(
            validator,
            secret_gate.clone(),
            platform_gate.clone(),
            session.clone(),
            registry.clone(),
        ));

        Fixture {
            _tmp: tmp,
            clock,
            signing,
            machine,
            registry,
            session,
            secret_gate,
            platform_gate,
        }
    }

    fn mint(fixture: &Fixture, sub: &str, expires_in_secs: i64) -> String {
        let header = json!({"alg": "EdDSA", "typ": "JWT"});
        let claims = json!({
            "sub": sub,
            "email": format!("{sub}@example.com"),
            "exp": fixture.clock.now().timestamp() + expires_in_secs,
        });
        let encode = |v: &serde_json::Value| URL_SAFE_NO_PAD.encode(serde_json::to_vec(v).unwrap());
        let message = format!("{}.{}", encode(&header), encode(&claims));
        let signature = fixture.signing.sign(message.as_bytes());
        format!("{}.{}", message, URL_SAFE_NO_PAD.encode(signature.to_bytes()))
    }

    #[tokio::test]
    async fn test_valid_token_without_gate() {
        let f = fixture();
        let token = mint(&f, "alice", 3600);

        let status = f.machine.initialize_with_token(&token).await;
        assert_eq!(status, AuthStatus::JwtOk);
        assert_eq!(f.machine.identity().as_deref(), Some("alice"));
        // Validation opened the store
        assert!(f.registry.get("alice").await.is_some());
    }

    #[tokio::test]
    async fn test_stale_token_fast_path() {
        let f = fixture();
        let token = mint(&f, "alice", -3600);

        let status = f.machine.initialize_with_token(&token).await;
        assert_eq!(status, AuthStatus::JwtStale);
        // No store opened for a stale credential
        assert!(f.registry.get("alice").await.is_none());
    }

    #[tokio::test]
    async fn test_garbage_token_is_error_state() {
        let f = fixture();
        let status = f.machine.initialize_with_token("not.a.token").await;
        assert_eq!(status, AuthStatus::Error);
    }

    #[tokio::test]
    async fn test_secret_gate_flow() {
        let f = fixture();
        f.secret_gate.setup("alice", "1234").await.unwrap();

        let token = mint(&f, "alice", 3600);
        assert_eq!(
            f.machine.initialize_with_token(&token).await,
            AuthStatus::Gated
        );

        // Wrong secret: state unchanged
        assert!(!f.machine.unlock_with_secret("9999").await);
        assert_eq!(f.machine.status(), AuthStatus::Gated);

        // Right secret: unlocked with a live session
        assert!(f.machine.unlock_with_secret("1234").await);
        assert_eq!(f.machine.status(), AuthStatus::Unlocked);
        assert!(f.session.is_gate_valid("alice"));
    }

    #[tokio::test]
    async fn test_gate_session_expiry_reevaluation() {
        let f = fixture();
        f.secret_gate.setup("alice", "1234").await.unwrap();

        let token = mint(&f, "alice", 7200);
        f.machine.initialize_with_token(&token).await;
        f.machine.unlock_with_secret("1234").await;
        assert_eq!(f.machine.status(), AuthStatus::Unlocked);

        // Default gate duration is 5 minutes; advance past it
        f.clock.advance(Duration::minutes(6));
        assert_eq!(f.machine.reevaluate().await, AuthStatus::Gated);
    }

    #[tokio::test]
    async fn test_token_expiry_reevaluation() {
        let f = fixture();
        let token = mint(&f, "alice", 60);
        assert_eq!(
            f.machine.initialize_with_token(&token).await,
            AuthStatus::JwtOk
        );

        f.clock.advance(Duration::minutes(10));
        assert_eq!(f.machine.reevaluate().await, AuthStatus::JwtStale);
    }

    #[tokio::test]
    async fn test_external_unlock_detected() {
        let f = fixture();
        f.secret_gate.setup("alice", "1234").await.unwrap();

        let token = mint(&f, "alice", 3600);
        assert_eq!(
            f.machine.initialize_with_token(&token).await,
            AuthStatus::Gated
        );

        // Session opened outside the machine (the other gate, another tab)
        f.session.set_gate_session("alice", 5);
        assert_eq!(f.machine.reevaluate().await, AuthStatus::Unlocked);
    }

    #[tokio::test]
    async fn test_session_valid_at_initialize_skips_gate() {
        let f = fixture();
        f.secret_gate.setup("alice", "1234").await.unwrap();
        f.session.set_gate_session("alice", 5);

        let token = mint(&f, "alice", 3600);
        assert_eq!(
            f.machine.initialize_with_token(&token).await,
            AuthStatus::Unlocked
        );
    }

    #[tokio::test]
    async fn test_biometric_unlock() {
        let f = fixture();
        f.platform_gate.register("alice").await.unwrap();

        let token = mint(&f, "alice", 3600);
        assert_eq!(
            f.machine.initialize_with_token(&token).await,
            AuthStatus::Gated
        );
        assert!(f.machine.unlock_with_biometric().await);
        assert_eq!(f.machine.status(), AuthStatus::Unlocked);
    }

    #[tokio::test]
    async fn test_unlock_illegal_outside_gated() {
        let f = fixture();
        let token = mint(&f, "alice", 3600);
        f.machine.initialize_with_token(&token).await;
        assert_eq!(f.machine.status(), AuthStatus::JwtOk);

        // No gate configured: unlock attempts are no-ops
        assert!(!f.machine.unlock_with_secret("1234").await);
        assert!(!f.machine.unlock_with_biometric().await);
        assert_eq!(f.machine.status(), AuthStatus::JwtOk);
    }

    #[tokio::test]
    async fn test_logout_from_any_state() {
        let f = fixture();
        let token = mint(&f, "alice", 3600);
        f.machine.initialize_with_token(&token).await;
        assert!(f.registry.get("alice").await.is_some());

        f.machine.logout().await;
        assert_eq!(f.machine.status(), AuthStatus::Anon);
        assert!(f.machine.identity().is_none());
        assert!(f.registry.get("alice").await.is_none());
        assert!(!f.session.is_gate_valid("alice"));
    }

    #[tokio::test]
    async fn test_identity_switch_closes_previous_store() {
        let f = fixture();

        f.machine
            .initialize_with_token(&mint(&f, "alice", 3600))
            .await;
        assert!(f.registry.get("alice").await.is_some());

        f.machine
            .initialize_with_token(&mint(&f, "bob", 3600))
            .await;
        assert!(f.registry.get("alice").await.is_none());
        assert!(f.registry.get("bob").await.is_some());
        assert_eq!(f.machine.identity().as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn test_gate_duration_from_settings() {
        let f = fixture();
        f.secret_gate.setup("alice", "1234").await.unwrap();

        let token = mint(&f, "alice", 7200);
        f.machine.initialize_with_token(&token).await;

        // Stretch the configured duration to 30 minutes
        let engine = f.registry.get("alice").await.unwrap();
        engine
            .update_settings(crate::schema::SettingsPatch {
                gate_duration_min: Some(30),
                ..Default::default()
            })
            .await
            .unwrap();

        f.machine.unlock_with_secret("1234").await;
        f.clock.advance(Duration::minutes(20));
        // Still inside the 30 minute session
        assert_eq!(f.machine.reevaluate().await, AuthStatus::Unlocked);
        f.clock.advance(Duration::minutes(11));
        assert_eq!(f.machine.reevaluate().await, AuthStatus::Gated);
    }

    #[tokio::test]
    async fn test_listener_panic_is_isolated() {
        let f = fixture();
        let seen = Arc::new(Mutex::new(0usize));

        f.machine.subscribe(|_| panic!("bad listener"));
        {
            let seen = seen.clone();
            f.machine.subscribe(move |_| {
                *seen.lock().unwrap() += 1;
            });
        }

        let token = mint(&f, "alice", 3600);
        f.machine.initialize_with_token(&token).await;

        // The panicking listener did not stop the second one
        assert!(*seen.lock().unwrap() >= 2); // JwtValidated + StateChanged
    }

    #[tokio::test]
    async fn test_events_carry_transition_detail() {
        let f = fixture();
        let events = Arc::new(Mutex::new(Vec::new()));
        {
            let events = events.clone();
            f.machine.subscribe(move |e| {
                events.lock().unwrap().push(format!("{e:?}"));
            });
        }

        let token = mint(&f, "alice", 3600);
        f.machine.initialize_with_token(&token).await;
        f.machine.logout().await;

        let log = events.lock().unwrap().join("\n");
        assert!(log.contains("JwtValidated"));
        assert!(log.contains("StateChanged"));
        assert!(log.contains("UserLogout"));
    }
}
