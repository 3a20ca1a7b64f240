//! End-to-end authentication scenarios: token validation, gates, sessions
//! and the state machine driving the store lifecycle

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Duration;
use ed25519_dalek::Signer;
use pocket_ledger::auth::Clock;
use serde_json::json;
use tempfile::TempDir;

use pocket_ledger::auth::{
    AuthMachine, AuthStatus, CredentialValidator, ManualClock, PlatformGate, SecretGate,
    SessionGate, SoftwareAuthenticator, TrustedKey,
};
use pocket_ledger::config::{CoreConfig, KdfConfig};
use pocket_ledger::models::AccountKind;
use pocket_ledger::schema::AccountDraft;
use pocket_ledger::store::StoreRegistry;

struct World {
    _tmp: TempDir,
    clock: Arc<ManualClock>,
    signing: ed25519_dalek::SigningKey,
    machine: Arc<AuthMachine>,
    registry: Arc<StoreRegistry>,
    session: Arc<SessionGate>,
    secret_gate: Arc<SecretGate>,
    platform_gate: Arc<PlatformGate>,
}

fn world() -> World {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let tmp = TempDir::new().unwrap();
    let mut config = CoreConfig::with_base_dir(tmp.path().to_path_buf());
    config.kdf = KdfConfig::insecure_fast();

    let clock = Arc::new(ManualClock::starting_now());
    let signing = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);

    let validator =
        CredentialValidator::new(vec![
            TrustedKey::ed25519(signing.verifying_key().as_bytes()).unwrap()
        ])
        .with_clock_skew(Duration::seconds(60))
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

    World {
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

fn mint(world: &World, sub: &str, expires_in_secs: i64) -> String {
    let header = json!({"alg": "EdDSA", "typ": "JWT"});
    let claims = json!({
        "sub": sub,
        "email": format!("{sub}@example.com"),
        "exp": world.clock.now().timestamp() + expires_in_secs,
    });
    let encode = |v: &serde_json::Value| URL_SAFE_NO_PAD.encode(serde_json::to_vec(v).unwrap());
    let message = format!("{}.{}", encode(&header), encode(&claims));
    let signature = world.signing.sign(message.as_bytes());
    format!("{}.{}", message, URL_SAFE_NO_PAD.encode(signature.to_bytes()))
}

#[tokio::test]
async fn token_before_expiry_yields_state_per_gate_configuration() {
    // No gate configured: JwtOk
    let w = world();
    let status = w.machine.initialize_with_token(&mint(&w, "alice", 3600)).await;
    assert_eq!(status, AuthStatus::JwtOk);

    // Secret gate configured, no session: Gated
    let w = world();
    w.secret_gate.setup("alice", "1234").await.unwrap();
    let status = w.machine.initialize_with_token(&mint(&w, "alice", 3600)).await;
    assert_eq!(status, AuthStatus::Gated);

    // Gate configured and session already valid: Unlocked
    let w = world();
    w.secret_gate.setup("alice", "1234").await.unwrap();
    w.session.set_gate_session("alice", 5);
    let status = w.machine.initialize_with_token(&mint(&w, "alice", 3600)).await;
    assert_eq!(status, AuthStatus::Unlocked);
}

#[tokio::test]
async fn token_after_expiry_plus_tolerance_is_stale() {
    let w = world();
    // 30s past expiry is inside the 60s skew: still valid
    let status = w.machine.initialize_with_token(&mint(&w, "alice", -30)).await;
    assert_eq!(status, AuthStatus::JwtOk);

    let w = world();
    // Well past expiry plus tolerance: stale, without opening a store
    let status = w
        .machine
        .initialize_with_token(&mint(&w, "alice", -3600))
        .await;
    assert_eq!(status, AuthStatus::JwtStale);
    assert!(w.registry.get("alice").await.is_none());
}

#[tokio::test]
async fn secret_unlock_opens_timed_session() {
    let w = world();
    w.secret_gate.setup("alice", "1234").await.unwrap();
    w.machine
        .initialize_with_token(&mint(&w, "alice", 7200))
        .await;

    // Wrong secret: still gated, no session
    assert!(!w.machine.unlock_with_secret("0000").await);
    assert_eq!(w.machine.status(), AuthStatus::Gated);
    assert!(!w.session.is_gate_valid("alice"));

    // Correct secret: unlocked, session expires gate_duration_min later
    assert!(w.machine.unlock_with_secret("1234").await);
    assert_eq!(w.machine.status(), AuthStatus::Unlocked);

    w.clock.advance(Duration::minutes(4));
    assert_eq!(w.machine.reevaluate().await, AuthStatus::Unlocked);

    w.clock.advance(Duration::minutes(2));
    assert_eq!(w.machine.reevaluate().await, AuthStatus::Gated);
}

#[tokio::test]
async fn gate_session_timing_and_extension() {
    let w = world();

    w.session.set_gate_session("alice", 5);
    assert!(w.session.is_gate_valid("alice"));

    // Extension pushes the boundary while valid
    w.clock.advance(Duration::minutes(4));
    assert!(w.session.extend_gate_session("alice", 5));
    w.clock.advance(Duration::minutes(4));
    assert!(w.session.is_gate_valid("alice"));

    // Past the extended boundary: invalid, and extension now refuses
    w.clock.advance(Duration::minutes(2));
    assert!(!w.session.is_gate_valid("alice"));
    assert!(!w.session.extend_gate_session("alice", 5));
}

#[tokio::test]
async fn either_gate_can_satisfy_the_shared_session() {
    let w = world();
    // Both gates configured
    w.secret_gate.setup("alice", "1234").await.unwrap();
    w.platform_gate.register("alice").await.unwrap();

    w.machine
        .initialize_with_token(&mint(&w, "alice", 7200))
        .await;
    assert_eq!(w.machine.status(), AuthStatus::Gated);

    // Unlock via biometric ceremony
    assert!(w.machine.unlock_with_biometric().await);
    assert_eq!(w.machine.status(), AuthStatus::Unlocked);

    // The secret gate extends the same identity-keyed session
    assert!(w.session.extend_gate_session("alice", 10));
}

#[tokio::test]
async fn token_expiry_detected_by_reevaluation() {
    let w = world();
    w.machine
        .initialize_with_token(&mint(&w, "alice", 120))
        .await;
    assert_eq!(w.machine.status(), AuthStatus::JwtOk);

    w.clock.advance(Duration::minutes(10));
    assert_eq!(w.machine.reevaluate().await, AuthStatus::JwtStale);
}

#[tokio::test]
async fn machine_drives_store_lifecycle() {
    let w = world();

    // Validation opens the store; ledger work proceeds through the handle
    w.machine
        .initialize_with_token(&mint(&w, "alice", 3600))
        .await;
    let engine = w.registry.get("alice").await.unwrap();
    engine
        .create_account(AccountDraft::new("Checking", AccountKind::Asset, "USD"))
        .await
        .unwrap();

    // Switching identity closes alice's store before opening bob's
    w.machine
        .initialize_with_token(&mint(&w, "bob", 3600))
        .await;
    assert!(w.registry.get("alice").await.is_none());
    assert!(w.registry.get("bob").await.is_some());

    // Logout closes everything
    w.machine.logout().await;
    assert_eq!(w.machine.status(), AuthStatus::Anon);
    assert!(w.registry.get("bob").await.is_none());

    // Alice's data is still on disk for the next login
    w.machine
        .initialize_with_token(&mint(&w, "alice", 3600))
        .await;
    let engine = w.registry.get("alice").await.unwrap();
    let accounts = engine.list_accounts(true).await.unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].name, "Checking");
}

#[tokio::test]
async fn garbage_and_forged_tokens_yield_error_state() {
    let w = world();

    assert_eq!(
        w.machine.initialize_with_token("garbage").await,
        AuthStatus::Error
    );

    // Token signed by an unknown key
    let stranger = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
    let header = json!({"alg": "EdDSA"});
    let claims = json!({
        "sub": "alice",
        "email": "alice@example.com",
        "exp": w.clock.now().timestamp() + 3600,
    });
    let encode = |v: &serde_json::Value| URL_SAFE_NO_PAD.encode(serde_json::to_vec(v).unwrap());
    let message = format!("{}.{}", encode(&header), encode(&claims));
    let signature = stranger.sign(message.as_bytes());
    let forged = format!("{}.{}", message, URL_SAFE_NO_PAD.encode(signature.to_bytes()));

    assert_eq!(
        w.machine.initialize_with_token(&forged).await,
        AuthStatus::Error
    );
    assert!(w.registry.get("alice").await.is_none());
}

#[tokio::test]
async fn secret_change_and_removal_flow() {
    let w = world();
    w.secret_gate.setup("alice", "1234").await.unwrap();

    // Change requires the old secret
    assert!(!w.secret_gate.change("alice", "wrong", "5678").await.unwrap());
    assert!(w.secret_gate.change("alice", "1234", "5678").await.unwrap());

    w.machine
        .initialize_with_token(&mint(&w, "alice", 3600))
        .await;
    assert!(!w.machine.unlock_with_secret("1234").await);
    assert!(w.machine.unlock_with_secret("5678").await);

    // After removal the gate no longer applies to a fresh login
    w.machine.logout().await;
    w.secret_gate.remove("alice").await.unwrap();
    let status = w
        .machine
        .initialize_with_token(&mint(&w, "alice", 3600))
        .await;
    assert_eq!(status, AuthStatus::JwtOk);
}
