//! Offline-capable layered authentication
//!
//! A bearer token validated entirely locally, two interchangeable secondary
//! gates (secret and platform authenticator) sharing one session-gate
//! primitive, and the state machine tying them together and driving the
//! per-identity store lifecycle.

pub mod clock;
pub mod machine;
pub mod platform_gate;
pub mod secret_gate;
pub mod session;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use machine::{AuthEvent, AuthMachine, AuthStatus, DEFAULT_REEVALUATION_PERIOD};
pub use platform_gate::{
    Assertion, CreatedCredential, CredentialRecord, PlatformAuthenticator, PlatformGate,
    SoftwareAuthenticator,
};
pub use secret_gate::{constant_time_eq, SecretGate, SecretGateRecord};
pub use session::{GateSession, SessionGate};
pub use token::{
    CredentialError, CredentialValidator, TokenAlgorithm, TokenClaims, TokenHeader, TrustedKey,
};
