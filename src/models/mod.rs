//! Core data models for the ledger
//!
//! All monetary values are integers in the currency's minor unit; the
//! `Money` type is the only sanctioned way to do arithmetic on them.

pub mod account;
pub mod category;
pub mod currency;
pub mod ids;
pub mod money;
pub mod settings;
pub mod transaction;
pub mod user;

pub use account::{Account, AccountKind, SYSTEM_EXPENSE_SUFFIX, SYSTEM_INCOME_SUFFIX};
pub use category::{Category, CategoryKind};
pub use currency::{CurrencyCode, CurrencyInfo};
pub use ids::{AccountId, CategoryId, LineId, TransactionId};
pub use money::Money;
pub use settings::{GateMethod, UserSettings, DEFAULT_GATE_DURATION_MIN, SETTINGS_DOC_ID};
pub use transaction::{year_month, DeltaType, Transaction, TransactionLine};
pub use user::{UserProfile, USER_DOC_ID};
