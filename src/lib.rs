//! pocket-ledger - Local-first double-entry ledger core
//!
//! This library provides the core of a local-first personal finance tracker:
//! an immutable double-entry ledger over a per-identity, revisioned document
//! store, and an offline-capable layered authentication state machine that
//! gates access to that store. UI, forms and dashboards are external
//! collaborators calling through this crate's types.
//!
//! # Architecture
//!
//! - `config`: Path layout and explicit service configuration
//! - `error`: Custom error types
//! - `models`: Core data models (money, accounts, transactions, categories)
//! - `schema`: Document schemas, draft/patch variants, typed storage boundary
//! - `store`: Revisioned document store, ledger engine, views, registry
//! - `rules`: Business rule validators (pure, storage-independent)
//! - `reports`: Aggregation layer (monthly report, spending, balances)
//! - `auth`: Credential validator, gates, session gate, auth state machine
//! - `export`: JSON/CSV export
//!
//! # Example
//!
//! ```rust,ignore
//! use pocket_ledger::config::CoreConfig;
//! use pocket_ledger::store::StoreRegistry;
//!
//! let registry = StoreRegistry::new(CoreConfig::new()?);
//! let engine = registry.open("alice@example.com").await?;
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod reports;
pub mod rules;
pub mod schema;
pub mod store;

pub use error::{LedgerError, LedgerResult};
