//! Ledger storage engine
//!
//! A revisioned JSON document store per identity, a typed engine enforcing
//! the double-entry invariant on every write, aggregate views over the line
//! documents, and a registry owning the per-identity handle lifecycle.

pub mod docstore;
pub mod engine;
pub mod file_io;
pub mod registry;
pub mod views;

pub use docstore::{DocStore, PutDoc, StoredDoc};
pub use engine::{LedgerEngine, TransactionPage};
pub use file_io::{read_json, write_json_atomic};
pub use registry::StoreRegistry;
pub use views::{CashflowKind, ViewCache};
