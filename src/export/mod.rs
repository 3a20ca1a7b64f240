//! Ledger export
//!
//! Complete data export in two formats:
//! - JSON: machine-readable full export
//! - CSV: transaction lines for spreadsheets

pub mod csv;
pub mod json;

pub use csv::export_lines_csv;
pub use json::{build_export, export_full_json, FullExport, TransactionExport, EXPORT_SCHEMA_VERSION};
