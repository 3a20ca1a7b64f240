//! Custom error types for the ledger core
//!
//! This module defines the error hierarchy for the crate using thiserror
//! for ergonomic error definitions.

use std::fmt;

use thiserror::Error;

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldError {
    /// Name of the offending field (e.g. "name", "lines[2].amount")
    pub field: String,
    /// Human-readable description of the failure
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Schema or business-rule validation failure with per-field detail
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Build a single-field validation error
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new(field, message)],
        }
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns `Ok(())` when no field errors were collected
    pub fn into_result(self) -> Result<(), LedgerError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let detail: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", detail.join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// The main error type for ledger core operations
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Schema or business-rule validation failure
    #[error("Validation error: {0}")]
    Validation(ValidationError),

    /// Double-entry invariant violated; nothing was persisted
    #[error("Unbalanced transaction: {0}")]
    UnbalancedTransaction(String),

    /// Arithmetic on two different currencies
    #[error("Currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },

    /// Division of a monetary amount by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Requested document absent
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Revision mismatch detected by the storage layer
    #[error("Conflict on {id}: expected revision {expected}, found {actual}")]
    Conflict {
        id: String,
        expected: u64,
        actual: u64,
    },

    /// Duplicate entity errors
    #[error("{entity_type} already exists: {identifier}")]
    Duplicate {
        entity_type: &'static str,
        identifier: String,
    },

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Gate setup/verification infrastructure failure (not a wrong secret)
    #[error("Gate error: {0}")]
    Gate(String),

    /// Export errors
    #[error("Export error: {0}")]
    Export(String),
}

impl LedgerError {
    /// Create a "not found" error for accounts
    pub fn account_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Account",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for categories
    pub fn category_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Category",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for transactions
    pub fn transaction_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Transaction",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for raw documents
    pub fn document_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Document",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a revision conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<ValidationError> for LedgerError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for ledger core operations
pub type LedgerResult<T> = Result<T, LedgerError>;
