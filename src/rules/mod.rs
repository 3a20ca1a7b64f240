//! Business rule validators
//!
//! Cross-entity invariant checks, independent of storage: every function here
//! is pure and takes the entity sets it needs as slices. Errors block the
//! operation; warnings are advisory and surfaced to the caller without
//! blocking.

pub mod account;
pub mod category;
pub mod general;
pub mod transaction;

use crate::error::{FieldError, LedgerResult, ValidationError};

/// Outcome of a business-rule check
#[derive(Debug, Clone, Default)]
pub struct RuleReport {
    /// Blocking failures with field context
    pub errors: Vec<FieldError>,
    /// Advisory findings; never block
    pub warnings: Vec<String>,
}

impl RuleReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Merge another report into this one
    pub fn merge(&mut self, other: RuleReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Convert into a result, yielding the warnings on success
    pub fn into_result(self) -> LedgerResult<Vec<String>> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(ValidationError {
                errors: self.errors,
            }
            .into())
        }
    }
}
