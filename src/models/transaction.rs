//! Transaction and transaction-line models
//!
//! A transaction owns two or more lines whose signed amounts sum to zero per
//! currency. Lines are immutable once written: there is no update path.
//! Corrections and reversals are appended as new lines referencing the
//! original through `original_line_id`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::currency::CurrencyCode;
use super::ids::{AccountId, CategoryId, LineId, TransactionId};

/// Derive the `YYYY-MM` bucket a date falls into
pub fn year_month(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Why an appended line exists relative to an earlier one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaType {
    /// Partial amendment of the original line's amount
    Correction,
    /// Full cancellation of the original line
    Reversal,
}

impl fmt::Display for DeltaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Correction => write!(f, "correction"),
            Self::Reversal => write!(f, "reversal"),
        }
    }
}

/// A ledger transaction header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier (`txn::` namespace, time-ordered)
    pub id: TransactionId,

    /// Date the transaction occurred
    pub date: NaiveDate,

    /// Description (e.g. "Groceries")
    pub description: String,

    /// Default category applied to lines without their own
    pub category_id: Option<CategoryId>,

    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Derived `YYYY-MM` bucket, kept consistent with `date`
    pub year_month: String,

    /// Cached number of owned lines, set at creation
    pub line_count: u32,

    /// When the transaction was created
    pub created_at: DateTime<Utc>,

    /// When the transaction was last modified
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a transaction header; `line_count` is filled by the writer
    pub fn new(date: NaiveDate, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionId::generate(),
            date,
            description: description.into(),
            category_id: None,
            tags: Vec::new(),
            year_month: year_month(date),
            line_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A single immutable posting against an account
///
/// Has no `updated_at` on purpose: lines are never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionLine {
    /// Unique identifier (`line::` namespace, time-ordered)
    pub id: LineId,

    /// Owning transaction
    pub transaction_id: TransactionId,

    /// Account this line posts to
    pub account_id: AccountId,

    /// Signed amount in the currency's minor unit
    pub amount: i64,

    /// Currency of `amount`
    pub currency: CurrencyCode,

    /// Copied from the owning transaction
    pub date: NaiveDate,

    /// Copied from the owning transaction
    pub year_month: String,

    /// Category override for this line
    pub category_id: Option<CategoryId>,

    /// Derived: true when `amount` is negative
    pub is_debit: bool,

    /// When the line was created
    pub created_at: DateTime<Utc>,

    /// Set when this line amends an earlier one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_type: Option<DeltaType>,

    /// The line this correction/reversal refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_line_id: Option<LineId>,

    /// Free-form reason for the amendment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TransactionLine {
    /// Create a line owned by `transaction`, deriving the copied fields
    pub fn new(
        transaction: &Transaction,
        account_id: AccountId,
        amount: i64,
        currency: impl Into<CurrencyCode>,
    ) -> Self {
        Self {
            id: LineId::generate(),
            transaction_id: transaction.id.clone(),
            account_id,
            amount,
            currency: currency.into(),
            date: transaction.date,
            year_month: transaction.year_month.clone(),
            category_id: None,
            is_debit: amount < 0,
            created_at: Utc::now(),
            delta_type: None,
            original_line_id: None,
            reason: None,
        }
    }
}
