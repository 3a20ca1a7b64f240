//! Account model
//!
//! Accounts are the double-entry ledger's postings targets: assets,
//! liabilities, income, expenses and equity. Two fixed system accounts act as
//! counterparties for simple one-sided income/expense entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::currency::CurrencyCode;
use super::ids::AccountId;

/// Double-entry account classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Asset,
    Liability,
    Income,
    Expense,
    Equity,
}

impl AccountKind {
    /// Parse an account kind from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "asset" => Some(Self::Asset),
            "liability" => Some(Self::Liability),
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            "equity" => Some(Self::Equity),
            _ => None,
        }
    }

    /// The line sign this kind of account usually sees
    ///
    /// Income accounts normally receive negative (credit) lines, expense
    /// accounts positive (debit) lines. Used for advisory warnings only.
    pub fn usual_sign(&self) -> Option<i64> {
        match self {
            Self::Income => Some(-1),
            Self::Expense => Some(1),
            _ => None,
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asset => write!(f, "Asset"),
            Self::Liability => write!(f, "Liability"),
            Self::Income => write!(f, "Income"),
            Self::Expense => write!(f, "Expense"),
            Self::Equity => write!(f, "Equity"),
        }
    }
}

/// A ledger account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier (`account::` namespace)
    pub id: AccountId,

    /// Account name (e.g. "Checking")
    pub name: String,

    /// Double-entry classification
    pub kind: AccountKind,

    /// Whether the account is shown in pickers and listings
    pub visible: bool,

    /// Whether the account is archived (only legal with no lines)
    pub archived: bool,

    /// Currency this account is denominated in
    pub default_currency: CurrencyCode,

    /// Minor-unit precision, matching the currency's canonical precision
    pub minor_unit: u32,

    /// Denormalized balance cache in minor units, recomputable from lines
    pub balance: i64,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last modified
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with default flags
    pub fn new(
        name: impl Into<String>,
        kind: AccountKind,
        default_currency: impl Into<CurrencyCode>,
        minor_unit: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::generate(),
            name: name.into(),
            kind,
            visible: true,
            archived: false,
            default_currency: default_currency.into(),
            minor_unit,
            balance: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fixed counterparty account for simple expense entries
    pub fn system_expense() -> Self {
        let mut account = Self::new("Expenses", AccountKind::Expense, "USD", 2);
        account.id = AccountId::from_suffix(SYSTEM_EXPENSE_SUFFIX);
        account.visible = false;
        account
    }

    /// Fixed counterparty account for simple income entries
    pub fn system_income() -> Self {
        let mut account = Self::new("Income", AccountKind::Income, "USD", 2);
        account.id = AccountId::from_suffix(SYSTEM_INCOME_SUFFIX);
        account.visible = false;
        account
    }

    /// Whether this is one of the two seeded system accounts
    pub fn is_system(&self) -> bool {
        self.id == AccountId::from_suffix(SYSTEM_EXPENSE_SUFFIX)
            || self.id == AccountId::from_suffix(SYSTEM_INCOME_SUFFIX)
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

/// Suffix of the seeded expense counterparty account id
pub const SYSTEM_EXPENSE_SUFFIX: &str = "expense-account";
/// Suffix of the seeded income counterparty account id
pub const SYSTEM_INCOME_SUFFIX: &str = "income-account";
