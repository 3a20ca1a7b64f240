//! Aggregate views over transaction lines
//!
//! Three monotonic map-reduce style views, each keyed by
//! `(year_month, dimension, currency)`:
//!
//! - **monthly balance** — line amounts summed by account
//! - **monthly by category** — line amounts summed by category (categorized
//!   lines only)
//! - **monthly cashflow** — absolute amounts summed by flow direction
//!
//! The cache is updated incrementally as lines are written and can always be
//! rebuilt from a full line scan, so query correctness never depends on view
//! freshness.

use std::collections::HashMap;
use std::fmt;

use serde_json::json;

use crate::models::{AccountId, CategoryId, CurrencyCode, TransactionLine};

/// Direction of a cashflow entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CashflowKind {
    /// Amount was zero or positive
    In,
    /// Amount was negative
    Out,
}

impl CashflowKind {
    pub fn of_amount(amount: i64) -> Self {
        if amount >= 0 {
            Self::In
        } else {
            Self::Out
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

impl fmt::Display for CashflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Descriptors persisted as design documents so repeated initialization can
/// tolerate already-provisioned views
pub const VIEW_DESCRIPTORS: &[(&str, &str)] = &[
    ("design::monthly-balance", "year_month, account_id, currency"),
    ("design::monthly-category", "year_month, category_id, currency"),
    ("design::monthly-cashflow", "year_month, currency, kind"),
];

/// Body of a view descriptor document
pub fn descriptor_body(keyed_by: &str) -> serde_json::Value {
    json!({ "type": "view", "keyed_by": keyed_by })
}

/// In-memory materialization of the three aggregate views
#[derive(Debug, Default)]
pub struct ViewCache {
    monthly_balance: HashMap<(String, AccountId, CurrencyCode), i64>,
    monthly_category: HashMap<(String, CategoryId, CurrencyCode), i64>,
    monthly_cashflow: HashMap<(String, CurrencyCode, CashflowKind), i64>,
    lines_seen: usize,
}

impl ViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a full scan of line documents
    pub fn rebuild<'a>(lines: impl IntoIterator<Item = &'a TransactionLine>) -> Self {
        let mut cache = Self::new();
        for line in lines {
            cache.apply_line(line);
        }
        cache
    }

    /// Fold one line into all three views
    pub fn apply_line(&mut self, line: &TransactionLine) {
        let ym = line.year_month.clone();

        *self
            .monthly_balance
            .entry((ym.clone(), line.account_id.clone(), line.currency.clone()))
            .or_insert(0) += line.amount;

        if let Some(category_id) = &line.category_id {
            *self
                .monthly_category
                .entry((ym.clone(), category_id.clone(), line.currency.clone()))
                .or_insert(0) += line.amount;
        }

        *self
            .monthly_cashflow
            .entry((ym, line.currency.clone(), CashflowKind::of_amount(line.amount)))
            .or_insert(0) += line.amount.abs();

        self.lines_seen += 1;
    }

    /// Number of lines folded into the cache
    pub fn lines_seen(&self) -> usize {
        self.lines_seen
    }

    /// Balance of one account per currency, up to and including `through`
    /// (all months when `None`)
    pub fn account_balances(
        &self,
        account_id: &AccountId,
        through: Option<&str>,
    ) -> HashMap<CurrencyCode, i64> {
        let mut totals: HashMap<CurrencyCode, i64> = HashMap::new();
        for ((ym, account, currency), amount) in &self.monthly_balance {
            if account != account_id {
                continue;
            }
            if let Some(limit) = through {
                if ym.as_str() > limit {
                    continue;
                }
            }
            *totals.entry(currency.clone()).or_insert(0) += amount;
        }
        totals
    }

    /// Per-account balances for one month
    pub fn month_balances(&self, year_month: &str) -> Vec<(AccountId, CurrencyCode, i64)> {
        let mut rows: Vec<_> = self
            .monthly_balance
            .iter()
            .filter(|((ym, _, _), _)| ym == year_month)
            .map(|((_, account, currency), amount)| (account.clone(), currency.clone(), *amount))
            .collect();
        rows.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
        rows
    }

    /// Per-category totals for one month
    pub fn month_category_totals(&self, year_month: &str) -> Vec<(CategoryId, CurrencyCode, i64)> {
        let mut rows: Vec<_> = self
            .monthly_category
            .iter()
            .filter(|((ym, _, _), _)| ym == year_month)
            .map(|((_, category, currency), amount)| (category.clone(), currency.clone(), *amount))
            .collect();
        rows.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
        rows
    }

    /// Cashflow totals (absolute amounts) for one month
    pub fn month_cashflow(&self, year_month: &str) -> Vec<(CurrencyCode, CashflowKind, i64)> {
        let mut rows: Vec<_> = self
            .monthly_cashflow
            .iter()
            .filter(|((ym, _, _), _)| ym == year_month)
            .map(|((_, currency, kind), total)| (currency.clone(), *kind, *total))
            .collect();
        rows.sort_by(|a, b| (&a.0, a.1.as_str()).cmp(&(&b.0, b.1.as_str())));
        rows
    }

    /// All months any view knows about, ascending
    pub fn months(&self) -> Vec<String> {
        let mut months: Vec<String> = self
            .monthly_balance
            .keys()
            .map(|(ym, _, _)| ym.clone())
            .collect();
        months.sort();
        months.dedup();
        months
    }
}
