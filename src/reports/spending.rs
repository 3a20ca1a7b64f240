//! Category spending breakdown
//!
//! Restricts the monthly category view to expense-side (negative) totals and
//! flips the sign for display, so "spent 50.00" reads positive.

use std::collections::HashMap;

use crate::error::LedgerResult;
use crate::models::{CategoryId, CurrencyCode};
use crate::store::LedgerEngine;

/// Spending in one category, one currency
#[derive(Debug, Clone)]
pub struct SpendingEntry {
    pub category_id: CategoryId,
    pub name: String,
    pub currency: CurrencyCode,
    /// Magnitude spent (sign-flipped from the negative line total)
    pub spent: i64,
}

/// Expense breakdown for one month
#[derive(Debug, Clone)]
pub struct SpendingReport {
    pub year_month: String,
    /// Largest spenders first within each currency
    pub entries: Vec<SpendingEntry>,
    /// Total spent per currency
    pub totals: HashMap<CurrencyCode, i64>,
}

/// Build the spending breakdown for `year_month`
pub async fn generate_spending_report(
    engine: &LedgerEngine,
    year_month: &str,
) -> LedgerResult<SpendingReport> {
    let category_totals = engine.month_category_totals(year_month).await?;
    let categories = engine.list_categories(false).await?;
    let names: HashMap<&CategoryId, &str> = categories
        .iter()
        .map(|c| (&c.id, c.name.as_str()))
        .collect();

    let mut entries: Vec<SpendingEntry> = category_totals
        .iter()
        .filter(|(_, _, total)| *total < 0)
        .map(|(id, currency, total)| SpendingEntry {
            category_id: id.clone(),
            name: names
                .get(id)
                .map(|n| n.to_string())
                .unwrap_or_else(|| id.to_string()),
            currency: currency.clone(),
            spent: -total,
        })
        .collect();
    entries.sort_by(|a, b| (&a.currency, b.spent).cmp(&(&b.currency, a.spent)));

    let mut totals: HashMap<CurrencyCode, i64> = HashMap::new();
    for entry in &entries {
        *totals.entry(entry.currency.clone()).or_insert(0) += entry.spent;
    }

    Ok(SpendingReport {
        year_month: year_month.to_string(),
        entries,
        totals,
    })
}
