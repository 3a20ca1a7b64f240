//! Monthly report
//!
//! Income, expenses, net flow, running balances and category breakdown for
//! one month, segmented per currency. Built entirely from the aggregate
//! views; amounts never cross currencies.

use std::collections::HashMap;

use crate::error::LedgerResult;
use crate::models::{AccountId, CategoryId, CurrencyCode};
use crate::rules::general;
use crate::store::{CashflowKind, LedgerEngine};

/// One category's total within a currency section
#[derive(Debug, Clone)]
pub struct CategoryBreakdownEntry {
    pub category_id: CategoryId,
    pub name: String,
    /// Signed total of the category's lines this month
    pub total: i64,
}

/// Balance of one account through the report month
#[derive(Debug, Clone)]
pub struct RunningBalanceEntry {
    pub account_id: AccountId,
    pub name: String,
    pub balance: i64,
}

/// Everything the report knows about one currency
#[derive(Debug, Clone)]
pub struct CurrencySection {
    pub currency: CurrencyCode,
    /// Sum of inflow magnitudes this month
    pub income: i64,
    /// Sum of outflow magnitudes this month
    pub expenses: i64,
    /// income - expenses
    pub net: i64,
    pub category_breakdown: Vec<CategoryBreakdownEntry>,
    pub running_balances: Vec<RunningBalanceEntry>,
}

/// Monthly report, currency-segmented
#[derive(Debug, Clone)]
pub struct MonthlyReport {
    pub year_month: String,
    pub sections: Vec<CurrencySection>,
    /// Advisory findings (volume and the like)
    pub warnings: Vec<String>,
}

/// Build the monthly report for `year_month` (`YYYY-MM`)
pub async fn generate_monthly_report(
    engine: &LedgerEngine,
    year_month: &str,
) -> LedgerResult<MonthlyReport> {
    let cashflow = engine.month_cashflow(year_month).await?;
    let category_totals = engine.month_category_totals(year_month).await?;
    let accounts = engine.list_accounts(false).await?;
    let categories = engine.list_categories(false).await?;

    let category_names: HashMap<&CategoryId, &str> = categories
        .iter()
        .map(|c| (&c.id, c.name.as_str()))
        .collect();

    // Currencies seen in either view this month
    let mut currencies: Vec<CurrencyCode> = cashflow
        .iter()
        .map(|(c, _, _)| c.clone())
        .chain(category_totals.iter().map(|(_, c, _)| c.clone()))
        .collect();
    currencies.sort();
    currencies.dedup();

    let mut sections = Vec::with_capacity(currencies.len());
    for currency in currencies {
        let income = cashflow
            .iter()
            .find(|(c, k, _)| c == &currency && *k == CashflowKind::In)
            .map(|(_, _, total)| *total)
            .unwrap_or(0);
        let expenses = cashflow
            .iter()
            .find(|(c, k, _)| c == &currency && *k == CashflowKind::Out)
            .map(|(_, _, total)| *total)
            .unwrap_or(0);

        let category_breakdown = category_totals
            .iter()
            .filter(|(_, c, _)| c == &currency)
            .map(|(id, _, total)| CategoryBreakdownEntry {
                category_id: id.clone(),
                name: category_names
                    .get(id)
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| id.to_string()),
                total: *total,
            })
            .collect();

        let mut running_balances = Vec::new();
        for account in &accounts {
            let balances = engine
                .account_balances_to_date(&account.id, Some(year_month))
                .await?;
            if let Some(balance) = balances.get(&currency) {
                running_balances.push(RunningBalanceEntry {
                    account_id: account.id.clone(),
                    name: account.name.clone(),
                    balance: *balance,
                });
            }
        }

        sections.push(CurrencySection {
            currency,
            income,
            expenses,
            net: income - expenses,
            category_breakdown,
            running_balances,
        });
    }

    let mut warnings = Vec::new();
    let line_count = engine.lines_for_month(year_month).await?.len();
    if let Some(warning) = general::volume_warning(year_month, line_count) {
        warnings.push(warning);
    }

    Ok(MonthlyReport {
        year_month: year_month.to_string(),
        sections,
        warnings,
    })
}
