//! Account balances to date

use crate::error::LedgerResult;
use crate::models::{AccountId, AccountKind, CurrencyCode};
use crate::store::LedgerEngine;

/// One account's balance in one currency
#[derive(Debug, Clone)]
pub struct BalanceEntry {
    pub account_id: AccountId,
    pub name: String,
    pub kind: AccountKind,
    pub currency: CurrencyCode,
    pub balance: i64,
}

/// Balances of all active accounts up to and including `through`
/// (`YYYY-MM`), or across all time when `None`
pub async fn account_balances(
    engine: &LedgerEngine,
    through: Option<&str>,
) -> LedgerResult<Vec<BalanceEntry>> {
    let accounts = engine.list_accounts(true).await?;

    let mut entries = Vec::new();
    for account in accounts {
        let balances = engine
            .account_balances_to_date(&account.id, through)
            .await?;
        let mut currencies: Vec<_> = balances.into_iter().collect();
        currencies.sort_by(|a, b| a.0.cmp(&b.0));
        for (currency, balance) in currencies {
            entries.push(BalanceEntry {
                account_id: account.id.clone(),
                name: account.name.clone(),
                kind: account.kind,
                currency,
                balance,
            });
        }
    }
    Ok(entries)
}
