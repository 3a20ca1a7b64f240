//! Transaction business rules
//!
//! Cross-entity checks run before the storage writer: every line's account
//! must exist and not be archived. The balance check here is the legacy
//! advisory one with floating tolerance; the storage layer's exact integer
//! check remains authoritative.

use std::collections::HashMap;

use crate::models::{Account, AccountId, CurrencyCode};
use crate::schema::{LineDraft, TransactionDraft};

use super::{account as account_rules, general, RuleReport};

/// Tolerance of the advisory balance check, in minor units
pub const BALANCE_TOLERANCE: f64 = 1e-6;

/// Soft cap on lines per transaction before a volume warning
pub const LINES_PER_TRANSACTION_WARNING: usize = 100;

/// Check a transaction draft and its lines against the account set
pub fn check_transaction(
    draft: &TransactionDraft,
    lines: &[LineDraft],
    accounts: &[Account],
) -> RuleReport {
    let mut report = RuleReport::new();

    if draft.description.trim().is_empty() {
        report.error("description", "must not be empty");
    }

    if lines.len() < 2 {
        report.error("lines", "a transaction needs at least two lines");
    }
    if lines.len() > LINES_PER_TRANSACTION_WARNING {
        report.warn(format!(
            "transaction has {} lines; consider splitting it",
            lines.len()
        ));
    }

    let by_id: HashMap<&AccountId, &Account> = accounts.iter().map(|a| (&a.id, a)).collect();

    for (i, line) in lines.iter().enumerate() {
        match by_id.get(&line.account_id) {
            None => {
                report.error(
                    format!("lines[{i}].account_id"),
                    format!("account {} does not exist", line.account_id),
                );
            }
            Some(account) => {
                if account.archived {
                    report.error(
                        format!("lines[{i}].account_id"),
                        format!("account '{}' is archived", account.name),
                    );
                }
                if let Some(warning) = account_rules::line_sign_warning(account, line.amount) {
                    report.warn(warning);
                }
                if let Some(warning) = general::precision_warning(line, account) {
                    report.warn(warning);
                }
            }
        }
    }

    // Advisory float-tolerance balance check; storage enforces the exact one
    let mut sums: HashMap<&CurrencyCode, f64> = HashMap::new();
    for line in lines {
        *sums.entry(&line.currency).or_insert(0.0) += line.amount as f64;
    }
    for (currency, sum) in sums {
        if sum.abs() > BALANCE_TOLERANCE {
            report.error("lines", format!("{currency} lines do not balance (off by {sum})"));
        }
    }

    report
}
