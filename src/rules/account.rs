//! Account business rules

use crate::models::{currency, Account};

use super::RuleReport;

/// Maximum minor-unit precision an account may declare
pub const MAX_MINOR_UNIT: u32 = 8;

/// Check a freshly built account against the existing set
pub fn check_new_account(account: &Account, existing: &[Account]) -> RuleReport {
    let mut report = RuleReport::new();

    if account.name.trim().is_empty() {
        report.error("name", "must not be empty");
    }

    if name_taken(&account.name, existing, None) {
        report.error("name", format!("an account named '{}' already exists", account.name));
    }

    if account.minor_unit > MAX_MINOR_UNIT {
        report.error(
            "minor_unit",
            format!("must be between 0 and {MAX_MINOR_UNIT}"),
        );
    }

    match currency::lookup(account.default_currency.as_str()) {
        Some(info) if info.minor_unit != account.minor_unit => {
            report.error(
                "minor_unit",
                format!(
                    "{} uses {} decimal places, got {}",
                    account.default_currency, info.minor_unit, account.minor_unit
                ),
            );
        }
        None => {
            report.warn(format!(
                "currency {} is not in the registry; using declared precision {}",
                account.default_currency, account.minor_unit
            ));
        }
        _ => {}
    }

    report
}

/// Check an account update against the existing set
///
/// `referencing_lines` is the number of transaction lines posting to this
/// account; archival is blocked while any exist (hide the account instead).
pub fn check_account_update(
    current: &Account,
    updated: &Account,
    existing: &[Account],
    referencing_lines: usize,
) -> RuleReport {
    let mut report = RuleReport::new();

    if updated.name.trim().is_empty() {
        report.error("name", "must not be empty");
    }

    if name_taken(&updated.name, existing, Some(current)) {
        report.error("name", format!("an account named '{}' already exists", updated.name));
    }

    if updated.archived && !current.archived && referencing_lines > 0 {
        report.error(
            "archived",
            format!(
                "account has {referencing_lines} transaction lines; set visible=false instead of archiving"
            ),
        );
    }

    report
}

/// Advisory sign check: income accounts usually receive credits, expense
/// accounts debits. Returns a warning when the sign looks implausible.
pub fn line_sign_warning(account: &Account, amount: i64) -> Option<String> {
    let usual = account.kind.usual_sign()?;
    if amount.signum() != 0 && amount.signum() != usual {
        Some(format!(
            "{} amount on {} account '{}' has an unusual sign",
            amount,
            account.kind,
            account.name
        ))
    } else {
        None
    }
}

fn name_taken(name: &str, existing: &[Account], exclude: Option<&Account>) -> bool {
    let lower = name.trim().to_lowercase();
    existing.iter().any(|a| {
        a.name.to_lowercase() == lower && exclude.map(|e| e.id != a.id).unwrap_or(true)
    })
}
