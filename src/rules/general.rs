//! General consistency rules

use crate::models::{currency, Account};
use crate::schema::LineDraft;

/// Soft cap on lines in one month before a volume warning
pub const MONTHLY_LINES_WARNING: usize = 10_000;

/// Warn when a line's currency disagrees with its account's denomination or
/// carries a different canonical precision
pub fn precision_warning(line: &LineDraft, account: &Account) -> Option<String> {
    if line.currency != account.default_currency {
        return Some(format!(
            "line posts {} to account '{}' denominated in {}",
            line.currency, account.name, account.default_currency
        ));
    }
    if let Some(info) = currency::lookup(line.currency.as_str()) {
        if info.minor_unit != account.minor_unit {
            return Some(format!(
                "account '{}' declares {} decimal places but {} uses {}",
                account.name, account.minor_unit, line.currency, info.minor_unit
            ));
        }
    }
    None
}

/// Warn when a month accumulates an unusually large number of lines
pub fn volume_warning(month: &str, line_count: usize) -> Option<String> {
    if line_count > MONTHLY_LINES_WARNING {
        Some(format!(
            "{month} holds {line_count} lines; aggregate queries may slow down"
        ))
    } else {
        None
    }
}
