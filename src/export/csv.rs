//! CSV export
//!
//! Exports transaction lines in spreadsheet-friendly form, one row per line
//! with its owning transaction's context denormalized in.

use std::collections::HashMap;
use std::io::Write;

use crate::error::{LedgerError, LedgerResult};
use crate::store::LedgerEngine;

/// Export all transaction lines to CSV
pub async fn export_lines_csv<W: Write>(engine: &LedgerEngine, writer: &mut W) -> LedgerResult<()> {
    let accounts = engine.list_accounts(false).await?;
    let account_names: HashMap<_, _> = accounts
        .iter()
        .map(|a| (a.id.clone(), a.name.clone()))
        .collect();

    let categories = engine.list_categories(false).await?;
    let category_names: HashMap<_, _> = categories
        .iter()
        .map(|c| (c.id.clone(), c.name.clone()))
        .collect();

    let page = engine.list_transactions(None, None).await?;
    let descriptions: HashMap<_, _> = page
        .transactions
        .iter()
        .map(|t| (t.id.clone(), t.description.clone()))
        .collect();

    writeln!(
        writer,
        "Line ID,Transaction ID,Date,Description,Account,Category,Amount,Currency,Delta Type,Original Line"
    )
    .map_err(|e| LedgerError::Export(e.to_string()))?;

    for line in engine.list_lines().await? {
        let account_name = account_names
            .get(&line.account_id)
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string());
        let category_name = line
            .category_id
            .as_ref()
            .and_then(|id| category_names.get(id).cloned())
            .unwrap_or_default();
        let description = descriptions
            .get(&line.transaction_id)
            .cloned()
            .unwrap_or_default();

        writeln!(
            writer,
            "{},{},{},{},{},{},{},{},{},{}",
            line.id,
            line.transaction_id,
            line.date,
            escape_csv(&description),
            escape_csv(&account_name),
            escape_csv(&category_name),
            line.amount,
            line.currency,
            line.delta_type.map(|d| d.to_string()).unwrap_or_default(),
            line.original_line_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_default(),
        )
        .map_err(|e| LedgerError::Export(e.to_string()))?;
    }

    Ok(())
}

/// Quote a CSV field if it contains commas, quotes, or newlines
fn escape_csv(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerPaths;
    use crate::models::AccountKind;
    use crate::schema::{AccountDraft, LineDraft, TransactionDraft};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[tokio::test]
    async fn test_lines_csv() {
        let tmp = TempDir::new().unwrap();
        let paths = LedgerPaths::with_base_dir(tmp.path().to_path_buf());
        let engine = LedgerEngine::open(&paths, "alice").await.unwrap();

        let a = engine
            .create_account(AccountDraft::new("Checking", AccountKind::Asset, "USD"))
            .await
            .unwrap();
        let b = engine
            .create_account(AccountDraft::new("Savings", AccountKind::Asset, "USD"))
            .await
            .unwrap();
        engine
            .create_transaction(
                TransactionDraft::new(
                    NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                    "Rent, utilities",
                ),
                vec![
                    LineDraft::new(a.id.clone(), -5000, "USD"),
                    LineDraft::new(b.id.clone(), 5000, "USD"),
                ],
            )
            .await
            .unwrap();

        let mut out = Vec::new();
        export_lines_csv(&engine, &mut out).await.unwrap();
        let csv = String::from_utf8(out).unwrap();

        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("Line ID,"));
        assert_eq!(lines.count(), 2);
        // Description with a comma is quoted
        assert!(csv.contains("\"Rent, utilities\""));
        assert!(csv.contains("Checking"));
        assert!(csv.contains("-5000"));
    }
}
