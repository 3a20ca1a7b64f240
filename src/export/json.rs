//! JSON export
//!
//! Machine-readable full export of one identity's ledger, built on the
//! open-ended transaction listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use crate::models::{Account, Category, Transaction, TransactionLine, UserProfile, UserSettings};
use crate::store::LedgerEngine;

/// Bump when the export shape changes
pub const EXPORT_SCHEMA_VERSION: u32 = 1;

/// One transaction with its lines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionExport {
    pub transaction: Transaction,
    pub lines: Vec<TransactionLine>,
}

/// Complete ledger export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullExport {
    pub schema_version: u32,
    pub exported_at: DateTime<Utc>,
    pub user: UserProfile,
    pub settings: UserSettings,
    pub accounts: Vec<Account>,
    pub categories: Vec<Category>,
    pub transactions: Vec<TransactionExport>,
}

/// Export the full ledger as pretty-printed JSON
pub async fn export_full_json(engine: &LedgerEngine) -> LedgerResult<String> {
    let export = build_export(engine).await?;
    serde_json::to_string_pretty(&export).map_err(|e| LedgerError::Export(e.to_string()))
}

/// Assemble the export document
pub async fn build_export(engine: &LedgerEngine) -> LedgerResult<FullExport> {
    let page = engine.list_transactions(None, None).await?;
    let lines = engine.list_lines().await?;

    let transactions = page
        .transactions
        .into_iter()
        .map(|transaction| {
            let lines = lines
                .iter()
                .filter(|l| l.transaction_id == transaction.id)
                .cloned()
                .collect();
            TransactionExport { transaction, lines }
        })
        .collect();

    Ok(FullExport {
        schema_version: EXPORT_SCHEMA_VERSION,
        exported_at: Utc::now(),
        user: engine.get_user().await?,
        settings: engine.get_settings().await?,
        accounts: engine.list_accounts(false).await?,
        categories: engine.list_categories(false).await?,
        transactions,
    })
}
