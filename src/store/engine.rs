//! Typed ledger engine over the document store
//!
//! One engine per identity. All CRUD passes the schema boundary (typed
//! parse/serialize, never raw JSON) and the business-rule validators before
//! any write reaches the document store. The transaction writer persists the
//! header and all lines as one atomic batch after the exact zero-sum check.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::config::LedgerPaths;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    Account, AccountId, Category, CategoryId, CurrencyCode, Money, Transaction, TransactionId,
    TransactionLine, UserProfile, UserSettings, SETTINGS_DOC_ID, USER_DOC_ID,
};
use crate::rules;
use crate::schema::{
    self, AccountDraft, AccountPatch, CategoryDraft, CategoryPatch, LineDraft, SettingsPatch,
    TransactionDraft, UserPatch,
};

use super::docstore::{DocStore, PutDoc};
use super::views::{descriptor_body, CashflowKind, ViewCache, VIEW_DESCRIPTORS};
use tokio::sync::RwLock;

/// One page of a reverse-chronological transaction listing
#[derive(Debug, Clone)]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    /// Pass back as `cursor` to continue after the last entry
    pub next_cursor: Option<TransactionId>,
}

/// Per-identity ledger storage engine
pub struct LedgerEngine {
    identity: String,
    store: DocStore,
    views: RwLock<ViewCache>,
}

impl LedgerEngine {
    /// Open (or create) the store for `identity`, provision views and seed
    /// default documents
    ///
    /// Idempotent: repeated opens tolerate already-provisioned views and
    /// already-seeded defaults.
    pub(crate) async fn open(paths: &LedgerPaths, identity: &str) -> LedgerResult<Self> {
        paths.ensure_directories()?;

        let store = DocStore::open(paths.documents_file(identity)).await?;
        let engine = Self {
            identity: identity.to_string(),
            store,
            views: RwLock::new(ViewCache::new()),
        };

        engine.provision(identity).await?;
        engine.rebuild_views().await?;

        info!(identity, "ledger store opened");
        Ok(engine)
    }

    /// Identity this store belongs to
    pub fn identity(&self) -> &str {
        &self.identity
    }

    async fn provision(&self, identity: &str) -> LedgerResult<()> {
        // View descriptors; create_if_absent swallows "already exists"
        for (id, keyed_by) in VIEW_DESCRIPTORS {
            self.store
                .create_if_absent(id, descriptor_body(keyed_by))
                .await?;
        }

        let email = if identity.contains('@') {
            identity.to_string()
        } else {
            format!("{identity}@local")
        };
        let profile = UserProfile::new(identity, email);
        self.store
            .create_if_absent(USER_DOC_ID, schema::to_body(&profile)?)
            .await?;

        self.store
            .create_if_absent(SETTINGS_DOC_ID, schema::to_body(&UserSettings::default())?)
            .await?;

        for account in [Account::system_expense(), Account::system_income()] {
            self.store
                .create_if_absent(account.id.as_str(), schema::to_body(&account)?)
                .await?;
        }

        Ok(())
    }

    async fn rebuild_views(&self) -> LedgerResult<()> {
        let lines = self.list_lines().await?;
        let mut views = self.views.write().await;
        *views = ViewCache::rebuild(lines.iter());
        debug!(lines = lines.len(), "aggregate views rebuilt");
        Ok(())
    }

    /// Re-materialize the view cache when it has fallen behind the store
    ///
    /// Queries call this first, so correctness never depends on the cache
    /// having been kept up to date.
    async fn ensure_views(&self) -> LedgerResult<()> {
        let stored = self.store.count_prefix(crate::models::LineId::PREFIX).await;
        let cached = self.views.read().await.lines_seen();
        if stored != cached {
            self.rebuild_views().await?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // User profile and settings
    // -----------------------------------------------------------------------

    pub async fn get_user(&self) -> LedgerResult<UserProfile> {
        let doc = self.store.get_required(USER_DOC_ID).await?;
        schema::entity_from_value(USER_DOC_ID, &doc.body)
    }

    pub async fn update_user(&self, patch: UserPatch) -> LedgerResult<UserProfile> {
        let doc = self.store.get_required(USER_DOC_ID).await?;
        let mut profile: UserProfile = schema::entity_from_value(USER_DOC_ID, &doc.body)?;
        patch.apply(&mut profile)?;
        self.store
            .put(PutDoc::update(USER_DOC_ID, doc.rev, schema::to_body(&profile)?))
            .await?;
        Ok(profile)
    }

    pub async fn get_settings(&self) -> LedgerResult<UserSettings> {
        let doc = self.store.get_required(SETTINGS_DOC_ID).await?;
        schema::entity_from_value(SETTINGS_DOC_ID, &doc.body)
    }

    pub async fn update_settings(&self, patch: SettingsPatch) -> LedgerResult<UserSettings> {
        let doc = self.store.get_required(SETTINGS_DOC_ID).await?;
        let mut settings: UserSettings = schema::entity_from_value(SETTINGS_DOC_ID, &doc.body)?;
        patch.apply(&mut settings)?;
        self.store
            .put(PutDoc::update(
                SETTINGS_DOC_ID,
                doc.rev,
                schema::to_body(&settings)?,
            ))
            .await?;
        Ok(settings)
    }

    // -----------------------------------------------------------------------
    // Accounts
    // -----------------------------------------------------------------------

    pub async fn create_account(&self, draft: AccountDraft) -> LedgerResult<Account> {
        let account = draft.build()?;
        let existing = self.all_accounts().await?;
        let warnings = rules::account::check_new_account(&account, &existing).into_result()?;
        log_warnings("create_account", &warnings);

        self.store
            .put(PutDoc::create(account.id.as_str(), schema::to_body(&account)?))
            .await?;
        Ok(account)
    }

    pub async fn get_account(&self, id: &AccountId) -> LedgerResult<Account> {
        let doc = self
            .store
            .get(id.as_str())
            .await
            .ok_or_else(|| LedgerError::account_not_found(id.as_str()))?;
        schema::entity_from_value(id.as_str(), &doc.body)
    }

    pub async fn update_account(
        &self,
        id: &AccountId,
        patch: AccountPatch,
    ) -> LedgerResult<Account> {
        let doc = self
            .store
            .get(id.as_str())
            .await
            .ok_or_else(|| LedgerError::account_not_found(id.as_str()))?;
        let current: Account = schema::entity_from_value(id.as_str(), &doc.body)?;

        let mut updated = current.clone();
        patch.apply(&mut updated)?;

        let existing = self.all_accounts().await?;
        let referencing = self.lines_for_account(id).await?.len();
        let warnings =
            rules::account::check_account_update(&current, &updated, &existing, referencing)
                .into_result()?;
        log_warnings("update_account", &warnings);

        self.store
            .put(PutDoc::update(id.as_str(), doc.rev, schema::to_body(&updated)?))
            .await?;
        Ok(updated)
    }

    /// List accounts; `active_only` filters out archived and hidden ones
    pub async fn list_accounts(&self, active_only: bool) -> LedgerResult<Vec<Account>> {
        let accounts = self.all_accounts().await?;
        if active_only {
            Ok(accounts
                .into_iter()
                .filter(|a| !a.archived && a.visible)
                .collect())
        } else {
            Ok(accounts)
        }
    }

    async fn all_accounts(&self) -> LedgerResult<Vec<Account>> {
        self.store
            .list_prefix(AccountId::PREFIX)
            .await
            .iter()
            .map(|doc| schema::entity_from_value(&doc.id, &doc.body))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Categories
    // -----------------------------------------------------------------------

    pub async fn create_category(&self, draft: CategoryDraft) -> LedgerResult<Category> {
        let category = draft.build()?;
        let existing = self.list_categories(false).await?;
        let warnings = rules::category::check_new_category(&category, &existing).into_result()?;
        log_warnings("create_category", &warnings);

        self.store
            .put(PutDoc::create(
                category.id.as_str(),
                schema::to_body(&category)?,
            ))
            .await?;
        Ok(category)
    }

    pub async fn get_category(&self, id: &CategoryId) -> LedgerResult<Category> {
        let doc = self
            .store
            .get(id.as_str())
            .await
            .ok_or_else(|| LedgerError::category_not_found(id.as_str()))?;
        schema::entity_from_value(id.as_str(), &doc.body)
    }

    pub async fn update_category(
        &self,
        id: &CategoryId,
        patch: CategoryPatch,
    ) -> LedgerResult<Category> {
        let doc = self
            .store
            .get(id.as_str())
            .await
            .ok_or_else(|| LedgerError::category_not_found(id.as_str()))?;
        let current: Category = schema::entity_from_value(id.as_str(), &doc.body)?;

        let mut updated = current.clone();
        patch.apply(&mut updated)?;

        let existing = self.list_categories(false).await?;
        let warnings =
            rules::category::check_category_update(&current, &updated, &existing).into_result()?;
        log_warnings("update_category", &warnings);

        self.store
            .put(PutDoc::update(id.as_str(), doc.rev, schema::to_body(&updated)?))
            .await?;
        Ok(updated)
    }

    pub async fn list_categories(&self, active_only: bool) -> LedgerResult<Vec<Category>> {
        let categories: LedgerResult<Vec<Category>> = self
            .store
            .list_prefix(CategoryId::PREFIX)
            .await
            .iter()
            .map(|doc| schema::entity_from_value(&doc.id, &doc.body))
            .collect();
        let categories = categories?;
        if active_only {
            Ok(categories.into_iter().filter(|c| !c.archived).collect())
        } else {
            Ok(categories)
        }
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Validate and atomically persist a transaction with its lines
    ///
    /// The exact per-currency zero-sum check runs before anything touches the
    /// store: an unbalanced batch fails with `UnbalancedTransaction` and no
    /// document is written.
    pub async fn create_transaction(
        &self,
        draft: TransactionDraft,
        line_drafts: Vec<LineDraft>,
    ) -> LedgerResult<(Transaction, Vec<TransactionLine>)> {
        schema::validate_transaction_fields(&draft, &line_drafts)?;
        schema::check_zero_sum(&line_drafts)?;

        let accounts = self.all_accounts().await?;
        let warnings =
            rules::transaction::check_transaction(&draft, &line_drafts, &accounts).into_result()?;
        log_warnings("create_transaction", &warnings);

        let (txn, lines) = schema::materialize_transaction(draft, line_drafts)?;

        let mut batch = vec![PutDoc::create(txn.id.as_str(), schema::to_body(&txn)?)];
        for line in &lines {
            batch.push(PutDoc::create(line.id.as_str(), schema::to_body(line)?));
        }
        self.store.bulk_put(batch).await?;

        let mut views = self.views.write().await;
        for line in &lines {
            views.apply_line(line);
        }
        drop(views);

        debug!(
            id = %txn.id,
            lines = lines.len(),
            month = %txn.year_month,
            "transaction written"
        );
        Ok((txn, lines))
    }

    /// A transaction plus all its lines, in creation order
    pub async fn get_transaction_with_lines(
        &self,
        id: &TransactionId,
    ) -> LedgerResult<(Transaction, Vec<TransactionLine>)> {
        let doc = self
            .store
            .get(id.as_str())
            .await
            .ok_or_else(|| LedgerError::transaction_not_found(id.as_str()))?;
        let txn: Transaction = schema::entity_from_value(id.as_str(), &doc.body)?;

        let lines = self
            .list_lines()
            .await?
            .into_iter()
            .filter(|l| &l.transaction_id == id)
            .collect();
        Ok((txn, lines))
    }

    /// Most-recent-first transaction listing
    ///
    /// Sorting happens in memory after the prefix fetch: result sets are
    /// bounded by what one person enters by hand, and the store is not asked
    /// to sort. Open-ended when `limit` is `None` (used by aggregation and
    /// export).
    pub async fn list_transactions(
        &self,
        limit: Option<usize>,
        cursor: Option<&TransactionId>,
    ) -> LedgerResult<TransactionPage> {
        let mut transactions: Vec<Transaction> = self
            .store
            .list_prefix(TransactionId::PREFIX)
            .await
            .iter()
            .map(|doc| schema::entity_from_value(&doc.id, &doc.body))
            .collect::<LedgerResult<_>>()?;

        // Ids are time-ordered, so reverse id order is reverse-chronological
        transactions.sort_by(|a, b| b.id.cmp(&a.id));

        if let Some(cursor) = cursor {
            transactions.retain(|t| t.id < *cursor);
        }

        let next_cursor = match limit {
            Some(limit) if transactions.len() > limit => {
                transactions.truncate(limit);
                transactions.last().map(|t| t.id.clone())
            }
            _ => None,
        };

        Ok(TransactionPage {
            transactions,
            next_cursor,
        })
    }

    /// All line documents, in creation order
    pub async fn list_lines(&self) -> LedgerResult<Vec<TransactionLine>> {
        self.store
            .list_prefix(crate::models::LineId::PREFIX)
            .await
            .iter()
            .map(|doc| schema::entity_from_value(&doc.id, &doc.body))
            .collect()
    }

    /// Lines posting to one account, in creation order
    pub async fn lines_for_account(&self, id: &AccountId) -> LedgerResult<Vec<TransactionLine>> {
        Ok(self
            .list_lines()
            .await?
            .into_iter()
            .filter(|l| &l.account_id == id)
            .collect())
    }

    /// Lines of one `YYYY-MM` month, in creation order
    pub async fn lines_for_month(&self, year_month: &str) -> LedgerResult<Vec<TransactionLine>> {
        Ok(self
            .list_lines()
            .await?
            .into_iter()
            .filter(|l| l.year_month == year_month)
            .collect())
    }

    // -----------------------------------------------------------------------
    // Aggregates
    // -----------------------------------------------------------------------

    /// Current balance of an account in its default currency
    pub async fn account_balance(&self, id: &AccountId) -> LedgerResult<Money> {
        self.account_balance_to_date(id, None).await
    }

    /// Balance up to and including `through` (`YYYY-MM`); all months if `None`
    pub async fn account_balance_to_date(
        &self,
        id: &AccountId,
        through: Option<&str>,
    ) -> LedgerResult<Money> {
        let account = self.get_account(id).await?;
        self.ensure_views().await?;
        let views = self.views.read().await;
        let totals = views.account_balances(id, through);
        let amount = totals.get(&account.default_currency).copied().unwrap_or(0);
        Ok(Money::from_minor(amount, account.default_currency))
    }

    /// Balance of an account per currency it has ever been posted in
    pub async fn account_balances_by_currency(
        &self,
        id: &AccountId,
    ) -> LedgerResult<HashMap<CurrencyCode, i64>> {
        self.account_balances_to_date(id, None).await
    }

    /// Per-currency balance up to and including `through` (`YYYY-MM`)
    pub async fn account_balances_to_date(
        &self,
        id: &AccountId,
        through: Option<&str>,
    ) -> LedgerResult<HashMap<CurrencyCode, i64>> {
        // Existence check keeps NotFound semantics consistent
        self.get_account(id).await?;
        self.ensure_views().await?;
        Ok(self.views.read().await.account_balances(id, through))
    }

    /// Recompute and persist the denormalized balance cache of one account
    ///
    /// Balances are read-time aggregates; the cache only exists for cheap
    /// listing displays and is refreshed explicitly, never treated as truth.
    pub async fn refresh_balance_cache(&self, id: &AccountId) -> LedgerResult<Account> {
        let balance = self.account_balance(id).await?.amount();

        let doc = self
            .store
            .get(id.as_str())
            .await
            .ok_or_else(|| LedgerError::account_not_found(id.as_str()))?;
        let mut account: Account = schema::entity_from_value(id.as_str(), &doc.body)?;
        if account.balance != balance {
            account.balance = balance;
            account.updated_at = chrono::Utc::now();
            self.store
                .put(PutDoc::update(id.as_str(), doc.rev, schema::to_body(&account)?))
                .await?;
        }
        Ok(account)
    }

    /// Cashflow totals (absolute amounts) for one month
    pub async fn month_cashflow(
        &self,
        year_month: &str,
    ) -> LedgerResult<Vec<(CurrencyCode, CashflowKind, i64)>> {
        self.ensure_views().await?;
        Ok(self.views.read().await.month_cashflow(year_month))
    }

    /// Per-category totals for one month
    pub async fn month_category_totals(
        &self,
        year_month: &str,
    ) -> LedgerResult<Vec<(CategoryId, CurrencyCode, i64)>> {
        self.ensure_views().await?;
        Ok(self.views.read().await.month_category_totals(year_month))
    }

    /// Per-account balances for one month
    pub async fn month_balances(
        &self,
        year_month: &str,
    ) -> LedgerResult<Vec<(AccountId, CurrencyCode, i64)>> {
        self.ensure_views().await?;
        Ok(self.views.read().await.month_balances(year_month))
    }

    /// All months with any activity, ascending
    pub async fn months(&self) -> LedgerResult<Vec<String>> {
        self.ensure_views().await?;
        Ok(self.views.read().await.months())
    }
}

fn log_warnings(operation: &str, warnings: &[String]) {
    for warning in warnings {
        warn!(operation, warning = warning.as_str(), "business rule warning");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountKind, CategoryKind};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    async fn open_engine() -> (TempDir, LedgerEngine) {
        let temp_dir = TempDir::new().unwrap();
        let paths = LedgerPaths::with_base_dir(temp_dir.path().to_path_buf());
        let engine = LedgerEngine::open(&paths, "alice@example.com").await.unwrap();
        (temp_dir, engine)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn usd_asset(engine: &LedgerEngine, name: &str) -> Account {
        engine
            .create_account(AccountDraft::new(name, AccountKind::Asset, "USD"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_seeds_defaults() {
        let (_tmp, engine) = open_engine().await;

        let user = engine.get_user().await.unwrap();
        assert_eq!(user.user_id, "alice@example.com");
        assert_eq!(user.email, "alice@example.com");

        let settings = engine.get_settings().await.unwrap();
        assert_eq!(settings.gate_duration_min, 5);

        // System counterparty accounts are present but hidden
        let all = engine.list_accounts(false).await.unwrap();
        assert_eq!(all.len(), 2);
        let active = engine.list_accounts(true).await.unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let paths = LedgerPaths::with_base_dir(temp_dir.path().to_path_buf());

        let engine = LedgerEngine::open(&paths, "alice").await.unwrap();
        usd_asset(&engine, "Checking").await;
        drop(engine);

        // Re-open must not duplicate seeds or disturb data
        let engine = LedgerEngine::open(&paths, "alice").await.unwrap();
        let accounts = engine.list_accounts(false).await.unwrap();
        assert_eq!(accounts.len(), 3);
    }

    #[tokio::test]
    async fn test_create_transaction_end_to_end() {
        let (_tmp, engine) = open_engine().await;
        let a = usd_asset(&engine, "Checking").await;
        let b = engine
            .create_account(AccountDraft::new("Food", AccountKind::Expense, "USD"))
            .await
            .unwrap();

        let (txn, lines) = engine
            .create_transaction(
                TransactionDraft::new(date(2024, 1, 15), "Groceries"),
                vec![
                    LineDraft::new(a.id.clone(), -5000, "USD"),
                    LineDraft::new(b.id.clone(), 5000, "USD"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(txn.line_count, 2);
        assert_eq!(lines.len(), 2);

        let balance = engine.account_balance(&a.id).await.unwrap();
        assert_eq!(balance.amount(), -5000);
        assert_eq!(balance.to_string(), "-50.00 USD");

        let cashflow = engine.month_cashflow("2024-01").await.unwrap();
        let out = cashflow
            .iter()
            .find(|(_, k, _)| *k == CashflowKind::Out)
            .unwrap();
        assert_eq!(out.2, 5000);
    }

    #[tokio::test]
    async fn test_unbalanced_transaction_persists_nothing() {
        let (_tmp, engine) = open_engine().await;
        let a = usd_asset(&engine, "Checking").await;
        let b = usd_asset(&engine, "Savings").await;

        let err = engine
            .create_transaction(
                TransactionDraft::new(date(2024, 1, 15), "Broken"),
                vec![
                    LineDraft::new(a.id.clone(), -5000, "USD"),
                    LineDraft::new(b.id.clone(), 4999, "USD"),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnbalancedTransaction(_)));

        let page = engine.list_transactions(None, None).await.unwrap();
        assert!(page.transactions.is_empty());
        assert!(engine.list_lines().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transaction_against_unknown_account_rejected() {
        let (_tmp, engine) = open_engine().await;
        let a = usd_asset(&engine, "Checking").await;

        let err = engine
            .create_transaction(
                TransactionDraft::new(date(2024, 1, 15), "Ghost"),
                vec![
                    LineDraft::new(a.id.clone(), -100, "USD"),
                    LineDraft::new(AccountId::generate(), 100, "USD"),
                ],
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_list_transactions_reverse_chronological_with_cursor() {
        let (_tmp, engine) = open_engine().await;
        let a = usd_asset(&engine, "Checking").await;
        let b = usd_asset(&engine, "Savings").await;

        for i in 0..5 {
            engine
                .create_transaction(
                    TransactionDraft::new(date(2024, 1, 10 + i), format!("t{i}")),
                    vec![
                        LineDraft::new(a.id.clone(), -100, "USD"),
                        LineDraft::new(b.id.clone(), 100, "USD"),
                    ],
                )
                .await
                .unwrap();
        }

        let first = engine.list_transactions(Some(2), None).await.unwrap();
        assert_eq!(first.transactions.len(), 2);
        assert_eq!(first.transactions[0].description, "t4");
        assert_eq!(first.transactions[1].description, "t3");
        let cursor = first.next_cursor.unwrap();

        let second = engine
            .list_transactions(Some(2), Some(&cursor))
            .await
            .unwrap();
        assert_eq!(second.transactions[0].description, "t2");

        // Open-ended listing returns everything
        let all = engine.list_transactions(None, None).await.unwrap();
        assert_eq!(all.transactions.len(), 5);
        assert!(all.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_get_transaction_with_lines_in_creation_order() {
        let (_tmp, engine) = open_engine().await;
        let a = usd_asset(&engine, "Checking").await;
        let b = usd_asset(&engine, "Savings").await;

        let (txn, lines) = engine
            .create_transaction(
                TransactionDraft::new(date(2024, 1, 15), "Move"),
                vec![
                    LineDraft::new(a.id.clone(), -100, "USD"),
                    LineDraft::new(b.id.clone(), 100, "USD"),
                ],
            )
            .await
            .unwrap();

        let (fetched, fetched_lines) = engine.get_transaction_with_lines(&txn.id).await.unwrap();
        assert_eq!(fetched.id, txn.id);
        assert_eq!(
            fetched_lines.iter().map(|l| l.id.clone()).collect::<Vec<_>>(),
            lines.iter().map(|l| l.id.clone()).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_archive_blocked_while_lines_exist() {
        let (_tmp, engine) = open_engine().await;
        let a = usd_asset(&engine, "Checking").await;
        let b = usd_asset(&engine, "Savings").await;

        engine
            .create_transaction(
                TransactionDraft::new(date(2024, 1, 15), "Move"),
                vec![
                    LineDraft::new(a.id.clone(), -100, "USD"),
                    LineDraft::new(b.id.clone(), 100, "USD"),
                ],
            )
            .await
            .unwrap();

        let err = engine
            .update_account(
                &a.id,
                AccountPatch {
                    archived: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());

        // Hiding instead works
        let hidden = engine
            .update_account(
                &a.id,
                AccountPatch {
                    visible: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!hidden.visible);
    }

    #[tokio::test]
    async fn test_duplicate_account_name_rejected() {
        let (_tmp, engine) = open_engine().await;
        usd_asset(&engine, "Checking").await;

        let err = engine
            .create_account(AccountDraft::new("checking", AccountKind::Liability, "USD"))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_category_hierarchy_enforced() {
        let (_tmp, engine) = open_engine().await;

        let parent = engine
            .create_category(CategoryDraft::new("Food", CategoryKind::Expense))
            .await
            .unwrap();
        let child = engine
            .create_category(
                CategoryDraft::new("Groceries", CategoryKind::Expense)
                    .with_parent(parent.id.clone()),
            )
            .await
            .unwrap();

        // Third level is rejected
        let err = engine
            .create_category(
                CategoryDraft::new("Veggies", CategoryKind::Expense).with_parent(child.id.clone()),
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());

        // Kind mismatch is rejected
        let err = engine
            .create_category(
                CategoryDraft::new("Salary", CategoryKind::Income).with_parent(parent.id.clone()),
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_balance_cache_refresh() {
        let (_tmp, engine) = open_engine().await;
        let a = usd_asset(&engine, "Checking").await;
        let b = usd_asset(&engine, "Savings").await;

        engine
            .create_transaction(
                TransactionDraft::new(date(2024, 1, 15), "Move"),
                vec![
                    LineDraft::new(a.id.clone(), -2500, "USD"),
                    LineDraft::new(b.id.clone(), 2500, "USD"),
                ],
            )
            .await
            .unwrap();

        // Cache starts stale and is refreshed explicitly
        assert_eq!(engine.get_account(&a.id).await.unwrap().balance, 0);
        let refreshed = engine.refresh_balance_cache(&a.id).await.unwrap();
        assert_eq!(refreshed.balance, -2500);
        assert_eq!(engine.get_account(&a.id).await.unwrap().balance, -2500);
    }

    #[tokio::test]
    async fn test_correction_appends_new_line() {
        let (_tmp, engine) = open_engine().await;
        let a = usd_asset(&engine, "Checking").await;
        let b = usd_asset(&engine, "Savings").await;

        let (_, lines) = engine
            .create_transaction(
                TransactionDraft::new(date(2024, 1, 15), "Move"),
                vec![
                    LineDraft::new(a.id.clone(), -5000, "USD"),
                    LineDraft::new(b.id.clone(), 5000, "USD"),
                ],
            )
            .await
            .unwrap();
        let original = lines[0].id.clone();

        // Correct by appending a delta transaction, never editing in place
        engine
            .create_transaction(
                TransactionDraft::new(date(2024, 1, 16), "Fix amount"),
                vec![
                    LineDraft::new(a.id.clone(), -500, "USD")
                        .correction_of(original.clone(), "missed tip"),
                    LineDraft::new(b.id.clone(), 500, "USD"),
                ],
            )
            .await
            .unwrap();

        let all_lines = engine.list_lines().await.unwrap();
        assert_eq!(all_lines.len(), 4);
        let correction = all_lines
            .iter()
            .find(|l| l.original_line_id.as_ref() == Some(&original))
            .unwrap();
        assert_eq!(correction.amount, -500);

        // Original is untouched
        let untouched = all_lines.iter().find(|l| l.id == original).unwrap();
        assert_eq!(untouched.amount, -5000);

        let balance = engine.account_balance(&a.id).await.unwrap();
        assert_eq!(balance.amount(), -5500);
    }

    #[tokio::test]
    async fn test_user_and_settings_updates() {
        let (_tmp, engine) = open_engine().await;

        let profile = engine
            .update_user(UserPatch {
                display_name: Some("Alice".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(profile.display_name, "Alice");

        let settings = engine
            .update_settings(SettingsPatch {
                gate_duration_min: Some(10),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(settings.gate_duration_min, 10);
    }
}
