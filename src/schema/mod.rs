//! Document schema and validation boundary
//!
//! Declarative draft ("create") and patch ("update") shapes for every entity,
//! plus the typed parse/serialize boundary the storage engine goes through.
//! Raw JSON never crosses the engine's public surface: everything entering or
//! leaving storage passes `parse_document`/`to_body`.
//!
//! The composite transaction-batch validator here is the single authoritative
//! gate before any write reaches storage: it re-checks the per-currency
//! zero-sum invariant with exact integer arithmetic.

use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LedgerError, LedgerResult, ValidationError};
use crate::models::{
    currency, Account, AccountId, AccountKind, Category, CategoryId, CategoryKind, CurrencyCode,
    DeltaType, GateMethod, LineId, Transaction, TransactionId, TransactionLine, UserProfile,
    UserSettings, SETTINGS_DOC_ID, USER_DOC_ID,
};

/// Maximum length of account and category names
pub const MAX_NAME_LEN: usize = 100;
/// Maximum length of a transaction description
pub const MAX_DESCRIPTION_LEN: usize = 500;
/// Widest supported minor-unit precision (satoshi-scale)
pub const MAX_MINOR_UNIT: u32 = 8;

// ---------------------------------------------------------------------------
// Drafts (create variants: server-managed fields omitted)
// ---------------------------------------------------------------------------

/// Fields a caller supplies to create an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDraft {
    pub name: String,
    pub kind: AccountKind,
    pub default_currency: CurrencyCode,
    /// Defaults to the currency's canonical precision when omitted
    pub minor_unit: Option<u32>,
    #[serde(default = "default_true")]
    pub visible: bool,
}

fn default_true() -> bool {
    true
}

impl AccountDraft {
    pub fn new(
        name: impl Into<String>,
        kind: AccountKind,
        currency: impl Into<CurrencyCode>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            default_currency: currency.into(),
            minor_unit: None,
            visible: true,
        }
    }

    /// Validate and materialize into a full account document
    pub fn build(self) -> LedgerResult<Account> {
        let mut v = ValidationError::new();

        let name = self.name.trim().to_string();
        if name.is_empty() {
            v.push("name", "must not be empty");
        } else if name.len() > MAX_NAME_LEN {
            v.push("name", format!("must be at most {MAX_NAME_LEN} characters"));
        }

        let canonical = self.default_currency.minor_unit();
        let minor_unit = self.minor_unit.unwrap_or(canonical);
        if minor_unit > MAX_MINOR_UNIT {
            v.push(
                "minor_unit",
                format!("must be between 0 and {MAX_MINOR_UNIT}"),
            );
        } else if currency::lookup(self.default_currency.as_str()).is_some()
            && minor_unit != canonical
        {
            v.push(
                "minor_unit",
                format!(
                    "{} uses {} decimal places, got {}",
                    self.default_currency, canonical, minor_unit
                ),
            );
        }

        v.into_result()?;

        let mut account = Account::new(name, self.kind, self.default_currency, minor_unit);
        account.visible = self.visible;
        Ok(account)
    }
}

/// Partial account update; immutable fields (kind, currency) are absent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountPatch {
    pub name: Option<String>,
    pub visible: Option<bool>,
    pub archived: Option<bool>,
}

impl AccountPatch {
    /// Validate and apply onto an existing account
    pub fn apply(&self, account: &mut Account) -> LedgerResult<()> {
        let mut v = ValidationError::new();

        if let Some(name) = &self.name {
            let name = name.trim();
            if name.is_empty() {
                v.push("name", "must not be empty");
            } else if name.len() > MAX_NAME_LEN {
                v.push("name", format!("must be at most {MAX_NAME_LEN} characters"));
            }
        }

        v.into_result()?;

        if let Some(name) = &self.name {
            account.name = name.trim().to_string();
        }
        if let Some(visible) = self.visible {
            account.visible = visible;
        }
        if let Some(archived) = self.archived {
            account.archived = archived;
        }
        account.updated_at = Utc::now();
        Ok(())
    }
}

/// Fields a caller supplies to create a category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDraft {
    pub name: String,
    pub kind: CategoryKind,
    pub parent_category_id: Option<CategoryId>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

impl CategoryDraft {
    pub fn new(name: impl Into<String>, kind: CategoryKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parent_category_id: None,
            color: None,
            icon: None,
        }
    }

    pub fn with_parent(mut self, parent: CategoryId) -> Self {
        self.parent_category_id = Some(parent);
        self
    }

    /// Validate fields and materialize; hierarchy rules are checked separately
    /// against the existing category set by the business-rule layer.
    pub fn build(self) -> LedgerResult<Category> {
        let mut v = ValidationError::new();

        let name = self.name.trim().to_string();
        if name.is_empty() {
            v.push("name", "must not be empty");
        } else if name.len() > MAX_NAME_LEN {
            v.push("name", format!("must be at most {MAX_NAME_LEN} characters"));
        }

        if let Some(color) = &self.color {
            if !color.starts_with('#') || !(4..=9).contains(&color.len()) {
                v.push("color", "must be a hex color like #rrggbb");
            }
        }

        v.into_result()?;

        let mut category = Category::new(name, self.kind);
        category.parent_category_id = self.parent_category_id;
        category.color = self.color;
        category.icon = self.icon;
        Ok(category)
    }
}

/// Partial category update; kind and parent are immutable after creation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub archived: Option<bool>,
}

impl CategoryPatch {
    pub fn apply(&self, category: &mut Category) -> LedgerResult<()> {
        let mut v = ValidationError::new();

        if let Some(name) = &self.name {
            let name = name.trim();
            if name.is_empty() {
                v.push("name", "must not be empty");
            } else if name.len() > MAX_NAME_LEN {
                v.push("name", format!("must be at most {MAX_NAME_LEN} characters"));
            }
        }

        v.into_result()?;

        if let Some(name) = &self.name {
            category.name = name.trim().to_string();
        }
        if let Some(color) = &self.color {
            category.color = Some(color.clone());
        }
        if let Some(icon) = &self.icon {
            category.icon = Some(icon.clone());
        }
        if let Some(archived) = self.archived {
            category.archived = archived;
        }
        category.updated_at = Utc::now();
        Ok(())
    }
}

/// Fields a caller supplies to create a transaction header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub date: NaiveDate,
    pub description: String,
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TransactionDraft {
    pub fn new(date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            date,
            description: description.into(),
            category_id: None,
            tags: Vec::new(),
        }
    }
}

/// Fields a caller supplies for one transaction line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineDraft {
    pub account_id: AccountId,
    /// Signed amount in minor units
    pub amount: i64,
    pub currency: CurrencyCode,
    pub category_id: Option<CategoryId>,
    pub delta_type: Option<DeltaType>,
    pub original_line_id: Option<LineId>,
    pub reason: Option<String>,
}

impl LineDraft {
    pub fn new(account_id: AccountId, amount: i64, currency: impl Into<CurrencyCode>) -> Self {
        Self {
            account_id,
            amount,
            currency: currency.into(),
            category_id: None,
            delta_type: None,
            original_line_id: None,
            reason: None,
        }
    }

    pub fn with_category(mut self, category: CategoryId) -> Self {
        self.category_id = Some(category);
        self
    }

    /// Mark this line as a correction of an earlier one
    pub fn correction_of(mut self, original: LineId, reason: impl Into<String>) -> Self {
        self.delta_type = Some(DeltaType::Correction);
        self.original_line_id = Some(original);
        self.reason = Some(reason.into());
        self
    }

    /// Mark this line as a full reversal of an earlier one
    pub fn reversal_of(mut self, original: LineId, reason: impl Into<String>) -> Self {
        self.delta_type = Some(DeltaType::Reversal);
        self.original_line_id = Some(original);
        self.reason = Some(reason.into());
        self
    }
}

/// Partial profile update; identity and timestamps are server-managed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPatch {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub home_currency: Option<CurrencyCode>,
    pub locale: Option<String>,
}

impl UserPatch {
    pub fn apply(&self, profile: &mut UserProfile) -> LedgerResult<()> {
        let mut v = ValidationError::new();

        if let Some(email) = &self.email {
            if !email.contains('@') {
                v.push("email", "must be an email address");
            }
        }
        if let Some(display_name) = &self.display_name {
            if display_name.trim().is_empty() {
                v.push("display_name", "must not be empty");
            }
        }

        v.into_result()?;

        if let Some(email) = &self.email {
            profile.email = email.clone();
        }
        if let Some(display_name) = &self.display_name {
            profile.display_name = display_name.trim().to_string();
        }
        if let Some(home_currency) = &self.home_currency {
            profile.home_currency = home_currency.clone();
        }
        if let Some(locale) = &self.locale {
            profile.locale = locale.clone();
        }
        profile.updated_at = Utc::now();
        Ok(())
    }
}

/// Partial settings update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub gate_method: Option<GateMethod>,
    pub gate_duration_min: Option<u32>,
    pub home_currency_override: Option<CurrencyCode>,
    pub hide_balances: Option<bool>,
    pub theme: Option<String>,
    pub default_view: Option<String>,
}

impl SettingsPatch {
    pub fn apply(&self, settings: &mut UserSettings) -> LedgerResult<()> {
        if let Some(minutes) = self.gate_duration_min {
            if minutes == 0 || minutes > 24 * 60 {
                return Err(ValidationError::single(
                    "gate_duration_min",
                    "must be between 1 and 1440 minutes",
                )
                .into());
            }
        }

        if let Some(gate_method) = self.gate_method {
            settings.gate_method = gate_method;
        }
        if let Some(minutes) = self.gate_duration_min {
            settings.gate_duration_min = minutes;
        }
        if let Some(currency) = &self.home_currency_override {
            settings.home_currency_override = Some(currency.clone());
        }
        if let Some(hide) = self.hide_balances {
            settings.hide_balances = hide;
        }
        if let Some(theme) = &self.theme {
            settings.theme = theme.clone();
        }
        if let Some(view) = &self.default_view {
            settings.default_view = view.clone();
        }
        settings.updated_at = Utc::now();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Composite transaction validation
// ---------------------------------------------------------------------------

/// Field-level checks for a transaction draft and its lines
///
/// Does not touch the balance invariant; `materialize_transaction` layers
/// that on top.
pub fn validate_transaction_fields(
    draft: &TransactionDraft,
    lines: &[LineDraft],
) -> LedgerResult<()> {
    let mut v = ValidationError::new();

    if draft.description.trim().is_empty() {
        v.push("description", "must not be empty");
    } else if draft.description.len() > MAX_DESCRIPTION_LEN {
        v.push(
            "description",
            format!("must be at most {MAX_DESCRIPTION_LEN} characters"),
        );
    }

    if lines.len() < 2 {
        v.push("lines", "a transaction needs at least two lines");
    }

    for (i, line) in lines.iter().enumerate() {
        if line.amount == 0 {
            v.push(format!("lines[{i}].amount"), "must not be zero");
        }
        if line.currency.as_str().is_empty() {
            v.push(format!("lines[{i}].currency"), "must not be empty");
        }
        if line.delta_type.is_some() && line.original_line_id.is_none() {
            v.push(
                format!("lines[{i}].original_line_id"),
                "required when delta_type is set",
            );
        }
    }

    v.into_result()
}

/// Exact per-currency zero-sum check over line drafts
///
/// This is the authoritative double-entry invariant: integer arithmetic, no
/// tolerance. Returns `UnbalancedTransaction` naming each offending currency.
pub fn check_zero_sum(lines: &[LineDraft]) -> LedgerResult<()> {
    let mut sums: Vec<(&CurrencyCode, i64)> = Vec::new();
    for line in lines {
        match sums.iter_mut().find(|(c, _)| *c == &line.currency) {
            Some((_, sum)) => *sum += line.amount,
            None => sums.push((&line.currency, line.amount)),
        }
    }

    let off: Vec<String> = sums
        .iter()
        .filter(|(_, sum)| *sum != 0)
        .map(|(c, sum)| format!("{c} off by {sum}"))
        .collect();

    if off.is_empty() {
        Ok(())
    } else {
        Err(LedgerError::UnbalancedTransaction(off.join(", ")))
    }
}

/// Validate a transaction batch and materialize the typed documents
///
/// The single gate in front of the storage writer: field validation, then the
/// exact zero-sum invariant, then construction of the header and lines with
/// all derived fields (`year_month`, `line_count`, `is_debit`) filled in.
pub fn materialize_transaction(
    draft: TransactionDraft,
    line_drafts: Vec<LineDraft>,
) -> LedgerResult<(Transaction, Vec<TransactionLine>)> {
    validate_transaction_fields(&draft, &line_drafts)?;
    check_zero_sum(&line_drafts)?;

    let mut txn = Transaction::new(draft.date, draft.description.trim());
    txn.category_id = draft.category_id;
    txn.tags = draft.tags;
    txn.line_count = line_drafts.len() as u32;

    let lines = line_drafts
        .into_iter()
        .map(|d| {
            let mut line = TransactionLine::new(&txn, d.account_id, d.amount, d.currency);
            line.category_id = d.category_id.or_else(|| txn.category_id.clone());
            line.delta_type = d.delta_type;
            line.original_line_id = d.original_line_id;
            line.reason = d.reason;
            line
        })
        .collect();

    Ok((txn, lines))
}

// ---------------------------------------------------------------------------
// Typed document boundary
// ---------------------------------------------------------------------------

/// A typed document, narrowed from raw storage JSON by id namespace
#[derive(Debug, Clone)]
pub enum Document {
    User(UserProfile),
    Settings(UserSettings),
    Account(Account),
    Category(Category),
    Transaction(Transaction),
    Line(TransactionLine),
}

/// Parse a raw stored body into the typed entity for its id namespace
pub fn parse_document(id: &str, body: &Value) -> LedgerResult<Document> {
    if id == USER_DOC_ID {
        return Ok(Document::User(entity_from_value(id, body)?));
    }
    if id == SETTINGS_DOC_ID {
        return Ok(Document::Settings(entity_from_value(id, body)?));
    }
    if id.starts_with(AccountId::PREFIX) {
        return Ok(Document::Account(entity_from_value(id, body)?));
    }
    if id.starts_with(CategoryId::PREFIX) {
        return Ok(Document::Category(entity_from_value(id, body)?));
    }
    if id.starts_with(TransactionId::PREFIX) {
        return Ok(Document::Transaction(entity_from_value(id, body)?));
    }
    if id.starts_with(LineId::PREFIX) {
        return Ok(Document::Line(entity_from_value(id, body)?));
    }
    Err(ValidationError::single("_id", format!("unknown document namespace: {id}")).into())
}

/// Deserialize a stored body into a concrete entity type
pub fn entity_from_value<T: DeserializeOwned>(id: &str, body: &Value) -> LedgerResult<T> {
    serde_json::from_value(body.clone())
        .map_err(|e| ValidationError::single("_id", format!("malformed document {id}: {e}")).into())
}

/// Serialize an entity into a storage body
pub fn to_body<T: Serialize>(entity: &T) -> LedgerResult<Value> {
    Ok(serde_json::to_value(entity)?)
}
