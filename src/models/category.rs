//! Category model
//!
//! Categories classify transactions for reporting. The hierarchy is limited
//! to exactly two levels: a category with a parent can never itself be a
//! parent. Parent and child must share the same kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::CategoryId;

/// Direction of money flow a category classifies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Income,
    Expense,
    Transfer,
}

impl CategoryKind {
    /// Parse a category kind from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            "transfer" => Some(Self::Transfer),
            _ => None,
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Income => write!(f, "Income"),
            Self::Expense => write!(f, "Expense"),
            Self::Transfer => write!(f, "Transfer"),
        }
    }
}

/// A transaction category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    /// Unique identifier (`category::` namespace)
    pub id: CategoryId,

    /// Category name, unique within its kind
    pub name: String,

    /// Flow direction this category belongs to
    pub kind: CategoryKind,

    /// Optional parent; the parent must be a top-level category of the same kind
    pub parent_category_id: Option<CategoryId>,

    /// Display color (hex string)
    pub color: Option<String>,

    /// Display icon name
    pub icon: Option<String>,

    /// Whether this category is archived
    pub archived: bool,

    /// When the category was created
    pub created_at: DateTime<Utc>,

    /// When the category was last modified
    pub updated_at: DateTime<Utc>,
}

impl Category {
    /// Create a new top-level category
    pub fn new(name: impl Into<String>, kind: CategoryKind) -> Self {
        let now = Utc::now();
        Self {
            id: CategoryId::generate(),
            name: name.into(),
            kind,
            parent_category_id: None,
            color: None,
            icon: None,
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a child category under a parent
    pub fn with_parent(name: impl Into<String>, kind: CategoryKind, parent: CategoryId) -> Self {
        let mut category = Self::new(name, kind);
        category.parent_category_id = Some(parent);
        category
    }

    /// Whether this category sits at the top of the hierarchy
    pub fn is_top_level(&self) -> bool {
        self.parent_category_id.is_none()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
