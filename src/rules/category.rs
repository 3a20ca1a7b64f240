//! Category business rules
//!
//! The hierarchy is limited to exactly two levels and parent/child must share
//! a kind. The parent-chain walk keeps a visited set and fails fast on the
//! first revisited id, so corrupted data can never send it into a loop.

use std::collections::{HashMap, HashSet};

use crate::models::{Category, CategoryId};

use super::RuleReport;

/// Check a freshly built category against the existing set
pub fn check_new_category(category: &Category, existing: &[Category]) -> RuleReport {
    let mut report = RuleReport::new();

    if name_taken(category, existing) {
        report.error(
            "name",
            format!(
                "a {} category named '{}' already exists",
                category.kind, category.name
            ),
        );
    }

    if let Some(parent_id) = &category.parent_category_id {
        let by_id: HashMap<&CategoryId, &Category> =
            existing.iter().map(|c| (&c.id, c)).collect();

        match by_id.get(parent_id) {
            None => {
                report.error("parent_category_id", format!("parent {parent_id} does not exist"));
            }
            Some(parent) => {
                if parent.kind != category.kind {
                    report.error(
                        "parent_category_id",
                        format!(
                            "parent is a {} category, child is {}",
                            parent.kind, category.kind
                        ),
                    );
                }
                if !parent.is_top_level() {
                    report.error(
                        "parent_category_id",
                        "hierarchy is limited to two levels: the parent already has a parent",
                    );
                }
                if let Some(cycle_at) = find_cycle(category, &by_id) {
                    report.error(
                        "parent_category_id",
                        format!("parent chain revisits {cycle_at}"),
                    );
                }
            }
        }
    }

    report
}

/// Check a category update (rename uniqueness within kind)
pub fn check_category_update(
    current: &Category,
    updated: &Category,
    existing: &[Category],
) -> RuleReport {
    let mut report = RuleReport::new();

    let lower = updated.name.trim().to_lowercase();
    let taken = existing
        .iter()
        .any(|c| c.kind == updated.kind && c.id != current.id && c.name.to_lowercase() == lower);
    if taken {
        report.error(
            "name",
            format!(
                "a {} category named '{}' already exists",
                updated.kind, updated.name
            ),
        );
    }

    report
}

/// Walk the parent chain with a visited set; returns the first revisited id
fn find_cycle(
    category: &Category,
    by_id: &HashMap<&CategoryId, &Category>,
) -> Option<CategoryId> {
    let mut visited: HashSet<&CategoryId> = HashSet::new();
    visited.insert(&category.id);

    let mut cursor = category.parent_category_id.as_ref();
    while let Some(id) = cursor {
        if !visited.insert(id) {
            return Some(id.clone());
        }
        cursor = by_id.get(id).and_then(|c| c.parent_category_id.as_ref());
    }
    None
}

fn name_taken(category: &Category, existing: &[Category]) -> bool {
    let lower = category.name.trim().to_lowercase();
    existing
        .iter()
        .any(|c| c.kind == category.kind && c.name.to_lowercase() == lower)
}
