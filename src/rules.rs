// 🏷️ Categorizer - keyword rules as data
// Exact (trimmed, case-insensitive) description → category matching

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::categories::{normalize_keyword, CategoryStore};
use crate::transaction::{Transaction, WorkingSet, UNCATEGORIZED};

// ============================================================================
// MATCH POLICY
// ============================================================================

/// Which category wins when a description matches keywords in several
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPolicy {
    /// Later category in store order overrides earlier ones
    #[default]
    LastMatch,

    /// First matching category in store order sticks
    FirstMatch,
}

// ============================================================================
// CATEGORIZER
// ============================================================================

struct CompiledCategory {
    name: String,
    keywords: HashSet<String>,
}

/// Keyword lists normalized once, ready to classify many rows
pub struct Categorizer {
    categories: Vec<CompiledCategory>,
    policy: MatchPolicy,
}

impl Categorizer {
    /// Snapshot the store; "Uncategorized" and keyword-less categories are skipped
    pub fn new(store: &CategoryStore, policy: MatchPolicy) -> Self {
        let categories = store
            .entries()
            .iter()
            .filter(|e| !e.is_uncategorized() && !e.keywords.is_empty())
            .map(|e| CompiledCategory {
                name: e.name.clone(),
                keywords: e.keywords.iter().map(|k| normalize_keyword(k)).collect(),
            })
            .collect();

        Categorizer { categories, policy }
    }

    /// Category for one description
    pub fn classify(&self, description: &str) -> &str {
        let details = normalize_keyword(description);
        let mut matches = self
            .categories
            .iter()
            .filter(|c| c.keywords.contains(&details));

        let winner = match self.policy {
            MatchPolicy::FirstMatch => matches.next(),
            MatchPolicy::LastMatch => matches.last(),
        };

        winner.map(|c| c.name.as_str()).unwrap_or(UNCATEGORIZED)
    }

    /// Overwrite every row's Category
    pub fn categorize(&self, rows: &mut [Transaction]) {
        for row in rows.iter_mut() {
            row.category = self.classify(&row.description).to_string();
        }
    }

    pub fn categorize_working_set(&self, set: &mut WorkingSet) {
        self.categorize(&mut set.expenses);
        self.categorize(&mut set.income);
    }

    /// Number of categories that can match anything
    pub fn rule_count(&self) -> usize {
        self.categories.len()
    }
}

/// One-shot helper: categorize `rows` against `store`
pub fn categorize_transactions(rows: &mut [Transaction], store: &CategoryStore, policy: MatchPolicy) {
    Categorizer::new(store, policy).categorize(rows);
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionType;
    use chrono::NaiveDate;

    fn row(description: &str) -> Transaction {
        Transaction::new(
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            description,
            10.0,
            TransactionType::Expense,
        )
    }

    fn food_store() -> CategoryStore {
        CategoryStore::from_entries(vec![("Uncategorized", vec![]), ("Food", vec!["mcdonalds"])])
    }

    #[test]
    fn test_example_scenario() {
        let mut rows = vec![row(" McDonalds ")];
        categorize_transactions(&mut rows, &food_store(), MatchPolicy::LastMatch);
        assert_eq!(rows[0].category, "Food");
    }

    #[test]
    fn test_exact_match_only() {
        let categorizer = Categorizer::new(&food_store(), MatchPolicy::LastMatch);

        assert_eq!(categorizer.classify("MCDONALDS"), "Food");
        assert_eq!(categorizer.classify("McDonalds Amsterdam"), UNCATEGORIZED);
        assert_eq!(categorizer.classify("mcdonald"), UNCATEGORIZED);
    }

    #[test]
    fn test_keywords_are_normalized_too() {
        let store = CategoryStore::from_entries(vec![("Food", vec!["  LIDL  "])]);
        let categorizer = Categorizer::new(&store, MatchPolicy::LastMatch);
        assert_eq!(categorizer.classify("lidl"), "Food");
    }

    #[test]
    fn test_resets_previous_category() {
        let mut rows = vec![row("Unknown shop").with_category("Food")];
        categorize_transactions(&mut rows, &food_store(), MatchPolicy::LastMatch);
        assert_eq!(rows[0].category, UNCATEGORIZED);
    }

    #[test]
    fn test_tie_break_last_match_wins() {
        let store = CategoryStore::from_entries(vec![
            ("Food", vec!["revolut shop"]),
            ("Shopping", vec!["Revolut Shop"]),
        ]);

        let mut rows = vec![row("Revolut Shop")];
        categorize_transactions(&mut rows, &store, MatchPolicy::LastMatch);
        assert_eq!(rows[0].category, "Shopping");
    }

    #[test]
    fn test_tie_break_first_match_policy() {
        let store = CategoryStore::from_entries(vec![
            ("Food", vec!["revolut shop"]),
            ("Shopping", vec!["Revolut Shop"]),
        ]);

        let mut rows = vec![row("Revolut Shop")];
        categorize_transactions(&mut rows, &store, MatchPolicy::FirstMatch);
        assert_eq!(rows[0].category, "Food");
    }

    #[test]
    fn test_deterministic() {
        let store = CategoryStore::from_entries(vec![
            ("Food", vec!["lidl", "mcdonalds"]),
            ("Transport", vec!["uber"]),
        ]);
        let descriptions = ["Lidl", "Uber", "Rent", "mcdonalds", "UBER "];

        let mut first: Vec<Transaction> = descriptions.iter().map(|d| row(d)).collect();
        let mut second = first.clone();
        categorize_transactions(&mut first, &store, MatchPolicy::LastMatch);
        categorize_transactions(&mut second, &store, MatchPolicy::LastMatch);

        assert_eq!(first, second);
        let cats: Vec<&str> = first.iter().map(|t| t.category.as_str()).collect();
        assert_eq!(cats, vec!["Food", "Transport", UNCATEGORIZED, "Food", "Transport"]);
    }

    #[test]
    fn test_rule_count_skips_empty_and_uncategorized() {
        let store = CategoryStore::from_entries(vec![
            ("Food", vec!["lidl"]),
            ("Bills", vec![]),
        ]);
        assert_eq!(Categorizer::new(&store, MatchPolicy::LastMatch).rule_count(), 1);
    }

    #[test]
    fn test_categorize_working_set() {
        let mut set = WorkingSet::new(
            vec![row("lidl")],
            vec![row("mcdonalds")],
        );
        let store = CategoryStore::from_entries(vec![("Food", vec!["lidl", "mcdonalds"])]);
        Categorizer::new(&store, MatchPolicy::LastMatch).categorize_working_set(&mut set);

        assert_eq!(set.expenses[0].category, "Food");
        assert_eq!(set.income[0].category, "Food");
    }
}
