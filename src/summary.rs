// 📊 Summary views
// Totals and group-by aggregations shown next to a working set

use serde::Serialize;
use std::collections::HashMap;

use crate::transaction::{Transaction, WorkingSet};

/// Column a grouping is keyed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    /// "Made By"
    Payer,
    Category,
    Description,
}

impl GroupKey {
    pub fn label(&self) -> &'static str {
        match self {
            GroupKey::Payer => "Made By",
            GroupKey::Category => "Category",
            GroupKey::Description => "Description",
        }
    }

    fn value<'a>(&self, tx: &'a Transaction) -> &'a str {
        match self {
            GroupKey::Payer => &tx.made_by,
            GroupKey::Category => &tx.category,
            GroupKey::Description => &tx.description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTotal {
    pub key: String,
    pub amount: f64,
    pub count: usize,
}

pub fn total(rows: &[Transaction]) -> f64 {
    rows.iter().map(|tx| tx.amount).sum()
}

/// One entry per distinct key, largest amount first (ties: key ascending)
pub fn group_totals(rows: &[Transaction], key: GroupKey) -> Vec<GroupTotal> {
    let mut groups: HashMap<&str, (f64, usize)> = HashMap::new();
    for tx in rows {
        let entry = groups.entry(key.value(tx)).or_insert((0.0, 0));
        entry.0 += tx.amount;
        entry.1 += 1;
    }

    let mut result: Vec<GroupTotal> = groups
        .into_iter()
        .map(|(k, (amount, count))| GroupTotal {
            key: k.to_string(),
            amount,
            count,
        })
        .collect();

    result.sort_by(|a, b| b.amount.total_cmp(&a.amount).then_with(|| a.key.cmp(&b.key)));
    result
}

/// Percentage of `part` in `total`, for pie/bar charts
pub fn share(part: f64, total: f64) -> f64 {
    if total == 0.0 {
        0.0
    } else {
        part / total * 100.0
    }
}

/// Expense side of the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseSummary {
    pub total: f64,
    pub count: usize,
    pub by_payer: Vec<GroupTotal>,
    pub by_category: Vec<GroupTotal>,
    pub by_description: Vec<GroupTotal>,
}

impl ExpenseSummary {
    pub fn from_rows(rows: &[Transaction]) -> Self {
        ExpenseSummary {
            total: total(rows),
            count: rows.len(),
            by_payer: group_totals(rows, GroupKey::Payer),
            by_category: group_totals(rows, GroupKey::Category),
            by_description: group_totals(rows, GroupKey::Description),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub expenses: ExpenseSummary,
    pub total_income: f64,
    pub income_count: usize,
}

impl BatchSummary {
    pub fn from_working_set(set: &WorkingSet) -> Self {
        BatchSummary {
            expenses: ExpenseSummary::from_rows(&set.expenses),
            total_income: total(&set.income),
            income_count: set.income.len(),
        }
    }

    pub fn net(&self) -> f64 {
        self.total_income - self.expenses.total
    }
}

/// "1,234.56 BG"
pub fn format_amount(value: f64, label: &str) -> String {
    let negative = value < 0.0;
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if negative && fixed != "0.00" { "-" } else { "" };
    if label.is_empty() {
        format!("{}{}.{}", sign, grouped, frac_part)
    } else {
        format!("{}{}.{} {}", sign, grouped, frac_part, label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionType;
    use chrono::NaiveDate;

    fn expense(description: &str, amount: f64, category: &str, made_by: &str) -> Transaction {
        Transaction::new(
            NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            description,
            amount,
            TransactionType::Expense,
        )
        .with_category(category)
        .with_made_by(made_by)
    }

    fn rows() -> Vec<Transaction> {
        vec![
            expense("Lidl", 40.0, "Food", "Gabi"),
            expense("Shell", 70.0, "Transport", "Blago"),
            expense("Lidl", 35.5, "Food", "Blago"),
            expense("Cinema", 20.0, "Fun", ""),
        ]
    }

    #[test]
    fn test_total() {
        assert_eq!(total(&rows()), 165.5);
        assert_eq!(total(&[]), 0.0);
    }

    #[test]
    fn test_group_key_labels_match_column_names() {
        assert_eq!(GroupKey::Payer.label(), "Made By");
        assert_eq!(GroupKey::Category.label(), "Category");
        assert_eq!(GroupKey::Description.label(), "Description");
    }

    #[test]
    fn test_group_by_category_sorted_desc() {
        let groups = group_totals(&rows(), GroupKey::Category);
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();

        assert_eq!(keys, vec!["Food", "Transport", "Fun"]);
        assert_eq!(groups[0].amount, 75.5);
        assert_eq!(groups[0].count, 2);
    }

    #[test]
    fn test_group_by_payer_keeps_blank_payer() {
        let groups = group_totals(&rows(), GroupKey::Payer);
        assert_eq!(groups[0].key, "Blago");
        assert_eq!(groups[0].amount, 105.5);
        assert!(groups.iter().any(|g| g.key.is_empty() && g.amount == 20.0));
    }

    #[test]
    fn test_ties_sorted_by_key() {
        let rows = vec![
            expense("b", 10.0, "X", ""),
            expense("a", 10.0, "X", ""),
        ];
        let keys: Vec<String> = group_totals(&rows, GroupKey::Description)
            .into_iter()
            .map(|g| g.key)
            .collect();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_batch_summary() {
        let income = vec![Transaction::new(
            NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
            "Salary",
            1000.0,
            TransactionType::Income,
        )];
        let summary = BatchSummary::from_working_set(&WorkingSet::new(rows(), income));

        assert_eq!(summary.expenses.count, 4);
        assert_eq!(summary.total_income, 1000.0);
        assert_eq!(summary.net(), 834.5);
        assert_eq!(summary.expenses.by_description[0].key, "Lidl");
    }

    #[test]
    fn test_share() {
        assert_eq!(share(25.0, 100.0), 25.0);
        assert_eq!(share(5.0, 0.0), 0.0);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1234.56, "BG"), "1,234.56 BG");
        assert_eq!(format_amount(0.0, "BG"), "0.00 BG");
        assert_eq!(format_amount(999.999, ""), "1,000.00");
        assert_eq!(format_amount(-1234567.0, "EUR"), "-1,234,567.00 EUR");
        assert_eq!(format_amount(12.0, ""), "12.00");
    }
}
