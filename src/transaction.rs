// 📄 Transaction model
// Canonical row schema shared by the normalizer, categorizer, store and views

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{FinboardError, FinboardResult};

/// Category every row starts in; never matched against
pub const UNCATEGORIZED: &str = "Uncategorized";

// ============================================================================
// TRANSACTION TYPE
// ============================================================================

/// Direction of a transaction. Amount is always a magnitude, this carries the sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// Money going out
    Expense,

    /// Money coming in
    Income,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Expense => "Expense",
            TransactionType::Income => "Income",
        }
    }

    /// Direction implied by a signed amount
    pub fn from_sign(negative: bool) -> Self {
        if negative {
            TransactionType::Expense
        } else {
            TransactionType::Income
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = FinboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "expense" => Ok(TransactionType::Expense),
            "income" => Ok(TransactionType::Income),
            other => Err(FinboardError::Validation(format!(
                "Unknown transaction type: {}",
                other
            ))),
        }
    }
}

// ============================================================================
// TRANSACTION ROW
// ============================================================================

/// One canonical row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "Date")]
    pub date: NaiveDate,

    #[serde(rename = "Description")]
    pub description: String,

    /// Positive magnitude
    #[serde(rename = "Amount")]
    pub amount: f64,

    #[serde(rename = "Type")]
    pub kind: TransactionType,

    #[serde(rename = "Category")]
    pub category: String,

    #[serde(rename = "Note", default)]
    pub note: String,

    /// Who made the payment
    #[serde(rename = "Made By", default)]
    pub made_by: String,

    /// Remaining source columns, kept verbatim in upload column order
    #[serde(rename = "Extra", default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl Transaction {
    /// New uncategorized row; a negative amount is folded into its magnitude
    pub fn new(date: NaiveDate, description: impl Into<String>, amount: f64, kind: TransactionType) -> Self {
        Transaction {
            date,
            description: description.into(),
            amount: amount.abs(),
            kind,
            category: UNCATEGORIZED.to_string(),
            note: String::new(),
            made_by: String::new(),
            extra: Map::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn with_made_by(mut self, made_by: impl Into<String>) -> Self {
        self.made_by = made_by.into();
        self
    }

    pub fn with_extra(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(column.into(), Value::String(value.into()));
        self
    }

    /// Text of a kept source column
    pub fn extra_value(&self, column: &str) -> Option<&str> {
        self.extra.get(column).and_then(Value::as_str)
    }

    pub fn is_expense(&self) -> bool {
        self.kind == TransactionType::Expense
    }
}

// ============================================================================
// WORKING SET
// ============================================================================

/// Which half of a working set a row lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Half {
    Expenses,
    Income,
}

impl Half {
    pub fn as_str(&self) -> &'static str {
        match self {
            Half::Expenses => "expenses",
            Half::Income => "income",
        }
    }
}

/// In-memory, editable copy of a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkingSet {
    pub expenses: Vec<Transaction>,
    pub income: Vec<Transaction>,
}

impl WorkingSet {
    pub fn new(expenses: Vec<Transaction>, income: Vec<Transaction>) -> Self {
        WorkingSet { expenses, income }
    }

    /// Split a normalized table by Type, keeping row order within each half
    pub fn from_transactions(rows: Vec<Transaction>) -> Self {
        let (expenses, income) = rows.into_iter().partition(Transaction::is_expense);
        WorkingSet { expenses, income }
    }

    pub fn len(&self) -> usize {
        self.expenses.len() + self.income.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn half(&self, half: Half) -> &[Transaction] {
        match half {
            Half::Expenses => &self.expenses,
            Half::Income => &self.income,
        }
    }

    pub fn half_mut(&mut self, half: Half) -> &mut Vec<Transaction> {
        match half {
            Half::Expenses => &mut self.expenses,
            Half::Income => &mut self.income,
        }
    }

    pub fn row_mut(&mut self, half: Half, index: usize) -> FinboardResult<&mut Transaction> {
        self.half_mut(half)
            .get_mut(index)
            .ok_or_else(|| FinboardError::not_found("row", format!("{} #{}", half.as_str(), index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_amount_is_stored_as_magnitude() {
        let tx = Transaction::new(date(2024, 3, 1), "Lidl", -12.5, TransactionType::Expense);
        assert_eq!(tx.amount, 12.5);
        assert_eq!(tx.category, UNCATEGORIZED);
    }

    #[test]
    fn test_extra_keeps_insertion_order_through_json() {
        let tx = Transaction::new(date(2024, 3, 1), "Lidl", 12.5, TransactionType::Expense)
            .with_extra("Product", "Current")
            .with_extra("Currency", "BGN")
            .with_extra("Balance", "100");

        let json = serde_json::to_string(&tx).unwrap();
        let back: Transaction = serde_json::from_str(&json).unwrap();

        let columns: Vec<&str> = back.extra.keys().map(String::as_str).collect();
        assert_eq!(columns, vec!["Product", "Currency", "Balance"]);
        assert_eq!(back.extra_value("Currency"), Some("BGN"));
        assert_eq!(back.extra_value("Missing"), None);
    }

    #[test]
    fn test_type_parsing() {
        assert_eq!("Expense".parse::<TransactionType>().unwrap(), TransactionType::Expense);
        assert_eq!(" income ".parse::<TransactionType>().unwrap(), TransactionType::Income);
        assert!("TRANSFER".parse::<TransactionType>().is_err());
        assert_eq!(TransactionType::from_sign(true), TransactionType::Expense);
        assert_eq!(TransactionType::from_sign(false), TransactionType::Income);
    }

    #[test]
    fn test_working_set_split_keeps_order() {
        let rows = vec![
            Transaction::new(date(2024, 3, 1), "a", 1.0, TransactionType::Expense),
            Transaction::new(date(2024, 3, 2), "b", 2.0, TransactionType::Income),
            Transaction::new(date(2024, 3, 3), "c", 3.0, TransactionType::Expense),
        ];

        let set = WorkingSet::from_transactions(rows);
        let names: Vec<&str> = set.expenses.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(set.income.len(), 1);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_row_mut_out_of_range() {
        let mut set = WorkingSet::default();
        let err = set.row_mut(Half::Expenses, 3).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_serde_column_names() {
        let tx = Transaction::new(date(2024, 1, 5), "Coffee", 3.2, TransactionType::Expense)
            .with_made_by("Gabi");
        let json = serde_json::to_value(&tx).unwrap();

        assert_eq!(json["Date"], "2024-01-05");
        assert_eq!(json["Made By"], "Gabi");
        assert_eq!(json["Type"], "Expense");
        assert!(json.get("Extra").is_none());
    }
}
