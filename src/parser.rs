// 🏗️ Transaction Normalizer
// Uploaded statement exports → canonical rows (Date, Description, Amount, Type, ...)

use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info};
use serde_json::Value;
use std::path::Path;

use crate::config::Settings;
use crate::error::{FinboardError, FinboardResult};
use crate::transaction::{Transaction, TransactionType};

// ============================================================================
// COLUMN NAMES
// ============================================================================

pub const COL_STARTED_DATE: &str = "Started Date";
pub const COL_AMOUNT: &str = "Amount";
pub const COL_DESCRIPTION: &str = "Description";
pub const COL_TYPE: &str = "Type";
pub const COL_NOTE: &str = "Note";
pub const COL_MADE_BY: &str = "Made By";

/// Columns that map onto Transaction fields; everything else goes to `extra`
const CANONICAL_COLUMNS: &[&str] = &[
    COL_AMOUNT,
    COL_DESCRIPTION,
    COL_TYPE,
    COL_NOTE,
    COL_MADE_BY,
    "Date",
    "Category",
];

/// Canonical columns recomputed on ingest; an uploaded value is dropped
const DERIVED_COLUMNS: &[&str] = &["Date", "Category"];

// ============================================================================
// UPLOAD
// ============================================================================

/// One uploaded file: a display name plus raw bytes
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub content: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Upload {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn from_path(path: &Path) -> FinboardResult<Self> {
        let content = std::fs::read(path)
            .map_err(|e| FinboardError::Io(format!("Failed to open file {}: {}", path.display(), e)))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown.csv")
            .to_string();
        Ok(Upload { name, content })
    }
}

// ============================================================================
// AMOUNTS
// ============================================================================

/// Amount split into magnitude and direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignedAmount {
    pub magnitude: f64,
    pub negative: bool,
}

/// Parse "-1,234.56" style amounts: every grouping comma and minus sign is
/// stripped, and any minus anywhere (leading, trailing, doubled) marks an outflow
pub fn parse_amount(raw: &str) -> Result<SignedAmount, String> {
    let negative = raw.contains('-');
    let cleaned: String = raw.chars().filter(|c| *c != ',' && *c != '-').collect();
    let cleaned = cleaned.trim();
    let digits = cleaned.strip_prefix('+').unwrap_or(cleaned).trim();

    let value: f64 = digits
        .parse()
        .map_err(|_| format!("invalid Amount {:?}", raw))?;

    if !value.is_finite() || value < 0.0 {
        return Err(format!("invalid Amount {:?}", raw));
    }

    Ok(SignedAmount {
        magnitude: value,
        negative: negative && value != 0.0,
    })
}

/// Parse a date under a fixed format; date-only formats are accepted too
pub fn parse_started_date(raw: &str, format: &str) -> Result<NaiveDate, String> {
    let value = raw.trim();
    NaiveDateTime::parse_from_str(value, format)
        .map(|dt| dt.date())
        .or_else(|_| NaiveDate::parse_from_str(value, format))
        .map_err(|_| format!("invalid {} {:?} (expected format {})", COL_STARTED_DATE, raw, format))
}

// ============================================================================
// PARSER TRAIT
// ============================================================================

/// One export format
pub trait StatementParser: Send + Sync {
    /// Parse a whole upload; any bad row fails the upload
    fn parse(&self, upload: &Upload) -> FinboardResult<Vec<Transaction>>;

    /// Format name for logs
    fn name(&self) -> &str;

    /// Parser version (for provenance in logs)
    fn version(&self) -> &str {
        "1.0.0"
    }
}

/// Options shared by the CSV parser
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub date_format: String,
    pub expense_type_labels: Vec<String>,
    pub income_type_labels: Vec<String>,
}

impl ParseOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        ParseOptions {
            date_format: settings.date_format.clone(),
            expense_type_labels: settings.expense_type_labels.clone(),
            income_type_labels: settings.income_type_labels.clone(),
        }
    }

    /// Decide Type from the optional "Type" label, falling back to the sign
    pub fn classify_type(&self, label: Option<&str>, amount: SignedAmount) -> TransactionType {
        if let Some(label) = label.map(str::trim).filter(|l| !l.is_empty()) {
            if self.expense_type_labels.iter().any(|l| l.eq_ignore_ascii_case(label)) {
                return TransactionType::Expense;
            }
            if self.income_type_labels.iter().any(|l| l.eq_ignore_ascii_case(label)) {
                return TransactionType::Income;
            }
        }
        TransactionType::from_sign(amount.negative)
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions::from_settings(&Settings::default())
    }
}

// ============================================================================
// CSV PARSER ("Started Date" exports)
// ============================================================================

struct ColumnIndex {
    started_date: usize,
    amount: usize,
    description: usize,
    kind: Option<usize>,
    note: Option<usize>,
    made_by: Option<usize>,
}

impl ColumnIndex {
    fn resolve(headers: &StringRecord, source: &str) -> FinboardResult<Self> {
        let find = |name: &str| headers.iter().position(|h| h == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| FinboardError::parse(source, None, format!("missing column {}", name)))
        };

        Ok(ColumnIndex {
            started_date: require(COL_STARTED_DATE)?,
            amount: require(COL_AMOUNT)?,
            description: require(COL_DESCRIPTION)?,
            kind: find(COL_TYPE),
            note: find(COL_NOTE),
            made_by: find(COL_MADE_BY),
        })
    }
}

/// Delimited-text exports with a "Started Date" column
pub struct CsvStatementParser {
    options: ParseOptions,
    delimiter: u8,
}

impl CsvStatementParser {
    pub fn new(options: ParseOptions) -> Self {
        CsvStatementParser {
            options,
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn parse_record(
        &self,
        record: &StringRecord,
        headers: &StringRecord,
        columns: &ColumnIndex,
        source: &str,
        line: Option<usize>,
    ) -> FinboardResult<Transaction> {
        let field = |idx: usize| record.get(idx).unwrap_or("");

        let date = parse_started_date(field(columns.started_date), &self.options.date_format)
            .map_err(|reason| FinboardError::parse(source, line, reason))?;
        let amount = parse_amount(field(columns.amount))
            .map_err(|reason| FinboardError::parse(source, line, reason))?;
        let kind = self
            .options
            .classify_type(columns.kind.map(|idx| field(idx)), amount);

        let mut tx = Transaction::new(date, field(columns.description), amount.magnitude, kind);
        if let Some(idx) = columns.note {
            tx.note = field(idx).to_string();
        }
        if let Some(idx) = columns.made_by {
            tx.made_by = field(idx).to_string();
        }

        for (header, value) in headers.iter().zip(record.iter()) {
            if !CANONICAL_COLUMNS.contains(&header) {
                tx.extra.insert(header.to_string(), Value::String(value.to_string()));
            }
        }

        Ok(tx)
    }
}

impl Default for CsvStatementParser {
    fn default() -> Self {
        CsvStatementParser::new(ParseOptions::default())
    }
}

impl StatementParser for CsvStatementParser {
    fn parse(&self, upload: &Upload) -> FinboardResult<Vec<Transaction>> {
        let source = upload.name.as_str();

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .trim(Trim::Headers)
            .from_reader(upload.content.as_slice());

        let headers = reader
            .headers()
            .map_err(|e| FinboardError::parse(source, Some(1), e.to_string()))?
            .clone();
        let columns = ColumnIndex::resolve(&headers, source)?;
        for ignored in headers.iter().filter(|h| DERIVED_COLUMNS.contains(h)) {
            debug!("{}: ignoring uploaded {:?} column, it is derived on ingest", source, ignored);
        }

        let mut transactions = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| {
                let line = e.position().map(|p| p.line() as usize);
                FinboardError::parse(source, line, e.to_string())
            })?;
            let line = record.position().map(|p| p.line() as usize);

            transactions.push(self.parse_record(&record, &headers, &columns, source, line)?);
        }

        debug!("{} parsed {} rows from {}", self.name(), transactions.len(), source);
        Ok(transactions)
    }

    fn name(&self) -> &str {
        "started-date-csv"
    }
}

// ============================================================================
// NORMALIZER
// ============================================================================

/// Runs a parser over every upload and concatenates the results
pub struct Normalizer {
    parser: Box<dyn StatementParser>,
}

impl Normalizer {
    pub fn new(parser: Box<dyn StatementParser>) -> Self {
        Normalizer { parser }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Normalizer::new(Box::new(CsvStatementParser::new(ParseOptions::from_settings(settings))))
    }

    /// All-or-nothing: the first failing upload aborts the whole batch
    pub fn normalize(&self, uploads: &[Upload]) -> FinboardResult<Vec<Transaction>> {
        if uploads.is_empty() {
            return Err(FinboardError::NoUploads);
        }

        let mut combined = Vec::new();
        for upload in uploads {
            let rows = self.parser.parse(upload)?;
            info!(
                "Loaded {} transactions from {} ({} v{})",
                rows.len(),
                upload.name,
                self.parser.name(),
                self.parser.version()
            );
            combined.extend(rows);
        }

        Ok(combined)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer::new(Box::new(CsvStatementParser::default()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
