// 🗄️ Table Store - named batches in SQLite
//
// Each batch = two row tables (expenses, income) + one row in `batch_index`.
// Table names come from a random batch id, never from the user's batch name,
// and the pair is always written / dropped inside one SQLite transaction.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Transaction as SqlTransaction};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::error::{FinboardError, FinboardResult};
use crate::transaction::{Transaction, TransactionType, WorkingSet};

/// Index entry describing one saved batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchInfo {
    pub name: String,
    pub batch_id: String,
    pub expenses_table: String,
    pub income_table: String,
    pub expense_count: usize,
    pub income_count: usize,
    /// SHA-256 over the stored rows
    pub content_digest: String,
    pub saved_at: DateTime<Utc>,
}

pub struct TableStore {
    path: PathBuf,
}

impl TableStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        TableStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fresh connection per operation
    fn connect(&self) -> FinboardResult<Connection> {
        let conn = Connection::open(&self.path).map_err(|e| {
            FinboardError::Store(format!("Failed to open {}: {}", self.path.display(), e))
        })?;
        setup_database(&conn)?;
        Ok(conn)
    }

    // ========================================================================
    // LIST
    // ========================================================================

    /// Saved batch names, sorted
    pub fn list_batches(&self) -> FinboardResult<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT name FROM batch_index ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    pub fn list_batch_info(&self) -> FinboardResult<Vec<BatchInfo>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY name", SELECT_INDEX))?;
        let infos = stmt
            .query_map([], map_batch_info)?
            .collect::<Result<Vec<_>, _>>()?;
        infos.into_iter().map(check_batch_info).collect()
    }

    pub fn batch_info(&self, name: &str) -> FinboardResult<BatchInfo> {
        let conn = self.connect()?;
        lookup_batch(&conn, name)?.ok_or_else(|| FinboardError::not_found("batch", name))
    }

    // ========================================================================
    // SAVE (overwrite)
    // ========================================================================

    /// Store both halves under `name`, replacing any batch of the same name
    pub fn save_batch(
        &self,
        name: &str,
        expenses: &[Transaction],
        income: &[Transaction],
    ) -> FinboardResult<BatchInfo> {
        if name.trim().is_empty() {
            return Err(FinboardError::Validation("Batch name cannot be empty".into()));
        }

        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        if let Some(previous) = lookup_batch(&tx, name)? {
            drop_tables(&tx, &previous)?;
            debug!("Replacing batch {} ({})", name, previous.batch_id);
        }

        let batch_id = uuid::Uuid::new_v4().simple().to_string();
        let info = BatchInfo {
            name: name.to_string(),
            expenses_table: format!("batch_{}_expenses", batch_id),
            income_table: format!("batch_{}_income", batch_id),
            batch_id,
            expense_count: expenses.len(),
            income_count: income.len(),
            content_digest: content_digest(expenses, income)?,
            saved_at: Utc::now(),
        };

        create_row_table(&tx, &info.expenses_table)?;
        create_row_table(&tx, &info.income_table)?;
        insert_rows(&tx, &info.expenses_table, expenses)?;
        insert_rows(&tx, &info.income_table, income)?;

        tx.execute(
            "INSERT OR REPLACE INTO batch_index (
                name, batch_id, expenses_table, income_table,
                expense_count, income_count, content_digest, saved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                info.name,
                info.batch_id,
                info.expenses_table,
                info.income_table,
                info.expense_count as i64,
                info.income_count as i64,
                info.content_digest,
                info.saved_at.to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        info!(
            "Saved batch {}: {} expenses, {} income",
            name, info.expense_count, info.income_count
        );
        Ok(info)
    }

    pub fn save_working_set(&self, name: &str, set: &WorkingSet) -> FinboardResult<BatchInfo> {
        self.save_batch(name, &set.expenses, &set.income)
    }

    // ========================================================================
    // LOAD
    // ========================================================================

    /// Both halves of a batch, in stored order
    pub fn load_batch(&self, name: &str) -> FinboardResult<WorkingSet> {
        let conn = self.connect()?;
        let info = lookup_batch(&conn, name)?.ok_or_else(|| FinboardError::not_found("batch", name))?;

        for table in [&info.expenses_table, &info.income_table] {
            if !table_exists(&conn, table)? {
                return Err(FinboardError::not_found("table", table.as_str()));
            }
        }

        let expenses = read_rows(&conn, &info.expenses_table)?;
        let income = read_rows(&conn, &info.income_table)?;
        debug!("Loaded batch {} ({} rows)", name, expenses.len() + income.len());
        Ok(WorkingSet::new(expenses, income))
    }

    // ========================================================================
    // DELETE
    // ========================================================================

    /// Drop a batch; Ok(false) when nothing was stored under that name
    pub fn delete_batch(&self, name: &str) -> FinboardResult<bool> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let existed = match lookup_batch(&tx, name)? {
            Some(info) => {
                drop_tables(&tx, &info)?;
                tx.execute("DELETE FROM batch_index WHERE name = ?1", params![name])?;
                true
            }
            None => false,
        };

        tx.commit()?;
        if existed {
            info!("Deleted batch {}", name);
        } else {
            debug!("Delete of unknown batch {} ignored", name);
        }
        Ok(existed)
    }

    // ========================================================================
    // INTEGRITY
    // ========================================================================

    /// Recompute the content digest and compare with the index
    pub fn verify_batch(&self, name: &str) -> FinboardResult<bool> {
        let info = self.batch_info(name)?;
        let set = self.load_batch(name)?;
        Ok(content_digest(&set.expenses, &set.income)? == info.content_digest)
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> FinboardResult<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS batch_index (
            name TEXT PRIMARY KEY,
            batch_id TEXT UNIQUE NOT NULL,
            expenses_table TEXT NOT NULL,
            income_table TEXT NOT NULL,
            expense_count INTEGER NOT NULL,
            income_count INTEGER NOT NULL,
            content_digest TEXT NOT NULL,
            saved_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

fn create_row_table(tx: &SqlTransaction, table: &str) -> FinboardResult<()> {
    tx.execute(
        &format!(
            "CREATE TABLE \"{}\" (
                row_id INTEGER PRIMARY KEY,
                date TEXT NOT NULL,
                description TEXT NOT NULL,
                amount REAL NOT NULL,
                kind TEXT NOT NULL,
                category TEXT NOT NULL,
                note TEXT NOT NULL DEFAULT '',
                made_by TEXT NOT NULL DEFAULT '',
                extra TEXT
            )",
            table
        ),
        [],
    )?;
    Ok(())
}

fn drop_tables(tx: &SqlTransaction, info: &BatchInfo) -> FinboardResult<()> {
    for table in [&info.expenses_table, &info.income_table] {
        tx.execute(&format!("DROP TABLE IF EXISTS \"{}\"", table), [])?;
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> FinboardResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

// ============================================================================
// INDEX ROWS
// ============================================================================

const SELECT_INDEX: &str = "SELECT name, batch_id, expenses_table, income_table,
        expense_count, income_count, content_digest, saved_at
 FROM batch_index";

fn map_batch_info(row: &rusqlite::Row) -> rusqlite::Result<BatchInfo> {
    let saved_at: String = row.get(7)?;
    let saved_at = DateTime::parse_from_rfc3339(&saved_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e)))?;
    let expense_count: i64 = row.get(4)?;
    let income_count: i64 = row.get(5)?;

    Ok(BatchInfo {
        name: row.get(0)?,
        batch_id: row.get(1)?,
        expenses_table: row.get(2)?,
        income_table: row.get(3)?,
        expense_count: expense_count.max(0) as usize,
        income_count: income_count.max(0) as usize,
        content_digest: row.get(6)?,
        saved_at,
    })
}

/// Table names are interpolated into SQL, so only accept what `save_batch` generates
fn is_generated_table_name(table: &str) -> bool {
    table.starts_with("batch_")
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_batch_info(info: BatchInfo) -> FinboardResult<BatchInfo> {
    if is_generated_table_name(&info.expenses_table) && is_generated_table_name(&info.income_table) {
        Ok(info)
    } else {
        Err(FinboardError::Store(format!(
            "Corrupt batch index entry for {}",
            info.name
        )))
    }
}

fn lookup_batch(conn: &Connection, name: &str) -> FinboardResult<Option<BatchInfo>> {
    let info = conn
        .query_row(
            &format!("{} WHERE name = ?1", SELECT_INDEX),
            params![name],
            map_batch_info,
        )
        .optional()?;
    info.map(check_batch_info).transpose()
}

// ============================================================================
// ROWS
// ============================================================================

fn insert_rows(tx: &SqlTransaction, table: &str, rows: &[Transaction]) -> FinboardResult<()> {
    let mut stmt = tx.prepare(&format!(
        "INSERT INTO \"{}\" (date, description, amount, kind, category, note, made_by, extra)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        table
    ))?;

    for row in rows {
        let extra_json = if row.extra.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&row.extra)?)
        };

        stmt.execute(params![
            row.date.format("%Y-%m-%d").to_string(),
            row.description,
            row.amount,
            row.kind.as_str(),
            row.category,
            row.note,
            row.made_by,
            extra_json,
        ])?;
    }

    Ok(())
}

/// Stored dates are `%Y-%m-%d`; full timestamps are accepted as well
pub fn parse_stored_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

fn read_rows(conn: &Connection, table: &str) -> FinboardResult<Vec<Transaction>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT date, description, amount, kind, category, note, made_by, extra
         FROM \"{}\"
         ORDER BY row_id",
        table
    ))?;

    let raw_rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, Option<String>>(7)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    raw_rows
        .into_iter()
        .map(|(date, description, amount, kind, category, note, made_by, extra)| {
            let date = parse_stored_date(&date).ok_or_else(|| {
                FinboardError::Store(format!("Invalid date {:?} in {}", date, table))
            })?;
            let kind: TransactionType = kind
                .parse()
                .map_err(|e| FinboardError::Store(format!("{} in {}", e, table)))?;
            let extra: Map<String, Value> = match extra {
                Some(json) => serde_json::from_str(&json)?,
                None => Map::new(),
            };

            Ok(Transaction {
                date,
                description,
                amount,
                kind,
                category,
                note,
                made_by,
                extra,
            })
        })
        .collect()
}

/// SHA-256 over the JSON form of both halves
pub fn content_digest(expenses: &[Transaction], income: &[Transaction]) -> FinboardResult<String> {
    let mut hasher = Sha256::new();
    for (label, rows) in [("expenses", expenses), ("income", income)] {
        hasher.update(label.as_bytes());
        for row in rows {
            hasher.update(serde_json::to_vec(row)?);
            hasher.update(b"\n");
        }
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Helper to create test rows with the fields the dashboard fills
    fn create_test_transaction(
        date: &str,
        description: &str,
        amount: f64,
        kind: TransactionType,
        category: &str,
    ) -> Transaction {
        Transaction::new(
            NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            description,
            amount,
            kind,
        )
        .with_category(category)
    }

    fn sample() -> (Vec<Transaction>, Vec<Transaction>) {
        let expenses = vec![
            create_test_transaction("2024-03-01", "Lidl", 45.99, TransactionType::Expense, "Food")
                .with_made_by("Gabi")
                .with_note("weekly shop")
                .with_extra("Currency", "BGN"),
            create_test_transaction("2024-03-02", "Shell", 80.0, TransactionType::Expense, "Transport"),
        ];
        let income = vec![create_test_transaction(
            "2024-03-05",
            "Salary",
            2000.0,
            TransactionType::Income,
            "Uncategorized",
        )];
        (expenses, income)
    }

    fn temp_store() -> (TempDir, TableStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = TableStore::new(temp_dir.path().join("transactions.db"));
        (temp_dir, store)
    }

    #[test]
    fn test_save_load_round_trip() {
        let (_dir, store) = temp_store();
        let (expenses, income) = sample();

        let info = store.save_batch("march", &expenses, &income).unwrap();
        assert_eq!(info.expense_count, 2);
        assert_eq!(info.income_count, 1);
        assert_eq!(info.content_digest.len(), 64);

        let loaded = store.load_batch("march").unwrap();
        assert_eq!(loaded.expenses, expenses);
        assert_eq!(loaded.income, income);
    }

    #[test]
    fn test_save_overwrites() {
        let (_dir, store) = temp_store();
        let (expenses, income) = sample();

        let first = store.save_batch("march", &expenses, &income).unwrap();
        let second = store.save_batch("march", &expenses[..1], &[]).unwrap();
        assert_ne!(first.batch_id, second.batch_id);

        let loaded = store.load_batch("march").unwrap();
        assert_eq!(loaded.expenses.len(), 1);
        assert!(loaded.income.is_empty());
        assert_eq!(store.list_batches().unwrap(), vec!["march".to_string()]);

        // old tables are gone
        let conn = Connection::open(store.path()).unwrap();
        assert!(!table_exists(&conn, &first.expenses_table).unwrap());
        assert!(!table_exists(&conn, &first.income_table).unwrap());
    }

    #[test]
    fn test_delete_then_load_is_not_found() {
        let (_dir, store) = temp_store();
        let (expenses, income) = sample();
        store.save_batch("march", &expenses, &income).unwrap();

        assert!(store.delete_batch("march").unwrap());
        assert!(store.load_batch("march").unwrap_err().is_not_found());
        // idempotent
        assert!(!store.delete_batch("march").unwrap());
        assert!(!store.delete_batch("never-saved").unwrap());
    }

    #[test]
    fn test_list_batches_exact_set() {
        let (_dir, store) = temp_store();
        let (expenses, income) = sample();

        assert!(store.list_batches().unwrap().is_empty());
        store.save_batch("b", &expenses, &income).unwrap();
        store.save_batch("a", &expenses, &income).unwrap();

        assert_eq!(store.list_batches().unwrap(), vec!["a".to_string(), "b".to_string()]);
        let infos = store.list_batch_info().unwrap();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].name, "a");
    }

    #[test]
    fn test_names_with_underscores_and_expenses() {
        let (_dir, store) = temp_store();
        let (expenses, income) = sample();

        store.save_batch("2024_03_expenses", &expenses, &income).unwrap();
        store.save_batch("income_expenses report", &[], &income).unwrap();

        assert_eq!(
            store.list_batches().unwrap(),
            vec!["2024_03_expenses".to_string(), "income_expenses report".to_string()]
        );
        assert_eq!(store.load_batch("2024_03_expenses").unwrap().expenses, expenses);
    }

    #[test]
    fn test_load_unknown_batch() {
        let (_dir, store) = temp_store();
        let err = store.load_batch("nope").unwrap_err();
        assert!(matches!(err, FinboardError::NotFound { entity: "batch", .. }));
    }

    #[test]
    fn test_missing_half_is_not_found() {
        let (_dir, store) = temp_store();
        let (expenses, income) = sample();
        let info = store.save_batch("march", &expenses, &income).unwrap();

        let conn = Connection::open(store.path()).unwrap();
        conn.execute(&format!("DROP TABLE \"{}\"", info.income_table), []).unwrap();
        drop(conn);

        let err = store.load_batch("march").unwrap_err();
        assert!(matches!(err, FinboardError::NotFound { entity: "table", .. }));
    }

    #[test]
    fn test_blank_name_rejected() {
        let (_dir, store) = temp_store();
        let err = store.save_batch("  ", &[], &[]).unwrap_err();
        assert!(matches!(err, FinboardError::Validation(_)));
    }

    #[test]
    fn test_verify_batch_detects_tampering() {
        let (_dir, store) = temp_store();
        let (expenses, income) = sample();
        let info = store.save_batch("march", &expenses, &income).unwrap();
        assert!(store.verify_batch("march").unwrap());

        let conn = Connection::open(store.path()).unwrap();
        conn.execute(
            &format!("UPDATE \"{}\" SET amount = 1.0 WHERE row_id = 1", info.expenses_table),
            [],
        )
        .unwrap();
        drop(conn);

        assert!(!store.verify_batch("march").unwrap());
    }

    #[test]
    fn test_parse_stored_date_accepts_timestamps() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(parse_stored_date("2024-01-05"), Some(expected));
        assert_eq!(parse_stored_date("2024-01-05 10:22:00"), Some(expected));
        assert_eq!(parse_stored_date("05/01/2024"), None);
    }

    #[test]
    fn test_content_digest_is_order_sensitive() {
        let (expenses, income) = sample();
        let reversed: Vec<Transaction> = expenses.iter().rev().cloned().collect();

        assert_eq!(
            content_digest(&expenses, &income).unwrap(),
            content_digest(&expenses, &income).unwrap()
        );
        assert_ne!(
            content_digest(&expenses, &income).unwrap(),
            content_digest(&reversed, &income).unwrap()
        );
    }
}
