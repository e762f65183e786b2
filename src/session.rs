// 🧭 Application state
// Everything a dashboard session needs, passed explicitly instead of living in globals

use chrono::NaiveDate;
use log::{info, warn};

use crate::categories::CategoryStore;
use crate::config::{AppPaths, Settings};
use crate::db::{BatchInfo, TableStore};
use crate::error::{FinboardError, FinboardResult};
use crate::parser::{Normalizer, Upload};
use crate::rules::Categorizer;
use crate::summary::BatchSummary;
use crate::transaction::{Half, Transaction, TransactionType, WorkingSet};

/// Which view an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    /// Rows from the last successful upload
    Upload,
    /// Rows of the batch opened from the store
    Stored,
}

/// A batch opened from the store
#[derive(Debug, Clone)]
pub struct StoredView {
    pub name: String,
    pub working: WorkingSet,
}

/// Manually entered expense
#[derive(Debug, Clone)]
pub struct ManualEntry {
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub category: String,
}

pub struct AppState {
    pub settings: Settings,
    pub categories: CategoryStore,
    store: TableStore,
    upload_view: Option<WorkingSet>,
    stored_view: Option<StoredView>,
}

impl AppState {
    /// Load settings + categories from the data directory
    pub fn open(paths: &AppPaths) -> FinboardResult<Self> {
        paths.ensure_directories()?;
        let settings = Settings::load(paths)?;
        let categories = CategoryStore::load(paths.categories_file())?;
        let store = TableStore::new(paths.database_file());
        info!("Session opened in {}", paths.base_dir().display());
        Ok(AppState::from_parts(settings, categories, store))
    }

    pub fn from_parts(settings: Settings, categories: CategoryStore, store: TableStore) -> Self {
        AppState {
            settings,
            categories,
            store,
            upload_view: None,
            stored_view: None,
        }
    }

    pub fn store(&self) -> &TableStore {
        &self.store
    }

    fn categorizer(&self) -> Categorizer {
        Categorizer::new(&self.categories, self.settings.match_policy)
    }

    // ========================================================================
    // VIEWS
    // ========================================================================

    pub fn view(&self, kind: ViewKind) -> Option<&WorkingSet> {
        match kind {
            ViewKind::Upload => self.upload_view.as_ref(),
            ViewKind::Stored => self.stored_view.as_ref().map(|v| &v.working),
        }
    }

    fn view_mut(&mut self, kind: ViewKind) -> FinboardResult<&mut WorkingSet> {
        let view = match kind {
            ViewKind::Upload => self.upload_view.as_mut(),
            ViewKind::Stored => self.stored_view.as_mut().map(|v| &mut v.working),
        };
        view.ok_or_else(|| FinboardError::not_found("view", view_name(kind)))
    }

    /// Name of the opened batch, if any
    pub fn stored_name(&self) -> Option<&str> {
        self.stored_view.as_ref().map(|v| v.name.as_str())
    }

    pub fn summary(&self, kind: ViewKind) -> Option<BatchSummary> {
        self.view(kind).map(BatchSummary::from_working_set)
    }

    // ========================================================================
    // PIPELINE
    // ========================================================================

    /// Normalize + categorize uploads into the upload view.
    /// On failure the previous upload view is left as it was.
    pub fn ingest(&mut self, uploads: &[Upload]) -> FinboardResult<&WorkingSet> {
        let normalizer = Normalizer::from_settings(&self.settings);
        let mut rows = normalizer.normalize(uploads)?;
        self.categorizer().categorize(&mut rows);

        let working = WorkingSet::from_transactions(rows);
        info!(
            "Ingested {} uploads: {} expenses, {} income",
            uploads.len(),
            working.expenses.len(),
            working.income.len()
        );
        Ok(&*self.upload_view.insert(working))
    }

    /// Re-run the categorizer over a view (after category edits)
    pub fn recategorize(&mut self, kind: ViewKind) -> FinboardResult<()> {
        let categorizer = self.categorizer();
        categorizer.categorize_working_set(self.view_mut(kind)?);
        Ok(())
    }

    // ========================================================================
    // STORE
    // ========================================================================

    pub fn list_batches(&self) -> FinboardResult<Vec<String>> {
        self.store.list_batches()
    }

    pub fn open_batch(&mut self, name: &str) -> FinboardResult<&WorkingSet> {
        let working = self.store.load_batch(name)?;
        let view = self.stored_view.insert(StoredView {
            name: name.to_string(),
            working,
        });
        Ok(&view.working)
    }

    pub fn save_view(&self, kind: ViewKind, name: &str) -> FinboardResult<BatchInfo> {
        let working = self
            .view(kind)
            .ok_or_else(|| FinboardError::not_found("view", view_name(kind)))?;
        self.store.save_working_set(name, working)
    }

    /// Delete from the store; the stored view is dropped when it shows that batch
    pub fn delete_batch(&mut self, name: &str) -> FinboardResult<bool> {
        let existed = self.store.delete_batch(name)?;
        if self.stored_name() == Some(name) {
            self.stored_view = None;
        }
        Ok(existed)
    }

    // ========================================================================
    // CATEGORIES
    // ========================================================================

    pub fn add_category(&mut self, name: &str) -> FinboardResult<()> {
        self.categories.add_category(name)
    }

    pub fn add_keyword(&mut self, category: &str, keyword: &str) -> FinboardResult<bool> {
        self.categories.add_keyword(category, keyword)
    }

    // ========================================================================
    // EDITS
    // ========================================================================

    /// Append a hand-entered expense to a view
    pub fn add_manual_expense(&mut self, kind: ViewKind, entry: ManualEntry) -> FinboardResult<()> {
        self.ensure_category(&entry.category)?;
        let description = entry.description.trim();
        if description.is_empty() {
            return Err(FinboardError::Validation("Description cannot be empty".into()));
        }
        if !entry.amount.is_finite() {
            return Err(FinboardError::Validation(format!("Invalid amount {}", entry.amount)));
        }

        let tx = Transaction::new(entry.date, description, entry.amount, TransactionType::Expense)
            .with_category(entry.category);
        self.view_mut(kind)?.expenses.push(tx);
        Ok(())
    }

    pub fn set_category(&mut self, kind: ViewKind, half: Half, index: usize, category: &str) -> FinboardResult<()> {
        self.ensure_category(category)?;
        self.view_mut(kind)?.row_mut(half, index)?.category = category.to_string();
        Ok(())
    }

    pub fn set_note(&mut self, kind: ViewKind, half: Half, index: usize, note: &str) -> FinboardResult<()> {
        self.view_mut(kind)?.row_mut(half, index)?.note = note.to_string();
        Ok(())
    }

    pub fn set_made_by(&mut self, kind: ViewKind, half: Half, index: usize, payer: &str) -> FinboardResult<()> {
        if !self.settings.accepts_payer(payer) {
            warn!("Rejected payer {:?}", payer);
            return Err(FinboardError::Validation(format!("Unknown payer {}", payer)));
        }
        self.view_mut(kind)?.row_mut(half, index)?.made_by = payer.to_string();
        Ok(())
    }

    fn ensure_category(&self, category: &str) -> FinboardResult<()> {
        if self.categories.contains(category) {
            Ok(())
        } else {
            Err(FinboardError::not_found("category", category))
        }
    }
}

fn view_name(kind: ViewKind) -> &'static str {
    match kind {
        ViewKind::Upload => "upload",
        ViewKind::Stored => "stored",
    }
}
