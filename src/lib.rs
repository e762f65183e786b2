// finboard - Core Library
// Exposes all modules for use in the CLI, the TUI, the API server, and tests

pub mod error;
pub mod file_io;
pub mod config;
pub mod transaction;
pub mod categories;  // Category Store
pub mod parser;      // Transaction Normalizer
pub mod rules;       // Categorizer
pub mod db;          // Table Store
pub mod summary;
pub mod session;

// Re-export commonly used types
pub use error::{FinboardError, FinboardResult};
pub use config::{AppPaths, Settings};
pub use transaction::{Half, Transaction, TransactionType, WorkingSet, UNCATEGORIZED};
pub use categories::{CategoryEntry, CategoryStore};
pub use parser::{
    parse_amount, CsvStatementParser, Normalizer, ParseOptions, SignedAmount, StatementParser,
    Upload,
};
pub use rules::{categorize_transactions, Categorizer, MatchPolicy};
pub use db::{BatchInfo, TableStore};
pub use summary::{format_amount, group_totals, BatchSummary, ExpenseSummary, GroupKey, GroupTotal};
pub use session::{AppState, ManualEntry, ViewKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
