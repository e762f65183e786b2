// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::error;
use std::path::PathBuf;

use finboard::config::DATA_DIR_ENV;
use finboard::{
    format_amount, AppPaths, AppState, BatchSummary, GroupKey, GroupTotal, ManualEntry, Transaction, Upload,
    ViewKind, WorkingSet,
};

#[derive(Parser)]
#[command(
    name = "finboard",
    version,
    about = "Personal finance dashboard: import statements, categorize, save batches"
)]
struct Cli {
    /// Data directory (settings, categories, database)
    #[arg(long, global = true, env = DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize + categorize statement exports
    Import {
        /// CSV files, concatenated in the given order
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Save the result as a batch under this name
        #[arg(short, long)]
        save: Option<String>,
        /// Print every row
        #[arg(long)]
        show: bool,
    },

    /// Saved batch management
    #[command(subcommand)]
    Batches(BatchCommands),

    /// Expense/income totals for a saved batch
    Summary {
        name: String,
    },

    /// Category + keyword management
    #[command(subcommand)]
    Categories(CategoryCommands),

    /// Add a manual expense to a saved batch
    AddExpense {
        /// Batch to append to
        #[arg(short, long)]
        batch: String,
        /// Date (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,
        #[arg(long)]
        description: String,
        #[arg(short, long)]
        amount: f64,
        #[arg(short, long, default_value = finboard::UNCATEGORIZED)]
        category: String,
    },

    /// Show resolved paths and settings
    Config,

    /// Launch the interactive TUI
    Ui {
        /// Saved batch to open
        batch: Option<String>,
        /// Or: CSV files to import and browse
        #[arg(long, conflicts_with = "batch")]
        upload: Vec<PathBuf>,
    },
}

#[derive(Subcommand)]
enum BatchCommands {
    /// List saved batches
    List,
    /// Print the rows of a batch
    Show { name: String },
    /// Delete a batch (no error when absent)
    Delete { name: String },
    /// Check stored rows against the saved digest
    Verify { name: String },
}

#[derive(Subcommand)]
enum CategoryCommands {
    /// List categories and their keywords
    List,
    /// Create an empty category
    Add { name: String },
    /// Attach a keyword to a category
    Keyword { category: String, keyword: String },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run(Cli::parse()) {
        error!("{:#}", err);
        eprintln!("❌ {:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let paths = match cli.data_dir {
        Some(dir) => AppPaths::with_base_dir(dir),
        None => AppPaths::new().context("Failed to resolve data directory")?,
    };
    let mut state = AppState::open(&paths).context("Failed to open session")?;

    match cli.command {
        Some(Commands::Import { files, save, show }) => run_import(&mut state, &files, save, show),
        Some(Commands::Batches(cmd)) => run_batches(&mut state, cmd),
        Some(Commands::Summary { name }) => {
            state.open_batch(&name)?;
            let summary = state
                .summary(ViewKind::Stored)
                .context("Batch view missing after open")?;
            print_summary(&summary, &state.settings.currency_label);
            Ok(())
        }
        Some(Commands::Categories(cmd)) => run_categories(&mut state, cmd),
        Some(Commands::AddExpense {
            batch,
            date,
            description,
            amount,
            category,
        }) => {
            state.open_batch(&batch)?;
            state.add_manual_expense(
                ViewKind::Stored,
                ManualEntry {
                    date,
                    description,
                    amount,
                    category,
                },
            )?;
            let info = state.save_view(ViewKind::Stored, &batch)?;
            println!("✓ Added expense, {} now has {} expenses", batch, info.expense_count);
            Ok(())
        }
        Some(Commands::Config) => {
            println!("📁 Data directory: {}", paths.base_dir().display());
            println!("   Settings:   {}", paths.settings_file().display());
            println!("   Categories: {}", paths.categories_file().display());
            println!("   Database:   {}", paths.database_file().display());
            println!("\n{}", serde_json::to_string_pretty(&state.settings)?);
            Ok(())
        }
        Some(Commands::Ui { batch, upload }) => run_ui_mode(&mut state, batch, upload),
        None => run_ui_mode(&mut state, None, Vec::new()),
    }
}

fn read_uploads(files: &[PathBuf]) -> Result<Vec<Upload>> {
    files
        .iter()
        .map(|path| Upload::from_path(path).with_context(|| format!("Failed to read {}", path.display())))
        .collect()
}

fn run_import(state: &mut AppState, files: &[PathBuf], save: Option<String>, show: bool) -> Result<()> {
    println!("📂 Loading {} file(s)...", files.len());
    let uploads = read_uploads(files)?;
    let working = state.ingest(&uploads).context("Error loading file")?;
    println!(
        "✓ Loaded {} transactions ({} expenses, {} income)",
        working.len(),
        working.expenses.len(),
        working.income.len()
    );

    if show {
        print_working_set(working);
    }

    if let Some(summary) = state.summary(ViewKind::Upload) {
        print_summary(&summary, &state.settings.currency_label);
    }

    if let Some(name) = save {
        let info = state.save_view(ViewKind::Upload, &name)?;
        println!("\n💾 Data saved to database as {} ({} + {} rows)", info.name, info.expense_count, info.income_count);
    }

    Ok(())
}

fn run_batches(state: &mut AppState, cmd: BatchCommands) -> Result<()> {
    match cmd {
        BatchCommands::List => {
            let infos = state.store().list_batch_info()?;
            if infos.is_empty() {
                println!("No saved batches");
            }
            for info in infos {
                println!(
                    "{:<30} {:>5} expenses {:>5} income   saved {}",
                    info.name,
                    info.expense_count,
                    info.income_count,
                    info.saved_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        BatchCommands::Show { name } => {
            let working = state.open_batch(&name)?;
            print_working_set(working);
        }
        BatchCommands::Delete { name } => {
            if state.delete_batch(&name)? {
                println!("✓ Batch {} deleted from database", name);
            } else {
                println!("Batch {} did not exist", name);
            }
        }
        BatchCommands::Verify { name } => {
            if state.store().verify_batch(&name)? {
                println!("✓ Batch {} matches its digest", name);
            } else {
                anyhow::bail!("Batch {} does not match its saved digest", name);
            }
        }
    }
    Ok(())
}

fn run_categories(state: &mut AppState, cmd: CategoryCommands) -> Result<()> {
    match cmd {
        CategoryCommands::List => {
            for entry in state.categories.entries() {
                println!("{:<20} {}", entry.name, entry.keywords.join(", "));
            }
        }
        CategoryCommands::Add { name } => {
            state.add_category(&name)?;
            println!("✓ Category {} added", name.trim());
        }
        CategoryCommands::Keyword { category, keyword } => {
            if state.add_keyword(&category, &keyword)? {
                println!("✓ Keyword {} added to category {}", keyword.trim(), category);
            } else {
                println!("Keyword {:?} not added (blank or already present)", keyword);
            }
        }
    }
    Ok(())
}

// ============================================================================
// PRINTING
// ============================================================================

fn print_rows(title: &str, rows: &[Transaction]) {
    println!("\n{} ({})", title, rows.len());
    println!("{:<12} {:<32} {:>12} {:<18} {:<10} {}", "Date", "Description", "Amount", "Category", "Made By", "Note");
    for tx in rows {
        println!(
            "{:<12} {:<32} {:>12.2} {:<18} {:<10} {}",
            tx.date.format("%d %b %Y"),
            truncate(&tx.description, 32),
            tx.amount,
            truncate(&tx.category, 18),
            truncate(&tx.made_by, 10),
            tx.note
        );
    }
}

fn print_working_set(working: &WorkingSet) {
    print_rows("Your Expenses", &working.expenses);
    print_rows("Income", &working.income);
}

fn print_groups(key: GroupKey, groups: &[GroupTotal], label: &str) {
    println!("\nBy {}", key.label());
    for group in groups {
        let key = if group.key.is_empty() { "(none)" } else { group.key.as_str() };
        println!("  {:<32} {:>16}", truncate(key, 32), format_amount(group.amount, label));
    }
}

fn print_summary(summary: &BatchSummary, label: &str) {
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Total Expenses: {}", format_amount(summary.expenses.total, label));
    println!("Total Income:   {}", format_amount(summary.total_income, label));
    print_groups(GroupKey::Payer, &summary.expenses.by_payer, label);
    print_groups(GroupKey::Category, &summary.expenses.by_category, label);
    print_groups(GroupKey::Description, &summary.expenses.by_description, label);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

// ============================================================================
// UI MODE
// ============================================================================

#[cfg(feature = "tui")]
fn run_ui_mode(state: &mut AppState, batch: Option<String>, upload: Vec<PathBuf>) -> Result<()> {
    let (title, working) = if !upload.is_empty() {
        let uploads = read_uploads(&upload)?;
        let working = state.ingest(&uploads).context("Error loading file")?.clone();
        ("Upload".to_string(), working)
    } else {
        let name = match batch {
            Some(name) => name,
            None => match state.list_batches()?.into_iter().next() {
                Some(name) => name,
                None => {
                    eprintln!("❌ No saved batches!");
                    eprintln!("   Run: finboard import <files> --save <name>");
                    eprintln!("   or:  finboard ui --upload <files>");
                    std::process::exit(1);
                }
            },
        };
        let working = state.open_batch(&name)?.clone();
        (name, working)
    };

    let mut app = ui::App::new(title, working, state.settings.currency_label.clone());
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_state: &mut AppState, _batch: Option<String>, _upload: Vec<PathBuf>) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin finboard-server --features server");
    std::process::exit(1);
}
