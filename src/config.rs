// ⚙️ Configuration - data directory + user settings
//
// Path resolution order:
// 1. `FINBOARD_DATA_DIR` environment variable (or `--data-dir` on the CLI)
// 2. Unix: `$XDG_DATA_HOME/finboard` or `~/.local/share/finboard`
// 3. Windows: `%APPDATA%\finboard`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{FinboardError, FinboardResult};
use crate::file_io::{read_json, write_json_atomic};
use crate::rules::MatchPolicy;

pub const DATA_DIR_ENV: &str = "FINBOARD_DATA_DIR";

// ============================================================================
// PATHS
// ============================================================================

/// All on-disk locations used by finboard
#[derive(Debug, Clone)]
pub struct AppPaths {
    base_dir: PathBuf,
}

impl AppPaths {
    /// Resolve from the environment (see module header for the order)
    pub fn new() -> FinboardResult<Self> {
        let base_dir = match std::env::var(DATA_DIR_ENV) {
            Ok(custom) if !custom.trim().is_empty() => PathBuf::from(custom),
            _ => resolve_default_path()?,
        };

        Ok(Self { base_dir })
    }

    /// Explicit base directory (CLI flag, tests)
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("settings.json")
    }

    /// Category → keywords mapping
    pub fn categories_file(&self) -> PathBuf {
        self.base_dir.join("categories.json")
    }

    /// SQLite database holding every saved batch
    pub fn database_file(&self) -> PathBuf {
        self.base_dir.join("transactions.db")
    }

    pub fn ensure_directories(&self) -> FinboardResult<()> {
        std::fs::create_dir_all(&self.base_dir).map_err(|e| {
            FinboardError::Io(format!(
                "Failed to create data directory {}: {}",
                self.base_dir.display(),
                e
            ))
        })
    }
}

#[cfg(not(windows))]
fn resolve_default_path() -> FinboardResult<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        if !xdg.is_empty() {
            return Ok(PathBuf::from(xdg).join("finboard"));
        }
    }
    let home = std::env::var("HOME")
        .map_err(|_| FinboardError::Io("HOME environment variable not set".into()))?;
    Ok(PathBuf::from(home).join(".local").join("share").join("finboard"))
}

#[cfg(windows)]
fn resolve_default_path() -> FinboardResult<PathBuf> {
    let appdata = std::env::var("APPDATA")
        .map_err(|_| FinboardError::Io("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("finboard"))
}

// ============================================================================
// SETTINGS
// ============================================================================

/// User settings (`settings.json`); every field has a default so partial files load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// chrono format of the "Started Date" column
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// Suffix shown after amounts ("1,234.56 BG")
    #[serde(default = "default_currency_label")]
    pub currency_label: String,

    /// "Type" column values that mark an expense row
    #[serde(default = "default_expense_labels")]
    pub expense_type_labels: Vec<String>,

    /// "Type" column values that mark an income row
    #[serde(default = "default_income_labels")]
    pub income_type_labels: Vec<String>,

    /// Tie-break when a description matches several categories
    #[serde(default)]
    pub match_policy: MatchPolicy,

    /// Allowed "Made By" values; empty = anything goes
    #[serde(default)]
    pub payers: Vec<String>,
}

fn default_date_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

fn default_currency_label() -> String {
    "BG".to_string()
}

fn default_expense_labels() -> Vec<String> {
    vec!["CARD_PAYMENT".to_string()]
}

fn default_income_labels() -> Vec<String> {
    vec!["TOPUP".to_string()]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            date_format: default_date_format(),
            currency_label: default_currency_label(),
            expense_type_labels: default_expense_labels(),
            income_type_labels: default_income_labels(),
            match_policy: MatchPolicy::default(),
            payers: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults when the file is absent
    pub fn load(paths: &AppPaths) -> FinboardResult<Self> {
        read_json(paths.settings_file())
    }

    pub fn save(&self, paths: &AppPaths) -> FinboardResult<()> {
        write_json_atomic(paths.settings_file(), self)
    }

    /// Check a payer against the configured list
    pub fn accepts_payer(&self, payer: &str) -> bool {
        payer.is_empty() || self.payers.is_empty() || self.payers.iter().any(|p| p == payer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_paths() {
        let temp_dir = TempDir::new().unwrap();
        let paths = AppPaths::with_base_dir(temp_dir.path());

        assert_eq!(paths.base_dir(), temp_dir.path());
        assert_eq!(paths.settings_file(), temp_dir.path().join("settings.json"));
        assert_eq!(paths.categories_file(), temp_dir.path().join("categories.json"));
        assert_eq!(paths.database_file(), temp_dir.path().join("transactions.db"));
    }

    #[test]
    fn test_missing_settings_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let paths = AppPaths::with_base_dir(temp_dir.path());

        let settings = Settings::load(&paths).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.date_format, "%Y-%m-%d %H:%M:%S");
        assert_eq!(settings.match_policy, MatchPolicy::LastMatch);
    }

    #[test]
    fn test_partial_settings_file() {
        let temp_dir = TempDir::new().unwrap();
        let paths = AppPaths::with_base_dir(temp_dir.path());
        std::fs::write(
            paths.settings_file(),
            r#"{"currency_label": "EUR", "match_policy": "first-match", "payers": ["Gabi", "Blago"]}"#,
        )
        .unwrap();

        let settings = Settings::load(&paths).unwrap();
        assert_eq!(settings.currency_label, "EUR");
        assert_eq!(settings.match_policy, MatchPolicy::FirstMatch);
        assert_eq!(settings.expense_type_labels, vec!["CARD_PAYMENT".to_string()]);
        assert!(settings.accepts_payer("Gabi"));
        assert!(settings.accepts_payer(""));
        assert!(!settings.accepts_payer("Someone"));
    }

    #[test]
    fn test_save_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let paths = AppPaths::with_base_dir(temp_dir.path().join("data"));
        paths.ensure_directories().unwrap();

        let mut settings = Settings::default();
        settings.payers = vec!["Gabi".to_string()];
        settings.save(&paths).unwrap();

        assert_eq!(Settings::load(&paths).unwrap(), settings);
    }
}
