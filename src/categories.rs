// 🏷️ Category Store
// Ordered category → keywords mapping, persisted whole on every mutation
//
// File format is a single JSON object, key order = category order:
//   {"Uncategorized": [], "Food": ["mcdonalds", "lidl"]}

use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::error::{FinboardError, FinboardResult};
use crate::file_io::{read_json_opt, write_json_atomic};
use crate::transaction::UNCATEGORIZED;

/// One category and its keywords
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryEntry {
    pub name: String,
    pub keywords: Vec<String>,
}

impl CategoryEntry {
    fn new(name: impl Into<String>) -> Self {
        CategoryEntry {
            name: name.into(),
            keywords: Vec::new(),
        }
    }

    pub fn is_uncategorized(&self) -> bool {
        self.name == UNCATEGORIZED
    }
}

/// Keyword comparison form: trimmed + lower-cased
pub fn normalize_keyword(text: &str) -> String {
    text.trim().to_lowercase()
}

pub struct CategoryStore {
    /// None = in-memory only
    path: Option<PathBuf>,
    entries: Vec<CategoryEntry>,
}

impl CategoryStore {
    /// Store holding only "Uncategorized", not backed by a file
    pub fn in_memory() -> Self {
        CategoryStore {
            path: None,
            entries: vec![CategoryEntry::new(UNCATEGORIZED)],
        }
    }

    /// In-memory store seeded with entries (order kept)
    pub fn from_entries<I, S, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<K>)>,
        S: Into<String>,
        K: Into<String>,
    {
        let mut store = CategoryStore {
            path: None,
            entries: entries
                .into_iter()
                .map(|(name, keywords)| CategoryEntry {
                    name: name.into(),
                    keywords: keywords.into_iter().map(Into::into).collect(),
                })
                .collect(),
        };
        store.enforce_uncategorized();
        store
    }

    /// Load from `path`; a missing file gives the default single-entry store
    pub fn load<P: AsRef<Path>>(path: P) -> FinboardResult<Self> {
        let path = path.as_ref();

        let entries = match read_json_opt::<Map<String, Value>, _>(path)? {
            Some(map) => {
                let mut entries = Vec::with_capacity(map.len());
                for (name, value) in map {
                    let keywords: Vec<String> = serde_json::from_value(value).map_err(|e| {
                        FinboardError::Json(format!(
                            "Category {} in {} is not a list of keywords: {}",
                            name,
                            path.display(),
                            e
                        ))
                    })?;
                    entries.push(CategoryEntry { name, keywords });
                }
                info!("Loaded {} categories from {}", entries.len(), path.display());
                entries
            }
            None => {
                debug!("No category file at {}, starting with defaults", path.display());
                vec![CategoryEntry::new(UNCATEGORIZED)]
            }
        };

        let mut store = CategoryStore {
            path: Some(path.to_path_buf()),
            entries,
        };
        store.enforce_uncategorized();
        Ok(store)
    }

    /// "Uncategorized" must exist and must stay keyword-free
    fn enforce_uncategorized(&mut self) {
        match self.entries.iter_mut().find(|e| e.is_uncategorized()) {
            Some(entry) => {
                if !entry.keywords.is_empty() {
                    warn!(
                        "Dropping {} keywords stored under {}",
                        entry.keywords.len(),
                        UNCATEGORIZED
                    );
                    entry.keywords.clear();
                }
            }
            None => self.entries.insert(0, CategoryEntry::new(UNCATEGORIZED)),
        }
    }

    // ========================================================================
    // MUTATIONS (each one flushes the whole mapping)
    // ========================================================================

    /// Add an empty category
    pub fn add_category(&mut self, name: &str) -> FinboardResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FinboardError::Validation("Category name cannot be empty".into()));
        }
        if self.contains(name) {
            return Err(FinboardError::DuplicateCategory(name.to_string()));
        }

        self.entries.push(CategoryEntry::new(name));
        if let Err(err) = self.persist() {
            self.entries.pop();
            return Err(err);
        }
        info!("Added category {}", name);
        Ok(())
    }

    /// Append a keyword; Ok(false) when it was blank or already present
    pub fn add_keyword(&mut self, category: &str, keyword: &str) -> FinboardResult<bool> {
        if category == UNCATEGORIZED {
            return Err(FinboardError::Validation(format!(
                "{} cannot hold keywords",
                UNCATEGORIZED
            )));
        }

        let keyword = keyword.trim();
        let idx = self
            .entries
            .iter()
            .position(|e| e.name == category)
            .ok_or_else(|| FinboardError::not_found("category", category))?;

        let wanted = normalize_keyword(keyword);
        let keywords = &mut self.entries[idx].keywords;
        if keyword.is_empty() || keywords.iter().any(|k| normalize_keyword(k) == wanted) {
            debug!("Keyword {:?} not added to {}", keyword, category);
            return Ok(false);
        }

        keywords.push(keyword.to_string());
        if let Err(err) = self.persist() {
            self.entries[idx].keywords.pop();
            return Err(err);
        }
        info!("Keyword {} added to category {}", keyword, category);
        Ok(true)
    }

    fn persist(&self) -> FinboardResult<()> {
        match &self.path {
            Some(path) => write_json_atomic(path, &self.to_json()),
            None => Ok(()),
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn entries(&self) -> &[CategoryEntry] {
        &self.entries
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn keywords(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.keywords.as_slice())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Mapping as a JSON object in category order
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|e| (e.name.clone(), Value::from(e.keywords.clone())))
            .collect();
        Value::Object(map)
    }
}

impl Default for CategoryStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_gives_default() {
        let temp_dir = TempDir::new().unwrap();
        let store = CategoryStore::load(temp_dir.path().join("categories.json")).unwrap();

        assert_eq!(store.names(), vec![UNCATEGORIZED]);
        assert_eq!(store.keywords(UNCATEGORIZED), Some(&[][..]));
    }

    #[test]
    fn test_load_preserves_file_order() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("categories.json");
        std::fs::write(
            &path,
            r#"{"Uncategorized": [], "Transport": ["uber"], "Food": ["mcdonalds", "lidl"], "Bills": []}"#,
        )
        .unwrap();

        let store = CategoryStore::load(&path).unwrap();
        assert_eq!(store.names(), vec![UNCATEGORIZED, "Transport", "Food", "Bills"]);
        assert_eq!(store.keywords("Food").unwrap(), &["mcdonalds".to_string(), "lidl".to_string()]);
    }

    #[test]
    fn test_load_inserts_uncategorized_and_clears_its_keywords() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("categories.json");

        std::fs::write(&path, r#"{"Food": ["lidl"]}"#).unwrap();
        let store = CategoryStore::load(&path).unwrap();
        assert_eq!(store.names(), vec![UNCATEGORIZED, "Food"]);

        std::fs::write(&path, r#"{"Food": [], "Uncategorized": ["oops"]}"#).unwrap();
        let store = CategoryStore::load(&path).unwrap();
        assert_eq!(store.names(), vec!["Food", UNCATEGORIZED]);
        assert!(store.keywords(UNCATEGORIZED).unwrap().is_empty());
    }

    #[test]
    fn test_load_rejects_non_list_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("categories.json");
        std::fs::write(&path, r#"{"Food": "lidl"}"#).unwrap();

        assert!(matches!(CategoryStore::load(&path), Err(FinboardError::Json(_))));
    }

    #[test]
    fn test_add_category_persists_immediately() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("categories.json");

        let mut store = CategoryStore::load(&path).unwrap();
        store.add_category("  Food ").unwrap();
        store.add_category("Rent").unwrap();

        let reloaded = CategoryStore::load(&path).unwrap();
        assert_eq!(reloaded.names(), vec![UNCATEGORIZED, "Food", "Rent"]);

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, serde_json::json!({"Uncategorized": [], "Food": [], "Rent": []}));
    }

    #[test]
    fn test_add_category_duplicate_and_blank() {
        let mut store = CategoryStore::in_memory();
        store.add_category("Food").unwrap();

        assert!(matches!(
            store.add_category("Food"),
            Err(FinboardError::DuplicateCategory(ref n)) if n == "Food"
        ));
        assert!(matches!(store.add_category("   "), Err(FinboardError::Validation(_))));
        assert!(matches!(
            store.add_category(UNCATEGORIZED),
            Err(FinboardError::DuplicateCategory(_))
        ));
        assert_eq!(store.names().len(), 2);
    }

    #[test]
    fn test_add_keyword_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("categories.json");
        let mut store = CategoryStore::load(&path).unwrap();
        store.add_category("Food").unwrap();

        assert!(store.add_keyword("Food", " mcdonalds ").unwrap());
        assert!(!store.add_keyword("Food", "mcdonalds").unwrap());
        assert!(!store.add_keyword("Food", "McDonalds").unwrap());
        assert!(!store.add_keyword("Food", "   ").unwrap());

        assert_eq!(store.keywords("Food").unwrap(), &["mcdonalds".to_string()]);
        let reloaded = CategoryStore::load(&path).unwrap();
        assert_eq!(reloaded.keywords("Food").unwrap(), &["mcdonalds".to_string()]);
    }

    #[test]
    fn test_add_keyword_errors() {
        let mut store = CategoryStore::in_memory();

        assert!(store.add_keyword("Missing", "x").unwrap_err().is_not_found());
        assert!(matches!(
            store.add_keyword(UNCATEGORIZED, "x"),
            Err(FinboardError::Validation(_))
        ));
    }

    #[test]
    fn test_add_category_rolls_back_when_write_fails() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let mut store = CategoryStore::load(blocker.join("categories.json")).unwrap();
        assert!(store.add_category("Food").is_err());
        assert_eq!(store.names(), vec![UNCATEGORIZED]);

        // A retry hits the same write error, not a duplicate
        let retry = store.add_category("Food").unwrap_err();
        assert!(!matches!(retry, FinboardError::DuplicateCategory(_)));
        assert_eq!(store.names(), vec![UNCATEGORIZED]);
    }

    #[test]
    fn test_add_keyword_rolls_back_when_write_fails() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = CategoryStore::load(temp_dir.path().join("categories.json")).unwrap();
        store.add_category("Food").unwrap();
        store.add_keyword("Food", "lidl").unwrap();

        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        store.path = Some(blocker.join("categories.json"));

        assert!(store.add_keyword("Food", "kaufland").is_err());
        assert_eq!(store.keywords("Food").unwrap(), &["lidl".to_string()]);
        assert!(store.add_keyword("Food", "kaufland").is_err());
    }

    #[test]
    fn test_from_entries() {
        let store = CategoryStore::from_entries(vec![("Food", vec!["lidl"]), ("Bills", vec![])]);
        assert_eq!(store.names(), vec![UNCATEGORIZED, "Food", "Bills"]);
        assert!(store.path().is_none());
    }
}
