//! Fingerprint table with snapshot reads and whole-table publication.
//!
//! The table is never mutated after it becomes visible. A scan builds a new
//! map off to the side and swaps it in under a short write lock, so a reader
//! always sees either the previous table or the complete new one.
use crate::util::sha256_hex;
use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Relative path (with `/` separators) to hex SHA-256 of the file content.
pub type FingerprintTable = BTreeMap<String, String>;

#[derive(Debug, Default)]
pub struct FingerprintStore {
    // `None` until the first successful scan.
    current: RwLock<Option<Arc<FingerprintTable>>>,
}

impl FingerprintStore {
    pub fn with_table(table: Option<FingerprintTable>) -> Self {
        Self {
            current: RwLock::new(table.map(Arc::new)),
        }
    }

    pub fn publish(&self, table: FingerprintTable) {
        let table = Arc::new(table);
        *self.current.write() = Some(table);
    }

    /// Shared handle to the currently published table; iterate it freely.
    pub fn snapshot(&self) -> Option<Arc<FingerprintTable>> {
        self.current.read().clone()
    }

    pub fn is_scanned(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn lookup(&self, rel_path: &str) -> Option<String> {
        self.snapshot()
            .and_then(|table| table.get(rel_path).cloned())
    }
}

pub fn fingerprint_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    Ok(sha256_hex(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unscanned_store_has_no_entries() {
        let store = FingerprintStore::default();
        assert!(!store.is_scanned());
        assert!(store.snapshot().is_none());
        assert!(store.lookup("index.html").is_none());
    }

    #[test]
    fn publish_replaces_whole_table() {
        let store = FingerprintStore::default();
        store.publish(BTreeMap::from([("a.html".to_string(), "1".to_string())]));
        let before = store.snapshot().expect("scanned");

        store.publish(BTreeMap::from([("b.html".to_string(), "2".to_string())]));
        assert_eq!(store.lookup("a.html"), None);
        assert_eq!(store.lookup("b.html").as_deref(), Some("2"));
        // An older snapshot stays intact after the swap.
        assert_eq!(before.get("a.html").map(String::as_str), Some("1"));
        assert_eq!(before.len(), 1);
    }
}
