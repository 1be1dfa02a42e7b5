//! Checksum-gated serving of a generated report directory.
//!
//! After the report is written, the archive records a SHA-256 fingerprint for
//! every file that could carry active content. Later requests are served only
//! when the file still matches its fingerprint, when its extension is on the
//! inert allowlist, or when it sits directly under a trusted asset directory.
//! Everything else is refused, so files dropped into or edited inside the
//! report directory after the scan never reach a viewer.
use crate::staging::collect_files_recursive;
use crate::util::rel_key;
use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

mod fingerprint;
mod serve;

pub use fingerprint::{fingerprint_file, FingerprintStore, FingerprintTable};
pub use serve::ServeResponse;

pub const ARCHIVE_STATE_SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_INDEX_FILE: &str = "overview-features.html";

/// Types whose modification cannot hurt a browser viewing them.
pub const DEFAULT_SAFE_EXTENSIONS: &[&str] = &[
    "png", "gif", "jpg", "jpeg", "ico", "webp", "woff", "woff2", "ttf", "eot", "zip", "gz",
];

/// Report subdirectories whose direct children are regenerated every run.
pub const DEFAULT_TRUSTED_DIRS: &[&str] = &["css", "js", "fonts", "images"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArchiveSettings {
    pub index_file: String,
    pub safe_extensions: Vec<String>,
    pub trusted_dirs: Vec<String>,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            index_file: DEFAULT_INDEX_FILE.to_string(),
            safe_extensions: DEFAULT_SAFE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            trusted_dirs: DEFAULT_TRUSTED_DIRS
                .iter()
                .map(|dir| dir.to_string())
                .collect(),
        }
    }
}

/// Persisted form of an archive, written after each scan.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArchiveState {
    pub schema_version: u32,
    pub root: PathBuf,
    pub settings: ArchiveSettings,
    /// `None` when no scan has completed.
    pub fingerprints: Option<FingerprintTable>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub checked: usize,
    pub modified: Vec<String>,
    pub missing: Vec<String>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.modified.is_empty() && self.missing.is_empty()
    }
}

#[derive(Debug)]
pub struct SafeArchive {
    root: PathBuf,
    settings: ArchiveSettings,
    store: FingerprintStore,
    scan_lock: Mutex<()>,
}

impl SafeArchive {
    pub fn new(root: PathBuf, settings: ArchiveSettings) -> Self {
        Self {
            root,
            settings,
            store: FingerprintStore::default(),
            scan_lock: Mutex::new(()),
        }
    }

    pub fn from_state(state: ArchiveState) -> Result<Self> {
        if state.schema_version != ARCHIVE_STATE_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported archive state schema_version {}",
                state.schema_version
            ));
        }
        Ok(Self {
            root: state.root,
            settings: state.settings,
            store: FingerprintStore::with_table(state.fingerprints),
            scan_lock: Mutex::new(()),
        })
    }

    pub fn settings(&self) -> &ArchiveSettings {
        &self.settings
    }

    pub fn is_scanned(&self) -> bool {
        self.store.is_scanned()
    }

    /// Current fingerprint table; safe to read while a scan runs.
    pub fn snapshot(&self) -> Option<std::sync::Arc<FingerprintTable>> {
        self.store.snapshot()
    }

    pub fn state(&self) -> ArchiveState {
        ArchiveState {
            schema_version: ARCHIVE_STATE_SCHEMA_VERSION,
            root: self.root.clone(),
            settings: self.settings.clone(),
            fingerprints: self.snapshot().map(|table| table.as_ref().clone()),
        }
    }

    /// Fingerprint every non-inert file under the root and publish the table.
    ///
    /// Any read failure aborts the scan and leaves the previous table (or the
    /// unscanned state) in place.
    pub fn scan(&self) -> Result<usize> {
        let _guard = self.scan_lock.lock();
        let start = Instant::now();
        if !self.root.is_dir() {
            return Err(anyhow!(
                "report directory {} does not exist",
                self.root.display()
            ));
        }
        let mut table = FingerprintTable::new();
        for path in collect_files_recursive(&self.root)? {
            let rel = rel_key(&self.root, &path)?;
            if self.is_safe_file(&rel) {
                continue;
            }
            let checksum =
                fingerprint_file(&path).with_context(|| format!("fingerprint {rel}"))?;
            table.insert(rel, checksum);
        }
        let recorded = table.len();
        self.store.publish(table);
        tracing::info!(
            root = %self.root.display(),
            files = recorded,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "fingerprint scan complete"
        );
        Ok(recorded)
    }

    /// Re-hash every recorded file and report the ones that drifted.
    pub fn verify_all(&self) -> Result<VerifyReport> {
        let table = self
            .snapshot()
            .ok_or_else(|| anyhow!("report directory has not been scanned"))?;
        let mut report = VerifyReport::default();
        for (rel, expected) in table.iter() {
            report.checked += 1;
            let path = self.root.join(rel);
            if !path.is_file() {
                report.missing.push(rel.clone());
                continue;
            }
            let actual = fingerprint_file(&path)?;
            if &actual != expected {
                report.modified.push(rel.clone());
            }
        }
        Ok(report)
    }

    pub(crate) fn is_safe_file(&self, rel_path: &str) -> bool {
        let lower = rel_path.to_ascii_lowercase();
        self.settings
            .safe_extensions
            .iter()
            .any(|ext| lower.ends_with(&format!(".{}", ext.to_ascii_lowercase())))
    }

    /// Direct child of one of the trusted asset directories.
    pub(crate) fn is_trusted_asset(&self, rel_path: &str) -> bool {
        let mut parts = rel_path.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(dir), Some(name), None) if !name.is_empty() => {
                self.settings.trusted_dirs.iter().any(|trusted| trusted == dir)
            }
            _ => false,
        }
    }
}

pub fn save_state(path: &Path, state: &ArchiveState) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let text = serde_json::to_string_pretty(state).context("serialize archive state")?;
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn load_state(path: &Path) -> Result<ArchiveState> {
    let bytes = fs::read(path).with_context(|| format!("read archive state {}", path.display()))?;
    let state: ArchiveState =
        serde_json::from_slice(&bytes).context("parse archive state JSON")?;
    Ok(state)
}

#[cfg(test)]
#[path = "publisher_tests.rs"]
mod tests;
