//! Staged output for report generation.
//!
//! Pages are rendered into a staging directory first and then moved into the
//! report directory file by file; a failed publish restores what was there.
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub fn write_staged_bytes(staging_root: &Path, rel_path: &str, bytes: &[u8]) -> Result<()> {
    let staging_path = staging_root.join(rel_path);
    if let Some(parent) = staging_path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(&staging_path, bytes).with_context(|| format!("write {}", staging_path.display()))?;
    Ok(())
}

pub fn write_staged_text(staging_root: &Path, rel_path: &str, text: &str) -> Result<()> {
    write_staged_bytes(staging_root, rel_path, text.as_bytes())
}

/// Move every staged file into `report_root`, returning the published paths.
///
/// Existing files are backed up next to the staging root and put back if any
/// file fails to publish.
pub fn publish_staging(staging_root: &Path, report_root: &Path) -> Result<Vec<PathBuf>> {
    if !staging_root.exists() {
        return Ok(Vec::new());
    }
    let files = collect_files_recursive(staging_root)?;
    let txn_root = staging_root
        .parent()
        .ok_or_else(|| anyhow!("staging root has no parent"))?;
    let backup_root = txn_root.join("backup");
    fs::create_dir_all(&backup_root)
        .with_context(|| format!("create {}", backup_root.display()))?;
    let mut published = Vec::new();
    let mut backups: Vec<(PathBuf, PathBuf)> = Vec::new();
    let mut created: Vec<PathBuf> = Vec::new();
    for file in files {
        let rel = file
            .strip_prefix(staging_root)
            .context("strip staging prefix")?;
        let dest = report_root.join(rel);
        if dest.exists() {
            let backup = backup_root.join(rel);
            if let Some(parent) = backup.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            fs::rename(&dest, &backup)
                .or_else(|_| fs::copy(&dest, &backup).map(|_| ()))
                .with_context(|| format!("backup {}", dest.display()))?;
            backups.push((dest.clone(), backup));
        } else {
            created.push(dest.clone());
        }

        if let Err(err) = publish_file(&file, &dest) {
            tracing::warn!(path = %dest.display(), "publish failed, rolling back: {err:#}");
            rollback_publish(&published, &backups, &created);
            return Err(err);
        }
        published.push(dest);
    }
    tracing::debug!(files = published.len(), root = %report_root.display(), "published staged report");
    Ok(published)
}

/// Regular files under `root`, sorted. Symlinks are not followed.
pub fn collect_files_recursive(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !root.exists() {
        return Ok(files);
    }
    for entry in fs::read_dir(root).with_context(|| format!("read {}", root.display()))? {
        let entry = entry.with_context(|| format!("read {}", root.display()))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("inspect {}", path.display()))?;
        if file_type.is_dir() {
            files.extend(collect_files_recursive(&path)?);
        } else if file_type.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn publish_file(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let file_name = dest
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("staged");
    let tmp_path = dest
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!(".{file_name}.tmp"));
    fs::copy(source, &tmp_path).with_context(|| format!("publish {}", dest.display()))?;
    fs::rename(&tmp_path, dest).with_context(|| format!("publish {}", dest.display()))?;
    Ok(())
}

fn rollback_publish(published: &[PathBuf], backups: &[(PathBuf, PathBuf)], created: &[PathBuf]) {
    for path in published.iter().chain(created) {
        if path.exists() {
            let _ = fs::remove_file(path);
        }
    }
    for (dest, backup) in backups {
        if let Some(parent) = dest.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let _ = fs::rename(backup, dest).or_else(|_| fs::copy(backup, dest).map(|_| ()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_replaces_existing_files_and_keeps_unrelated_ones() {
        let txn = tempfile::tempdir().expect("txn dir");
        let report = tempfile::tempdir().expect("report dir");
        let staging = txn.path().join("staging");
        fs::write(report.path().join("old.html"), "old").expect("write old");
        fs::write(report.path().join("keep.txt"), "keep").expect("write keep");

        write_staged_text(&staging, "old.html", "new").expect("stage old");
        write_staged_text(&staging, "features/a.html", "a").expect("stage nested");

        let published = publish_staging(&staging, report.path()).expect("publish");
        assert_eq!(published.len(), 2);
        assert_eq!(
            fs::read_to_string(report.path().join("old.html")).expect("read"),
            "new"
        );
        assert_eq!(
            fs::read_to_string(report.path().join("features/a.html")).expect("read"),
            "a"
        );
        assert!(report.path().join("keep.txt").is_file());
        assert!(txn.path().join("backup/old.html").is_file());
    }

    #[test]
    fn collect_is_sorted_and_recursive() {
        let root = tempfile::tempdir().expect("root");
        write_staged_text(root.path(), "b.txt", "b").expect("write");
        write_staged_text(root.path(), "a/z.txt", "z").expect("write");
        let files = collect_files_recursive(root.path()).expect("collect");
        let rel: Vec<_> = files
            .iter()
            .map(|path| path.strip_prefix(root.path()).expect("prefix").to_path_buf())
            .collect();
        assert_eq!(rel, vec![PathBuf::from("a/z.txt"), PathBuf::from("b.txt")]);
    }
}
