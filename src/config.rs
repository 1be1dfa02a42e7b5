//! Report configuration.
//!
//! A JSON file (schema_version 1) supplies defaults for the `generate` and
//! `scan` commands; command-line flags override individual fields after the
//! file is loaded, and the merged result is validated once.
use crate::aggregate::thresholds::Thresholds;
use crate::classify::{EscalationPolicy, Status};
use crate::loader::DEFAULT_INCLUDE_PATTERN;
use crate::publisher::{
    ArchiveSettings, DEFAULT_INDEX_FILE, DEFAULT_SAFE_EXTENSIONS, DEFAULT_TRUSTED_DIRS,
};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path};

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Extensions that can execute or restyle content in a browser and therefore
/// must always go through the checksum gate.
const ACTIVE_EXTENSIONS: &[&str] = &["html", "htm", "xhtml", "js", "mjs", "css", "svg", "xml"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    pub schema_version: u32,
    #[serde(default = "default_include")]
    pub include: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,
    /// Raw statuses that additionally count as failed.
    #[serde(default)]
    pub escalate: Vec<Status>,
    #[serde(default)]
    pub merge_features: bool,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub fail_on_breach: bool,
    #[serde(default = "default_safe_extensions")]
    pub safe_extensions: Vec<String>,
    #[serde(default = "default_trusted_dirs")]
    pub trusted_dirs: Vec<String>,
    #[serde(default = "default_index_file")]
    pub index_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_label: Option<String>,
}

fn default_include() -> String {
    DEFAULT_INCLUDE_PATTERN.to_string()
}

fn default_safe_extensions() -> Vec<String> {
    DEFAULT_SAFE_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
}

fn default_trusted_dirs() -> Vec<String> {
    DEFAULT_TRUSTED_DIRS.iter().map(|dir| dir.to_string()).collect()
}

fn default_index_file() -> String {
    DEFAULT_INDEX_FILE.to_string()
}

impl ReportConfig {
    /// Escalation flags for every listed status. Passed and failed never
    /// escalate, whatever the file says.
    pub fn policy(&self) -> EscalationPolicy {
        let listed = |status: Status| self.escalate.contains(&status);
        EscalationPolicy::default()
            .treat_skipped_as_failing(listed(Status::Skipped))
            .treat_pending_as_failing(listed(Status::Pending))
            .treat_undefined_as_failing(listed(Status::Undefined))
            .treat_missing_as_failing(listed(Status::Missing))
    }

    pub fn archive_settings(&self) -> ArchiveSettings {
        ArchiveSettings {
            index_file: self.index_file.clone(),
            safe_extensions: self
                .safe_extensions
                .iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect(),
            trusted_dirs: self.trusted_dirs.clone(),
        }
    }

    /// Add a status to the escalation list unless it is already present.
    pub fn escalate_status(&mut self, status: Status) {
        if !self.escalate.contains(&status) {
            self.escalate.push(status);
        }
    }
}

/// Configuration used when no file is given: nothing escalates, all
/// thresholds are zero and breaches are reported without failing the run.
pub fn default_config() -> ReportConfig {
    ReportConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        include: default_include(),
        exclude: None,
        escalate: Vec::new(),
        merge_features: false,
        thresholds: Thresholds::default(),
        fail_on_breach: false,
        safe_extensions: default_safe_extensions(),
        trusted_dirs: default_trusted_dirs(),
        index_file: default_index_file(),
        project_name: None,
        build_label: None,
    }
}

pub fn config_stub() -> Result<String> {
    serde_json::to_string_pretty(&default_config()).context("serialize config stub")
}

pub fn load_config(path: &Path) -> Result<ReportConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: ReportConfig =
        serde_json::from_slice(&bytes).context("parse report config JSON")?;
    Ok(config)
}

pub fn write_config(path: &Path, config: &ReportConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let text = serde_json::to_string_pretty(config).context("serialize report config")?;
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn validate_config(config: &ReportConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported report config schema_version {}",
            config.schema_version
        ));
    }
    validate_pattern(&config.include, "include")?;
    if let Some(exclude) = config.exclude.as_deref() {
        validate_pattern(exclude, "exclude")?;
    }
    if let Some(status) = config
        .escalate
        .iter()
        .find(|status| matches!(status, Status::Passed | Status::Failed))
    {
        return Err(anyhow!(
            "escalate may only list skipped, pending, undefined or missing (got {})",
            status
        ));
    }
    for ext in &config.safe_extensions {
        validate_safe_extension(ext)?;
    }
    for dir in &config.trusted_dirs {
        if dir.is_empty() || dir.contains(['/', '\\']) || dir == "." || dir == ".." {
            return Err(anyhow!(
                "trusted_dirs entries must be single directory names (got {dir:?})"
            ));
        }
    }
    if config.index_file.trim().is_empty() {
        return Err(anyhow!("index_file must be non-empty"));
    }
    validate_relative_path(&config.index_file, "index_file")?;
    Ok(())
}

fn validate_pattern(pattern: &str, label: &str) -> Result<()> {
    if pattern.trim().is_empty() {
        return Err(anyhow!("{label} pattern must be non-empty"));
    }
    glob::Pattern::new(pattern)
        .map(|_| ())
        .with_context(|| format!("invalid {label} pattern {pattern:?}"))
}

fn validate_safe_extension(ext: &str) -> Result<()> {
    if ext.is_empty() || !ext.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return Err(anyhow!(
            "safe_extensions entries must be bare alphanumeric extensions (got {ext:?})"
        ));
    }
    let lower = ext.to_ascii_lowercase();
    if ACTIVE_EXTENSIONS.contains(&lower.as_str()) {
        return Err(anyhow!(
            "safe_extensions may not include active content type {ext:?}"
        ));
    }
    Ok(())
}

fn validate_relative_path(rel: &str, label: &str) -> Result<()> {
    let path = Path::new(rel);
    let escapes = path
        .components()
        .any(|component| matches!(component, Component::ParentDir));
    if path.is_absolute() || escapes {
        return Err(anyhow!(
            "{label} must be a relative path without '..' (got {rel:?})"
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
