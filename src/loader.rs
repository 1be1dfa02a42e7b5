//! Result document discovery and parsing.
//!
//! Each file is parsed on its own; a malformed file is recorded as a failure
//! and the rest keep loading. The caller decides whether failures are fatal.
use crate::model::Feature;
use crate::staging::collect_files_recursive;
use anyhow::{anyhow, Context, Result};
use glob::{MatchOptions, Pattern};
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const DEFAULT_INCLUDE_PATTERN: &str = "**/*.json";

/// One parsed input file.
#[derive(Debug)]
pub struct ResultDocument {
    pub path: PathBuf,
    pub features: Vec<Feature>,
}

#[derive(Debug)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: anyhow::Error,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<ResultDocument>,
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    /// All features in file order, then document order.
    pub fn into_features(self) -> Vec<Feature> {
        let mut features = Vec::new();
        for document in self.documents {
            tracing::debug!(
                path = %document.path.display(),
                features = document.features.len(),
                steps = document.features.iter().map(|feature| feature.steps().count()).sum::<usize>(),
                "collected result document"
            );
            features.extend(document.features);
        }
        features
    }
}

/// Find result files under `input_dir` whose relative path matches `include`
/// and does not match `exclude`.
pub fn find_result_files(
    input_dir: &Path,
    include: &str,
    exclude: Option<&str>,
) -> Result<Vec<PathBuf>> {
    if !input_dir.is_dir() {
        return Err(anyhow!(
            "result directory {} does not exist",
            input_dir.display()
        ));
    }
    let include = Pattern::new(include).with_context(|| format!("parse include {include:?}"))?;
    let exclude = exclude
        .filter(|pattern| !pattern.trim().is_empty())
        .map(|pattern| Pattern::new(pattern).with_context(|| format!("parse exclude {pattern:?}")))
        .transpose()?;
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    let mut matched = Vec::new();
    for path in collect_files_recursive(input_dir)? {
        let rel = path
            .strip_prefix(input_dir)
            .context("strip result dir prefix")?;
        let rel = rel.to_string_lossy().replace('\\', "/");
        if !include.matches_with(&rel, options) {
            continue;
        }
        if exclude
            .as_ref()
            .is_some_and(|pattern| pattern.matches_with(&rel, options))
        {
            continue;
        }
        matched.push(path);
    }
    Ok(matched)
}

pub fn load_result_files(paths: &[PathBuf]) -> LoadReport {
    let mut report = LoadReport::default();
    for path in paths {
        match load_result_file(path) {
            Ok(features) => {
                report.documents.push(ResultDocument {
                    path: path.clone(),
                    features,
                });
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), "skipping result file: {error:#}");
                report.failures.push(LoadFailure {
                    path: path.clone(),
                    error,
                });
            }
        }
    }
    report
}

pub fn load_result_file(path: &Path) -> Result<Vec<Feature>> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    parse_features(&bytes).with_context(|| format!("parse {}", path.display()))
}

/// Parse a JSON array of features and resolve literal `\uXXXX` text.
pub fn parse_features(bytes: &[u8]) -> Result<Vec<Feature>> {
    let value: serde_json::Value = serde_json::from_slice(bytes).context("invalid JSON")?;
    if !value.is_array() {
        return Err(anyhow!(
            "expected a top-level array of features, found {}",
            json_kind(&value)
        ));
    }
    let mut features: Vec<Feature> =
        serde_json::from_value(value).context("array does not hold feature objects")?;
    for feature in &mut features {
        unescape_feature(feature);
    }
    Ok(features)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

fn unescape_feature(feature: &mut Feature) {
    unescape_in_place(&mut feature.name);
    for text in [
        &mut feature.uri,
        &mut feature.id,
        &mut feature.description,
        &mut feature.keyword,
    ]
    .into_iter()
    .flatten()
    {
        unescape_in_place(text);
    }
    for tag in &mut feature.tags {
        unescape_in_place(&mut tag.name);
    }
    for scenario in &mut feature.elements {
        unescape_in_place(&mut scenario.name);
        for text in [
            &mut scenario.id,
            &mut scenario.keyword,
            &mut scenario.description,
        ]
        .into_iter()
        .flatten()
        {
            unescape_in_place(text);
        }
        for tag in &mut scenario.tags {
            unescape_in_place(&mut tag.name);
        }
        for step in &mut scenario.steps {
            unescape_in_place(&mut step.keyword);
            unescape_in_place(&mut step.name);
            if let Some(message) = step
                .result
                .as_mut()
                .and_then(|result| result.error_message.as_mut())
            {
                unescape_in_place(message);
            }
            for cell in step.rows.iter_mut().flat_map(|row| row.cells.iter_mut()) {
                unescape_in_place(cell);
            }
        }
        let hook_messages = scenario
            .before
            .iter_mut()
            .chain(scenario.after.iter_mut())
            .filter_map(|hook| hook.result.as_mut())
            .filter_map(|result| result.error_message.as_mut());
        for message in hook_messages {
            unescape_in_place(message);
        }
    }
}

fn unescape_in_place(text: &mut String) {
    if let Cow::Owned(resolved) = resolve_unicode_escapes(text) {
        *text = resolved;
    }
}

fn escape_regex() -> &'static Regex {
    static ESCAPE: OnceLock<Regex> = OnceLock::new();
    ESCAPE.get_or_init(|| {
        Regex::new(
            r"\\u([dD][89abAB][0-9a-fA-F]{2})\\u([dD][c-fC-F][0-9a-fA-F]{2})|\\u([0-9a-fA-F]{4})",
        )
        .expect("valid escape regex")
    })
}

/// Replace literal `\uXXXX` sequences (already-decoded text, not JSON escapes)
/// with the characters they name. Surrogate pairs are combined; a lone
/// surrogate is left untouched.
pub fn resolve_unicode_escapes(text: &str) -> Cow<'_, str> {
    if !text.contains("\\u") {
        return Cow::Borrowed(text);
    }
    escape_regex().replace_all(text, |caps: &Captures<'_>| {
        let code = match (caps.get(1), caps.get(2), caps.get(3)) {
            (Some(high), Some(low), _) => {
                let high = hex_value(high.as_str());
                let low = hex_value(low.as_str());
                0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
            }
            (_, _, Some(single)) => hex_value(single.as_str()),
            _ => return caps[0].to_string(),
        };
        char::from_u32(code)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    })
}

fn hex_value(digits: &str) -> u32 {
    u32::from_str_radix(digits, 16).unwrap_or(0xFFFD)
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
