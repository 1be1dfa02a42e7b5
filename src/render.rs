//! Report page generation.
//!
//! Pages are produced through [`ReportRenderer`] so the aggregation pipeline
//! does not depend on any markup. [`write_report`] renders every page into a
//! staging directory next to the report and publishes the whole set at once.
use crate::aggregate::thresholds::Verdict;
use crate::aggregate::{ClassifiedFeature, ReportSummary};
use crate::staging::{collect_files_recursive, publish_staging, write_staged_text};
use crate::tags::{TagIndex, TagObject};
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

mod assets;
mod html;

pub use html::HtmlRenderer;

pub const FEATURES_DIR: &str = "features";
pub const TAGS_DIR: &str = "tags";
pub const TAGS_OVERVIEW_FILE: &str = "overview-tags.html";

/// Everything a renderer needs for one report.
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'r> {
    pub project_name: &'r str,
    pub build_label: Option<&'r str>,
    pub index_file: &'r str,
    pub features: &'r [ClassifiedFeature<'r>],
    pub tags: &'r TagIndex<'r>,
    pub summary: &'r ReportSummary,
    pub verdict: &'r Verdict,
}

pub trait ReportRenderer {
    fn render_feature(&self, ctx: &ReportContext<'_>, feature: &ClassifiedFeature<'_>)
        -> Result<String>;
    fn render_tag(&self, ctx: &ReportContext<'_>, tag: &TagObject<'_>) -> Result<String>;
    fn render_overview(&self, ctx: &ReportContext<'_>) -> Result<String>;
    fn render_tags_overview(&self, ctx: &ReportContext<'_>) -> Result<String>;
    /// Static files as (relative path, content).
    fn static_assets(&self) -> Vec<(&'static str, &'static str)>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub rel_path: String,
    pub content: String,
}

pub fn feature_page_path(feature: &ClassifiedFeature<'_>) -> String {
    format!("{FEATURES_DIR}/{}", feature.feature.file_name())
}

pub fn tag_page_path(tag: &TagObject<'_>) -> String {
    format!("{TAGS_DIR}/{}", tag.file_name())
}

/// Render every page of the report in memory.
pub fn render_pages(
    renderer: &dyn ReportRenderer,
    ctx: &ReportContext<'_>,
) -> Result<Vec<RenderedPage>> {
    let mut pages = Vec::new();
    pages.push(RenderedPage {
        rel_path: ctx.index_file.to_string(),
        content: renderer.render_overview(ctx).context("render overview")?,
    });
    pages.push(RenderedPage {
        rel_path: TAGS_OVERVIEW_FILE.to_string(),
        content: renderer
            .render_tags_overview(ctx)
            .context("render tags overview")?,
    });
    for feature in ctx.features {
        let content = renderer
            .render_feature(ctx, feature)
            .with_context(|| format!("render feature {}", feature.feature.uri()))?;
        pages.push(RenderedPage {
            rel_path: feature_page_path(feature),
            content,
        });
    }
    for tag in ctx.tags.iter() {
        let content = renderer
            .render_tag(ctx, tag)
            .with_context(|| format!("render tag {}", tag.name))?;
        pages.push(RenderedPage {
            rel_path: tag_page_path(tag),
            content,
        });
    }
    for (rel_path, content) in renderer.static_assets() {
        pages.push(RenderedPage {
            rel_path: rel_path.to_string(),
            content: content.to_string(),
        });
    }
    let mut seen = BTreeSet::new();
    for page in &pages {
        if !seen.insert(page.rel_path.as_str()) {
            return Err(anyhow!(
                "two report pages map to {}; combine features sharing a URI first",
                page.rel_path
            ));
        }
    }
    Ok(pages)
}

/// Render into a staging directory beside `report_dir`, then publish.
///
/// On any failure the report directory keeps its previous content. Pages
/// from an earlier run that were not regenerated are removed from the
/// feature and tag directories afterwards.
pub fn write_report(
    renderer: &dyn ReportRenderer,
    ctx: &ReportContext<'_>,
    report_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let start = Instant::now();
    let pages = render_pages(renderer, ctx)?;
    fs::create_dir_all(report_dir).with_context(|| format!("create {}", report_dir.display()))?;
    let txn_parent = report_dir
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let txn = tempfile::Builder::new()
        .prefix(".bddreport-txn-")
        .tempdir_in(txn_parent)
        .with_context(|| format!("create staging dir in {}", txn_parent.display()))?;
    let staging_root = txn.path().join("staging");
    for page in &pages {
        write_staged_text(&staging_root, &page.rel_path, &page.content)?;
    }
    let published = publish_staging(&staging_root, report_dir)?;
    let pruned = prune_stale_pages(report_dir, &published)?;
    tracing::info!(
        pages = published.len(),
        pruned,
        report_dir = %report_dir.display(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "wrote report"
    );
    Ok(published)
}

fn prune_stale_pages(report_dir: &Path, published: &[PathBuf]) -> Result<usize> {
    let keep: BTreeSet<&Path> = published.iter().map(PathBuf::as_path).collect();
    let mut pruned = 0;
    for dir in [FEATURES_DIR, TAGS_DIR] {
        for path in collect_files_recursive(&report_dir.join(dir))? {
            if keep.contains(path.as_path()) {
                continue;
            }
            fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
            tracing::debug!(path = %path.display(), "removed stale page");
            pruned += 1;
        }
    }
    Ok(pruned)
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
