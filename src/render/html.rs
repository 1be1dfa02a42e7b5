//! Built-in HTML pages: self-contained apart from the shared stylesheet and
//! script under `css/` and `js/`.
use super::assets::{REPORT_CSS, REPORT_JS};
use super::{
    escape_html, feature_page_path, tag_page_path, ReportContext, ReportRenderer,
    TAGS_OVERVIEW_FILE,
};
use crate::aggregate::{AggregateStats, ClassifiedFeature, ClassifiedScenario, ClassifiedStep};
use crate::classify::Status;
use crate::model::{Hook, Row, Tag};
use crate::tags::TagObject;
use anyhow::{Context, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

/// Payload embedded in the overview page for the status chart.
#[derive(Debug, Serialize)]
struct ChartData {
    passed: usize,
    failed: usize,
    skipped: usize,
    pending: usize,
    undefined: usize,
    missing: usize,
}

impl From<&AggregateStats> for ChartData {
    fn from(stats: &AggregateStats) -> Self {
        Self {
            passed: stats.passed,
            failed: stats.failed,
            skipped: stats.skipped,
            pending: stats.pending,
            undefined: stats.undefined,
            missing: stats.missing,
        }
    }
}

impl ReportRenderer for HtmlRenderer {
    fn render_feature(
        &self,
        ctx: &ReportContext<'_>,
        feature: &ClassifiedFeature<'_>,
    ) -> Result<String> {
        let model = feature.feature;
        let mut body = String::new();
        body.push_str(&format!(
            "<h2>{keyword}{name} {badge}</h2>\n",
            keyword = keyword_prefix(model.keyword.as_deref()),
            name = escape_html(&model.name),
            badge = status_badge(feature.status()),
        ));
        body.push_str(&format!(
            "<p class=\"uri\">{}</p>\n",
            escape_html(model.uri())
        ));
        body.push_str(&render_tags(ctx, &model.tags, "../"));
        if let Some(description) = model.description.as_deref().filter(|d| !d.trim().is_empty())
        {
            body.push_str(&format!(
                "<pre class=\"description\">{}</pre>\n",
                escape_html(description.trim())
            ));
        }
        body.push_str(&stats_table(
            "Steps",
            &[(escape_html(&model.name), feature.stats(), feature.status())],
        ));
        for scenario in &feature.scenarios {
            body.push_str(&render_scenario(ctx, scenario));
        }
        Ok(page(ctx, &model.name, "../", &body))
    }

    fn render_tag(&self, ctx: &ReportContext<'_>, tag: &TagObject<'_>) -> Result<String> {
        let mut body = String::new();
        body.push_str(&format!(
            "<h2>{} {}</h2>\n",
            escape_html(&tag.name),
            status_badge(tag.status())
        ));
        body.push_str(&format!(
            "<p class=\"totals\">{} scenarios ({} failed)</p>\n",
            tag.scenarios.len(),
            tag.failed_scenarios()
        ));
        body.push_str(&stats_table(
            "Steps",
            &[(escape_html(&tag.name), tag.stats(), tag.status())],
        ));
        body.push_str("<table class=\"stats\">\n<thead><tr><th>Feature</th><th>Scenario</th><th>Steps</th><th>Duration</th><th>Status</th></tr></thead>\n<tbody>\n");
        for entry in &tag.scenarios {
            let stats = entry.scenario.stats();
            let feature_link = ctx
                .features
                .iter()
                .find(|feature| feature.feature.uri() == entry.feature_uri)
                .map(feature_page_path);
            let feature_cell = match feature_link {
                Some(link) => format!(
                    "<a href=\"../{}\">{}</a>",
                    escape_html(&link),
                    escape_html(entry.feature_name)
                ),
                None => escape_html(entry.feature_name),
            };
            body.push_str(&format!(
                "<tr><td>{feature_cell}</td><td>{scenario}</td><td>{total}</td><td>{duration}</td><td>{badge}</td></tr>\n",
                scenario = escape_html(&entry.scenario.scenario.name),
                total = stats.total,
                duration = escape_html(&stats.formatted_duration()),
                badge = status_badge(entry.scenario.status()),
            ));
        }
        body.push_str("</tbody>\n</table>\n");
        Ok(page(ctx, &tag.name, "../", &body))
    }

    fn render_overview(&self, ctx: &ReportContext<'_>) -> Result<String> {
        let summary = ctx.summary;
        let chart = serde_json::to_string(&ChartData::from(&summary.steps))
            .context("serialize chart data")?;
        let mut body = String::new();
        body.push_str(&format!(
            "<h2>Features {}</h2>\n",
            status_badge(summary.status())
        ));
        body.push_str(&format!(
            "<p class=\"totals\">{features} features ({failed_features} failed), {scenarios} scenarios ({failed_scenarios} failed), {steps} steps, {duration}</p>\n",
            features = summary.features,
            failed_features = summary.failed_features,
            scenarios = summary.scenarios,
            failed_scenarios = summary.failed_scenarios,
            steps = summary.steps.total,
            duration = escape_html(&summary.duration),
        ));
        body.push_str(&format!(
            "<script type=\"application/json\" id=\"chart-data\">{}</script>\n<div id=\"chart\"></div>\n",
            chart.replace("</", "<\\/")
        ));
        body.push_str(&render_verdict(ctx));
        let rows: Vec<_> = ctx
            .features
            .iter()
            .map(|feature| {
                (
                    format!(
                        "<a href=\"{}\">{}</a>",
                        escape_html(&feature_page_path(feature)),
                        escape_html(&feature.feature.name)
                    ),
                    feature.stats(),
                    feature.status(),
                )
            })
            .collect();
        body.push_str(&stats_table("Feature", &rows));
        Ok(page(ctx, "Features overview", "", &body))
    }

    fn render_tags_overview(&self, ctx: &ReportContext<'_>) -> Result<String> {
        let mut body = String::from("<h2>Tags</h2>\n");
        if ctx.tags.is_empty() {
            body.push_str("<p class=\"empty\">No tagged scenarios.</p>\n");
        } else {
            let rows: Vec<_> = ctx
                .tags
                .iter()
                .map(|tag| {
                    (
                        format!(
                            "<a href=\"{}\">{}</a>",
                            escape_html(&tag_page_path(tag)),
                            escape_html(&tag.name)
                        ),
                        tag.stats(),
                        tag.status(),
                    )
                })
                .collect();
            body.push_str(&stats_table("Tag", &rows));
        }
        Ok(page(ctx, "Tags overview", "", &body))
    }

    fn static_assets(&self) -> Vec<(&'static str, &'static str)> {
        vec![("css/style.css", REPORT_CSS), ("js/report.js", REPORT_JS)]
    }
}

fn page(ctx: &ReportContext<'_>, title: &str, prefix: &str, body: &str) -> String {
    let build = ctx
        .build_label
        .map(|label| format!(" <span class=\"build\">{}</span>", escape_html(label)))
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{project} - {title}</title>
<link rel="stylesheet" href="{prefix}css/style.css">
</head>
<body>
<header>
<h1>{project}{build}</h1>
<nav><a href="{prefix}{index}">Features</a> <a href="{prefix}{tags}">Tags</a></nav>
</header>
<main>
{body}</main>
<script src="{prefix}js/report.js"></script>
</body>
</html>
"#,
        project = escape_html(ctx.project_name),
        title = escape_html(title),
        index = escape_html(ctx.index_file),
        tags = TAGS_OVERVIEW_FILE,
    )
}

fn render_verdict(ctx: &ReportContext<'_>) -> String {
    if !ctx.verdict.failed() {
        return String::new();
    }
    let mut out = String::from("<div class=\"verdict failed\">\n<h3>Thresholds exceeded</h3>\n<ul>\n");
    for breach in &ctx.verdict.breaches {
        out.push_str(&format!("<li>{}</li>\n", escape_html(&breach.message())));
    }
    out.push_str("</ul>\n</div>\n");
    out
}

/// Table of per-status counts; `rows` carries pre-escaped label markup.
fn stats_table(label: &str, rows: &[(String, AggregateStats, Status)]) -> String {
    let mut out = format!(
        "<table class=\"stats sortable\">\n<thead><tr><th>{}</th>",
        escape_html(label)
    );
    for status in Status::ALL {
        out.push_str(&format!("<th>{}</th>", status.as_str()));
    }
    out.push_str("<th>total</th><th>duration</th><th>status</th></tr></thead>\n<tbody>\n");
    for (cell, stats, status) in rows {
        out.push_str(&format!("<tr><td>{cell}</td>"));
        for column in Status::ALL {
            out.push_str(&format!(
                "<td class=\"{}\">{}</td>",
                column.as_str(),
                stats.count(column)
            ));
        }
        out.push_str(&format!(
            "<td>{}</td><td data-sort=\"{}\">{}</td><td>{}</td></tr>\n",
            stats.total,
            stats.duration_ns,
            escape_html(&stats.formatted_duration()),
            status_badge(*status)
        ));
    }
    out.push_str("</tbody>\n</table>\n");
    out
}

fn render_scenario(ctx: &ReportContext<'_>, scenario: &ClassifiedScenario<'_>) -> String {
    let model = scenario.scenario;
    let class = if model.is_background() {
        "scenario background"
    } else {
        "scenario"
    };
    let mut out = format!(
        "<section class=\"{class}\">\n<h3 class=\"toggle\">{keyword}{name} {badge} <span class=\"duration\">{duration}</span></h3>\n",
        keyword = keyword_prefix(model.keyword.as_deref()),
        name = escape_html(&model.name),
        badge = status_badge(scenario.status()),
        duration = escape_html(&scenario.stats().formatted_duration()),
    );
    out.push_str(&render_tags(ctx, &model.tags, "../"));
    out.push_str(&render_hooks("before", &model.before));
    out.push_str("<ol class=\"steps\">\n");
    for step in &scenario.steps {
        out.push_str(&render_step(step));
    }
    out.push_str("</ol>\n");
    out.push_str(&render_hooks("after", &model.after));
    out.push_str("</section>\n");
    out
}

fn render_step(step: &ClassifiedStep<'_>) -> String {
    let outcome = step.outcome;
    let reported = if outcome.escalated() {
        format!(
            " <span class=\"reported\">(reported {})</span>",
            outcome.internal.as_str()
        )
    } else {
        String::new()
    };
    let mut out = format!(
        "<li class=\"step {status}\"><span class=\"keyword\">{keyword}</span>{name} {badge}{reported} <span class=\"duration\">{duration}</span>\n",
        status = outcome.final_status.as_str(),
        keyword = escape_html(&step.step.keyword),
        name = escape_html(&step.step.name),
        badge = status_badge(outcome.final_status),
        duration = escape_html(&crate::aggregate::format_duration(step.step.duration_ns())),
    );
    out.push_str(&render_rows(&step.step.rows));
    if let Some(message) = step.display_error() {
        out.push_str(&format!(
            "<pre class=\"error\">{}</pre>\n",
            escape_html(message)
        ));
    }
    out.push_str("</li>\n");
    out
}

fn render_rows(rows: &[Row]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    let mut out = String::from("<table class=\"data\">\n");
    for row in rows {
        out.push_str("<tr>");
        for cell in &row.cells {
            out.push_str(&format!("<td>{}</td>", escape_html(cell)));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</table>\n");
    out
}

fn render_hooks(label: &str, hooks: &[Hook]) -> String {
    if hooks.is_empty() {
        return String::new();
    }
    let mut out = format!("<ul class=\"hooks {label}\">\n");
    for hook in hooks {
        let status = hook.raw_status();
        let duration = hook
            .result
            .as_ref()
            .and_then(|result| result.duration)
            .unwrap_or(0);
        out.push_str(&format!(
            "<li class=\"{status}\">{label} hook: {status_text} <span class=\"duration\">{duration}</span>",
            status = escape_html(status),
            status_text = escape_html(status),
            duration = escape_html(&crate::aggregate::format_duration(duration)),
        ));
        if let Some(message) = hook
            .result
            .as_ref()
            .and_then(|result| result.error_message.as_deref())
        {
            out.push_str(&format!(
                "<pre class=\"error\">{}</pre>",
                escape_html(message)
            ));
        }
        out.push_str("</li>\n");
    }
    out.push_str("</ul>\n");
    out
}

/// Tag links resolve through the index so every spelling reaches the page
/// written for its tag.
fn render_tags(ctx: &ReportContext<'_>, tags: &[Tag], prefix: &str) -> String {
    if tags.is_empty() {
        return String::new();
    }
    let links: Vec<_> = tags
        .iter()
        .map(|tag| match ctx.tags.get(&tag.name) {
            Some(indexed) => format!(
                "<a class=\"tag\" href=\"{prefix}{}\">{}</a>",
                escape_html(&tag_page_path(indexed)),
                escape_html(tag.name.trim())
            ),
            None => format!("<span class=\"tag\">{}</span>", escape_html(tag.name.trim())),
        })
        .collect();
    format!("<p class=\"tags\">{}</p>\n", links.join(" "))
}

fn keyword_prefix(keyword: Option<&str>) -> String {
    keyword
        .map(str::trim)
        .filter(|keyword| !keyword.is_empty())
        .map(|keyword| format!("<span class=\"keyword\">{}:</span> ", escape_html(keyword)))
        .unwrap_or_default()
}

fn status_badge(status: Status) -> String {
    format!(
        "<span class=\"badge {status}\">{status}</span>",
        status = status.as_str()
    )
}
