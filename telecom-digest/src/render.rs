use std::fmt::Write;

use chrono::{DateTime, Utc};
use url::Url;

use crate::types::{RenderError, ReportConfig, ReportEntry, ReportRenderer, SummaryOutcome};

const STYLE: &str = "body { font-family: Arial, sans-serif; line-height: 1.6; padding: 20px; }
h1 { color: #2E86C1; }
.news-item { margin-bottom: 20px; }
.news-item a { text-decoration: none; color: #1B4F72; }
.news-item a:hover { text-decoration: underline; }
.update-time { font-size: 0.9em; color: gray; margin-bottom: 20px; }
.unavailable { color: #922B21; font-style: italic; }";

/// Renders the run's entries as a standalone, auto-refreshing HTML page.
pub struct HtmlReportRenderer {
    title: String,
    refresh_seconds: u32,
}

impl Default for HtmlReportRenderer {
    fn default() -> Self {
        Self::from_config(&ReportConfig::default())
    }
}

impl HtmlReportRenderer {
    pub fn new(title: impl Into<String>, refresh_seconds: u32) -> Self {
        Self {
            title: title.into(),
            refresh_seconds,
        }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(config.title.clone(), config.refresh_seconds)
    }

    fn write_document(&self, out: &mut String, entries: &[ReportEntry], generated_at: DateTime<Utc>) -> std::fmt::Result {
        let title = escape_html(&self.title);

        writeln!(out, "<!DOCTYPE html>")?;
        writeln!(out, "<html>")?;
        writeln!(out, "<head>")?;
        writeln!(out, "<meta charset=\"UTF-8\">")?;
        writeln!(out, "<title>{}</title>", title)?;
        if self.refresh_seconds > 0 {
            writeln!(out, "<meta http-equiv=\"refresh\" content=\"{}\">", self.refresh_seconds)?;
        }
        writeln!(out, "<style>\n{}\n</style>", STYLE)?;
        writeln!(out, "</head>")?;
        writeln!(out, "<body>")?;
        writeln!(out, "<h1>{}</h1>", title)?;
        writeln!(
            out,
            "<div class=\"update-time\">Last updated: {}</div>",
            generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;

        for entry in entries {
            writeln!(out, "<div class=\"news-item\">")?;
            match web_link(&entry.item.link) {
                Some(href) => writeln!(
                    out,
                    "<h3><a href=\"{}\" target=\"_blank\">{}</a></h3>",
                    escape_attr(&href),
                    escape_html(&entry.item.title)
                )?,
                None => writeln!(out, "<h3>{}</h3>", escape_html(&entry.item.title))?,
            }
            match &entry.outcome {
                SummaryOutcome::Summarized(summary) => {
                    writeln!(out, "<p><strong>EN:</strong> {}</p>", escape_html(&summary.english))?;
                    writeln!(out, "<p><strong>ZH:</strong> {}</p>", escape_html(&summary.chinese))?;
                    writeln!(out, "<p><strong>SV:</strong> {}</p>", escape_html(&summary.swedish))?;
                }
                SummaryOutcome::Failed(marker) => {
                    writeln!(
                        out,
                        "<p class=\"unavailable\">Summary unavailable: {}</p>",
                        escape_html(&marker.reason)
                    )?;
                }
            }
            writeln!(out, "</div>\n<hr>")?;
        }

        writeln!(out, "</body>")?;
        writeln!(out, "</html>")
    }
}

impl ReportRenderer for HtmlReportRenderer {
    fn render(&self, entries: &[ReportEntry], generated_at: DateTime<Utc>) -> Result<Vec<u8>, RenderError> {
        let mut out = String::with_capacity(1024 + entries.len() * 512);
        self.write_document(&mut out, entries, generated_at)
            .map_err(|e| RenderError(format!("formatting failed: {}", e)))?;
        Ok(out.into_bytes())
    }
}

/// Only http(s) links become anchors.
fn web_link(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn escape_attr(text: &str) -> String {
    escape_html(text).replace('"', "&quot;").replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FailureMarker, NewsItem, Summary};
    use chrono::TimeZone;

    fn render(entries: &[ReportEntry]) -> String {
        let at = Utc.with_ymd_and_hms(2025, 9, 1, 12, 30, 0).unwrap();
        String::from_utf8(HtmlReportRenderer::default().render(entries, at).unwrap()).unwrap()
    }

    #[test]
    fn summarized_entry_has_three_languages() {
        let html = render(&[ReportEntry {
            item: NewsItem::new("a", "Ericsson & Vodafone", "https://e.example/a"),
            outcome: SummaryOutcome::Summarized(Summary {
                item_id: "a".into(),
                english: "Partnership expands".into(),
                chinese: "合作扩大".into(),
                swedish: "Partnerskapet utökas".into(),
            }),
        }]);

        assert!(html.contains("<meta http-equiv=\"refresh\" content=\"1800\">"));
        assert!(html.contains("Last updated: 2025-09-01 12:30:00 UTC"));
        assert!(html.contains("Ericsson &amp; Vodafone"));
        assert!(html.contains("<p><strong>ZH:</strong> 合作扩大</p>"));
        assert!(html.contains("<p><strong>SV:</strong> Partnerskapet utökas</p>"));
    }

    #[test]
    fn failed_entry_shows_placeholder() {
        let html = render(&[ReportEntry {
            item: NewsItem::new("b", "Nokia", "https://n.example/b"),
            outcome: SummaryOutcome::Failed(FailureMarker {
                item_id: "b".into(),
                reason: "retries exhausted".into(),
            }),
        }]);
        assert!(html.contains("Summary unavailable: retries exhausted"));
        assert!(!html.contains("<strong>EN:</strong>"));
    }

    #[test]
    fn item_text_cannot_inject_markup() {
        let html = render(&[ReportEntry {
            item: NewsItem::new("x", "<script>alert(1)</script>", "https://x.example/\"onclick=\"x"),
            outcome: SummaryOutcome::Failed(FailureMarker {
                item_id: "x".into(),
                reason: "<b>".into(),
            }),
        }]);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("onclick=\""));
    }

    #[test]
    fn non_web_links_render_as_plain_titles() {
        let html = render(&[ReportEntry {
            item: NewsItem::new("j", "Click me", "javascript:alert(document.cookie)"),
            outcome: SummaryOutcome::Failed(FailureMarker {
                item_id: "j".into(),
                reason: "x".into(),
            }),
        }]);
        assert!(!html.contains("javascript:"));
        assert!(!html.contains("<a href"));
        assert!(html.contains("<h3>Click me</h3>"));
    }

    #[test]
    fn zero_refresh_omits_meta_refresh() {
        let html = HtmlReportRenderer::new("T", 0).render(&[], Utc::now()).unwrap();
        assert!(!String::from_utf8(html).unwrap().contains("http-equiv"));
    }
}
