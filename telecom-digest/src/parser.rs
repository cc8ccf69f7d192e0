use std::collections::HashSet;

use feed_rs::parser;
use tracing::debug;

use crate::types::{DigestError, NewsItem, Result};
use crate::utils::text::normalize_whitespace;
use crate::utils::url::canonical_link;

/// Turns RSS/Atom documents (company newsroom feeds) into news items.
#[derive(Default)]
pub struct FeedParser;

impl FeedParser {
    pub fn new() -> Self {
        Self
    }

    /// Entries without a link are skipped; repeated links keep the first entry.
    pub fn parse_items(&self, content: &str) -> Result<Vec<NewsItem>> {
        let feed = parser::parse(content.as_bytes())
            .map_err(|e| DigestError::Parse(format!("Failed to parse feed: {}", e)))?;

        let mut seen_ids = HashSet::new();
        let mut items = Vec::new();

        for entry in feed.entries {
            let Some(link) = entry.links.first().map(|l| l.href.clone()) else {
                debug!("Skipping feed entry without link: {}", entry.id);
                continue;
            };

            let id = canonical_link(&link);
            if !seen_ids.insert(id.clone()) {
                debug!("Skipping duplicate entry: {}", id);
                continue;
            }

            let title = entry
                .title
                .map(|t| normalize_whitespace(&t.content))
                .unwrap_or_else(|| "Untitled".to_string());
            let text = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .map(|raw| normalize_whitespace(&strip_tags(&raw)))
                .unwrap_or_default();

            let mut item = NewsItem::new(id, title, link).with_text(text);
            item.published_at = entry.published.or(entry.updated);
            items.push(item);
        }

        debug!("Parsed feed with {} entries", items.len());
        Ok(items)
    }
}

/// Drop markup from feed summaries, keeping the text between tags.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    // `&amp;` last, so escaped entities such as `&amp;lt;` decode only once.
    out.replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
