//! Bounded text units sent to the summarization service.

use crate::types::NewsItem;
use crate::utils::text::{normalize_whitespace, truncate_chars};

const MAX_TITLE_CHARS: usize = 300;

pub const TITLE_PREFIX: &str = "Title: ";
pub const SNIPPET_PREFIX: &str = "Snippet: ";
pub const LINK_PREFIX: &str = "Link: ";

const FOCUS: &str = "Focus on technology, business strategy, and partnerships.";

/// Unit for a single item; the reply must be one JSON object.
pub fn item_unit(item: &NewsItem, max_item_chars: usize) -> String {
    format!(
        "Summarize this telecom news in English, Chinese, and Swedish.\n{FOCUS}\n\n{}\n\
         Return JSON only:\n{{\"english\": \"...\", \"chinese\": \"...\", \"swedish\": \"...\"}}\n",
        item_block(item, max_item_chars)
    )
}

/// Unit for several items; blocks are numbered from 1 and the reply must be
/// a JSON array carrying those numbers back as `index`.
pub fn batch_unit(items: &[NewsItem], max_item_chars: usize) -> String {
    let mut unit = format!(
        "Summarize each of the following telecom news items in English, Chinese, and Swedish.\n{FOCUS}\n\n"
    );
    for (position, item) in items.iter().enumerate() {
        unit.push_str(&format!("{}\n{}\n", batch_marker(position + 1), item_block(item, max_item_chars)));
    }
    unit.push_str(
        "Return JSON only: an array with one object per item, in the same order:\n\
         [{\"index\": 1, \"english\": \"...\", \"chinese\": \"...\", \"swedish\": \"...\"}]\n",
    );
    unit
}

pub fn batch_marker(index: usize) -> String {
    format!("[{}]", index)
}

fn item_block(item: &NewsItem, max_item_chars: usize) -> String {
    format!(
        "{TITLE_PREFIX}{}\n{SNIPPET_PREFIX}{}\n{LINK_PREFIX}{}\n",
        truncate_chars(&normalize_whitespace(&item.title), MAX_TITLE_CHARS),
        truncate_chars(&normalize_whitespace(&item.text), max_item_chars),
        item.link.trim()
    )
}
