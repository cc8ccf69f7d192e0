//! Structured decode of raw summarization payloads.
//!
//! A payload either decodes into well-typed summaries or yields
//! [`DigestError::MalformedOutput`]; nothing is scraped best-effort.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::types::{DigestError, Result, Summary};

#[derive(Debug, Clone, Deserialize)]
struct LanguagePayload {
    english: String,
    chinese: String,
    swedish: String,
}

impl LanguagePayload {
    fn into_summary(self, item_id: &str) -> Result<Summary> {
        for (language, value) in [("english", &self.english), ("chinese", &self.chinese), ("swedish", &self.swedish)] {
            if value.trim().is_empty() {
                return Err(DigestError::MalformedOutput(format!("empty {} summary", language)));
            }
        }
        Ok(Summary {
            item_id: item_id.to_string(),
            english: self.english.trim().to_string(),
            chinese: self.chinese.trim().to_string(),
            swedish: self.swedish.trim().to_string(),
        })
    }
}

/// Decode the reply to a single-item unit.
pub fn decode_single(raw: &str, item_id: &str) -> Result<Summary> {
    let json = extract_json(raw, '{', '}')
        .ok_or_else(|| DigestError::MalformedOutput("no JSON object in reply".to_string()))?;
    let payload: LanguagePayload = serde_json::from_str(json)
        .map_err(|e| DigestError::MalformedOutput(format!("unexpected reply shape: {}", e)))?;
    payload.into_summary(item_id)
}

/// Decode the reply to a batch unit for the given item ids, in unit order.
///
/// The outer `Err` means the whole reply is unusable. Otherwise every id
/// gets its own result: an entry that is missing, duplicated or incomplete
/// fails only that item. Entries without a numeric `index` are ignored.
pub fn decode_batch(raw: &str, item_ids: &[&str]) -> Result<Vec<Result<Summary>>> {
    let json = extract_json(raw, '[', ']')
        .ok_or_else(|| DigestError::MalformedOutput("no JSON array in reply".to_string()))?;
    let entries: Vec<Value> = serde_json::from_str(json)
        .map_err(|e| DigestError::MalformedOutput(format!("unexpected reply shape: {}", e)))?;

    let mut by_index: HashMap<usize, Option<Value>> = HashMap::new();
    for entry in entries {
        let Some(index) = entry.get("index").and_then(Value::as_u64) else {
            continue;
        };
        by_index
            .entry(index as usize)
            .and_modify(|slot| *slot = None)
            .or_insert(Some(entry));
    }

    Ok(item_ids
        .iter()
        .enumerate()
        .map(|(position, item_id)| match by_index.remove(&(position + 1)) {
            Some(Some(entry)) => serde_json::from_value::<LanguagePayload>(entry)
                .map_err(|e| DigestError::MalformedOutput(format!("entry {}: {}", position + 1, e)))
                .and_then(|payload| payload.into_summary(item_id)),
            Some(None) => Err(DigestError::MalformedOutput(format!("duplicate entries for index {}", position + 1))),
            None => Err(DigestError::MalformedOutput(format!("no entry for index {}", position + 1))),
        })
        .collect())
}

/// Locate the JSON value in a reply, looking inside a markdown code fence first.
fn extract_json(raw: &str, open: char, close: char) -> Option<&str> {
    let body = strip_code_fence(raw).unwrap_or(raw);
    let start = body.find(open)?;
    let end = body.rfind(close)?;
    (end > start).then(|| &body[start..=end])
}

fn strip_code_fence(raw: &str) -> Option<&str> {
    let start = raw.find("```")?;
    let after = &raw[start + 3..];
    let body = &after[after.find('\n')? + 1..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}
