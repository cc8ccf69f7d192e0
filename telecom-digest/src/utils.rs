/// Text processing utilities
pub mod text {
    /// Truncate to at most `max_chars` characters, preferring a word boundary.
    ///
    /// Deterministic: the same input always yields the same output. The cut is
    /// moved back to the last whitespace only when that keeps at least half of
    /// the window; truncated text ends with `...`.
    pub fn truncate_chars(text: &str, max_chars: usize) -> String {
        let text = text.trim();
        if text.chars().count() <= max_chars {
            return text.to_string();
        }

        let window: String = text.chars().take(max_chars).collect();
        let cut = match window.rfind(char::is_whitespace) {
            Some(idx) if window[..idx].chars().count() >= max_chars / 2 => &window[..idx],
            _ => window.as_str(),
        };
        format!("{}...", cut.trim_end())
    }

    /// Collapse runs of whitespace (including newlines) into single spaces.
    pub fn normalize_whitespace(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Case-insensitive match of any keyword against the haystacks.
    pub fn matches_any_keyword(keywords: &[String], haystacks: &[&str]) -> bool {
        if keywords.is_empty() {
            return true;
        }
        let lowered: Vec<String> = haystacks.iter().map(|h| h.to_lowercase()).collect();
        keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .any(|k| lowered.iter().any(|h| h.contains(&k)))
    }

    /// Split an `a OR b OR c` search query back into its keywords.
    pub fn query_keywords(query: &str) -> Vec<String> {
        query
            .split(" OR ")
            .map(|k| k.trim().trim_matches('"').to_string())
            .filter(|k| !k.is_empty())
            .collect()
    }
}

/// URL utilities
pub mod url {
    use url::Url;

    /// Stable identifier for an article link.
    ///
    /// Drops the fragment and `utm_*` tracking parameters so the same article
    /// reached through different campaigns dedups to one id. Unparseable links
    /// are returned trimmed.
    pub fn canonical_link(raw: &str) -> String {
        let trimmed = raw.trim();
        let mut url = match Url::parse(trimmed) {
            Ok(url) => url,
            Err(_) => return trimmed.to_string(),
        };

        url.set_fragment(None);

        let has_tracking = url.query_pairs().any(|(key, _)| key.starts_with("utm_"));
        if has_tracking {
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(key, _)| !key.starts_with("utm_"))
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect();
            if kept.is_empty() {
                url.set_query(None);
            } else {
                url.query_pairs_mut().clear().extend_pairs(kept);
            }
        }

        url.to_string()
    }
}

/// Crash-safe file replacement
pub mod fs {
    use std::path::{Path, PathBuf};

    use tokio::io::AsyncWriteExt;

    use crate::types::{DigestError, Result};

    /// Sibling path a file is staged at before it replaces the original.
    pub fn temp_path(path: &Path) -> PathBuf {
        let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        path.with_file_name(name)
    }

    /// Replace `path` with `bytes` so readers see either the old or the new
    /// content, never a partial write: stage in a sibling temp file, fsync,
    /// then rename over the target.
    pub async fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
        let persist_err = |source: std::io::Error| DigestError::Persist {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(persist_err)?;
        }

        let tmp = temp_path(path);
        let mut file = tokio::fs::File::create(&tmp).await.map_err(persist_err)?;
        file.write_all(bytes).await.map_err(persist_err)?;
        file.sync_all().await.map_err(persist_err)?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(persist_err(e));
        }
        Ok(())
    }
}
