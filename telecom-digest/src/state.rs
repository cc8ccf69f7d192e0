use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use tracing::{debug, info, warn};

use crate::types::Result;
use crate::utils::fs::atomic_write;

/// Ids of every item already processed, in the order they were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenSet {
    ids: IndexSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns `false` when the id was already present.
    pub fn add(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for SeenSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// File-backed persistence for the [`SeenSet`].
///
/// The file is a JSON array of ids. It is the pipeline's only durable state.
pub struct SeenSetStore {
    path: PathBuf,
}

impl SeenSetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted set. Missing or unreadable state yields an empty set.
    pub async fn load(&self) -> SeenSet {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No seen-set at {}, starting empty", self.path.display());
                return SeenSet::new();
            }
            Err(e) => {
                warn!("Seen-set at {} unreadable ({}), treating as empty", self.path.display(), e);
                return SeenSet::new();
            }
        };

        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(ids) => {
                let seen: SeenSet = ids.into_iter().collect();
                debug!("Loaded {} seen ids from {}", seen.len(), self.path.display());
                seen
            }
            Err(e) => {
                warn!("Seen-set at {} is corrupt ({}), treating as empty", self.path.display(), e);
                SeenSet::new()
            }
        }
    }

    /// Replace the persisted set with `seen`, atomically.
    pub async fn flush(&self, seen: &SeenSet) -> Result<()> {
        let ids: Vec<&str> = seen.iter().collect();
        let bytes = serde_json::to_vec_pretty(&ids)?;
        atomic_write(&self.path, &bytes).await?;
        debug!("Flushed {} seen ids to {}", seen.len(), self.path.display());
        Ok(())
    }
}
