//! Persisted record of which input indexes have already produced output.
//!
//! On-disk format: a single line of comma-separated decimal integers. The
//! file is replaced wholesale at the end of a run; there is no incremental
//! append. A crash mid-batch loses that run's completions, and recovery goes
//! through the cache or failure tables on the next run.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the completed-index set. A missing or blank file is an empty set;
    /// an unparseable token is an error, not silently dropped state.
    pub async fn load(&self) -> Result<BTreeSet<usize>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(BTreeSet::new());
        }

        let content = fs::read_to_string(&self.path).await?;
        let content = content.trim();
        if content.is_empty() {
            return Ok(BTreeSet::new());
        }

        content
            .split(',')
            .map(|token| {
                let token = token.trim();
                token
                    .parse::<usize>()
                    .map_err(|source| OrchestratorError::CheckpointParse {
                        token: token.to_string(),
                        source,
                    })
            })
            .collect()
    }

    /// Overwrite the file with the full completed-index set.
    pub async fn save(&self, completed: &BTreeSet<usize>) -> Result<()> {
        let line = completed
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        fs::write(&self.path, line).await?;
        debug!(path = %self.path.display(), count = completed.len(), "Checkpoint saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn store_in(dir: &TempDir) -> CheckpointStore {
        CheckpointStore::new(dir.path().join("checkpoint.txt"))
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_set() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_file_is_empty_set() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "  \n").unwrap();

        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let set: BTreeSet<usize> = [0, 3, 17, 256].into_iter().collect();

        store.save(&set).await.unwrap();

        assert_eq!(store.load().await.unwrap(), set);
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_content() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.save(&[1, 2, 3].into_iter().collect()).await.unwrap();
        store.save(&[9].into_iter().collect()).await.unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content, "9");
    }

    #[tokio::test]
    async fn test_malformed_token_is_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "1,banana,3").unwrap();

        assert!(matches!(
            store.load().await,
            Err(OrchestratorError::CheckpointParse { .. })
        ));
    }
}
