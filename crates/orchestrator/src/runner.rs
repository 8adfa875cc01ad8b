//! Bounded-concurrency dispatch of generation tasks.

use std::collections::BTreeSet;

use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use innervoice_core::{FailureRecord, GenerationRecord};
use kimi_client::ChatModel;
use tracing::info;

use crate::checkpoint::CheckpointStore;
use crate::error::Result;
use crate::task;

pub const DEFAULT_CONCURRENCY: usize = 5;

/// What one batch run produced: successes for the output table and this
/// run's unresolved inputs for the failure table.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub records: Vec<GenerationRecord>,
    pub failures: Vec<FailureRecord>,
}

pub struct BatchRunner<'a, C: ChatModel> {
    client: &'a C,
    checkpoint: &'a CheckpointStore,
    concurrency: usize,
}

impl<'a, C: ChatModel> BatchRunner<'a, C> {
    pub fn new(client: &'a C, checkpoint: &'a CheckpointStore, concurrency: usize) -> Self {
        Self {
            client,
            checkpoint,
            concurrency: concurrency.max(1),
        }
    }

    /// Process `affirmations`, skipping indexes already checkpointed.
    ///
    /// Index = position + `start_index`. With `bypass` set the checkpoint is
    /// neither consulted nor updated, so a retry run cannot disturb the main
    /// resumption state.
    pub async fn run(
        &self,
        affirmations: &[String],
        start_index: usize,
        bypass: bool,
    ) -> Result<BatchOutcome> {
        let mut completed = if bypass {
            BTreeSet::new()
        } else {
            self.checkpoint.load().await?
        };

        let pending: Vec<(usize, &str)> = affirmations
            .iter()
            .enumerate()
            .map(|(offset, sentence)| (offset + start_index, sentence.as_str()))
            .filter(|(index, _)| !completed.contains(index))
            .collect();

        info!(
            total = affirmations.len(),
            pending = pending.len(),
            bypass,
            "Starting batch run"
        );

        if pending.is_empty() {
            info!("All inputs already checkpointed, nothing to dispatch");
            return Ok(BatchOutcome::default());
        }

        let progress = ProgressBar::new(pending.len() as u64);
        let mut outcome = BatchOutcome::default();

        let mut tasks = stream::iter(pending)
            .map(|(index, affirmation)| task::run_task(self.client, index, affirmation))
            .buffer_unordered(self.concurrency);

        // Single collector; completions arrive in whatever order the pool
        // yields them, keyed by index rather than position.
        while let Some(task_outcome) = tasks.next().await {
            match task_outcome.record {
                Some(record) => {
                    completed.insert(task_outcome.index);
                    outcome.records.push(record);
                }
                None => {
                    let affirmation = affirmations[task_outcome.index - start_index].clone();
                    outcome.failures.push(FailureRecord::new(affirmation));
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        if !bypass {
            self.checkpoint.save(&completed).await?;
        }

        info!(
            succeeded = outcome.records.len(),
            failed = outcome.failures.len(),
            "Batch run finished"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use kimi_client::ChatMessage;
    use tempfile::TempDir;

    use super::*;

    /// Succeeds on both stages unless the conversation mentions "FAIL",
    /// in which case the draft reply is not JSON.
    struct EchoModel {
        calls: AtomicUsize,
    }

    impl EchoModel {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatModel for EchoModel {
        async fn send(&self, messages: &[ChatMessage]) -> kimi_client::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if messages.iter().any(|m| m.content.contains("FAIL")) {
                Ok("nothing useful".to_string())
            } else {
                Ok(r#"{"inner_monologue":"叙述文本"}"#.to_string())
            }
        }

        fn model_name(&self) -> &str {
            "test-model"
        }
    }

    fn sentences(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_fully_checkpointed_run_dispatches_nothing() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("checkpoint.txt"));
        store.save(&[0, 1, 2].into_iter().collect()).await.unwrap();

        let model = EchoModel::new();
        let runner = BatchRunner::new(&model, &store, 2);
        let outcome = runner.run(&sentences(&["a", "b", "c"]), 0, false).await.unwrap();

        assert!(outcome.records.is_empty());
        assert!(outcome.failures.is_empty());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_successes_and_failures_are_exhaustive() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("checkpoint.txt"));

        let model = EchoModel::new();
        let runner = BatchRunner::new(&model, &store, 3);
        let inputs = sentences(&["好句子一", "FAIL 的句子", "好句子二"]);
        let outcome = runner.run(&inputs, 0, false).await.unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].affirmation, "FAIL 的句子");

        // Only the successes are checkpointed.
        let expected: BTreeSet<usize> = [0, 2].into_iter().collect();
        assert_eq!(store.load().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_checkpoint_filters_and_accumulates() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("checkpoint.txt"));
        store.save(&[1].into_iter().collect()).await.unwrap();

        let model = EchoModel::new();
        let runner = BatchRunner::new(&model, &store, 2);
        let outcome = runner.run(&sentences(&["a", "b", "c"]), 0, false).await.unwrap();

        // Index 1 skipped, two tasks at two calls each.
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(model.calls.load(Ordering::SeqCst), 4);
        let expected: BTreeSet<usize> = [0, 1, 2].into_iter().collect();
        assert_eq!(store.load().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_bypass_ignores_and_preserves_checkpoint() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("checkpoint.txt"));
        store.save(&[0].into_iter().collect()).await.unwrap();
        let before = std::fs::read_to_string(store.path()).unwrap();

        let model = EchoModel::new();
        let runner = BatchRunner::new(&model, &store, 2);
        let outcome = runner.run(&sentences(&["a"]), 0, true).await.unwrap();

        // Index 0 is re-processed despite the checkpoint, and the file is
        // byte-for-byte untouched afterwards.
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn test_start_index_offsets_checkpoint_keys() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("checkpoint.txt"));
        store.save(&[10].into_iter().collect()).await.unwrap();

        let model = EchoModel::new();
        let runner = BatchRunner::new(&model, &store, 2);
        let outcome = runner.run(&sentences(&["a", "b"]), 10, false).await.unwrap();

        // Position 0 maps to index 10, which is checkpointed.
        assert_eq!(outcome.records.len(), 1);
        let expected: BTreeSet<usize> = [10, 11].into_iter().collect();
        assert_eq!(store.load().await.unwrap(), expected);
    }
}
