//! Two-phase signed-URL uploads.
//!
//! Each file first obtains a write URL for its target key, then PUTs its
//! bytes to that URL. Files run either one at a time or in fixed-size batches
//! whose members are polled together; a batch must fully settle before the
//! next one starts. Every input file yields exactly one [`UploadResult`], and
//! a failing file never stops its siblings. Nothing is retried.

use super::{Gateway, GatewayResult};
use crate::models::listing::upload_key;
use anyhow::{Context, Result};
use bytes::Bytes;
use futures::{StreamExt, stream::FuturesUnordered};
use serde::Serialize;
use std::{path::Path, sync::Arc, time::Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_BATCH_SIZE: usize = 3;

/// Progress callback: `(completed, total)` after every file.
pub type ProgressFn<'a> = dyn Fn(usize, usize) + Send + Sync + 'a;

/// A file selected for upload.
#[derive(Clone, Debug)]
pub struct LocalFile {
    pub name: String,
    pub bytes: Bytes,
    /// Declared MIME type, sent as `Content-Type` on the transfer.
    pub content_type: String,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("no usable file name in {}", path.display()))?
            .to_string();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self::new(name, bytes, content_type))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// A file bound to the key it will be written to.
#[derive(Clone, Debug)]
pub struct UploadTask {
    file: LocalFile,
    target_key: String,
}

impl UploadTask {
    /// Target `prefix + file name`; a non-empty prefix must end in `/`.
    pub fn new(file: LocalFile, prefix: &str) -> Self {
        let target_key = upload_key(prefix, &file.name);
        Self { file, target_key }
    }

    pub fn file(&self) -> &LocalFile {
        &self.file
    }

    pub fn target_key(&self) -> &str {
        &self.target_key
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub file_name: String,
    pub status: UploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub elapsed_ms: u64,
}

impl UploadResult {
    pub fn is_success(&self) -> bool {
        self.status == UploadStatus::Success
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum UploadMode {
    /// One file at a time, results in input order.
    #[default]
    Sequential,
    /// Batches of `batch_size` files in flight together.
    Concurrent { batch_size: usize },
}

impl UploadMode {
    /// Concurrent mode; a zero batch size is treated as one.
    pub fn concurrent(batch_size: usize) -> Self {
        UploadMode::Concurrent {
            batch_size: batch_size.max(1),
        }
    }
}

#[derive(Clone)]
pub struct UploadOrchestrator {
    gateway: Arc<dyn Gateway>,
}

impl UploadOrchestrator {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    /// Upload every task and return one result per task.
    pub async fn upload(
        &self,
        tasks: Vec<UploadTask>,
        mode: UploadMode,
        progress: Option<&ProgressFn<'_>>,
    ) -> Vec<UploadResult> {
        let results = match mode {
            UploadMode::Sequential => self.upload_sequential(tasks, progress).await,
            UploadMode::Concurrent { batch_size } => {
                self.upload_concurrent(tasks, batch_size.max(1), progress)
                    .await
            }
        };

        let failed = results.iter().filter(|r| !r.is_success()).count();
        info!(
            total = results.len(),
            succeeded = results.len() - failed,
            failed,
            "upload finished"
        );
        results
    }

    async fn upload_sequential(
        &self,
        tasks: Vec<UploadTask>,
        progress: Option<&ProgressFn<'_>>,
    ) -> Vec<UploadResult> {
        let total = tasks.len();
        info!(total, "starting sequential upload");

        let mut results = Vec::with_capacity(total);
        for task in &tasks {
            let result = self.upload_one(task).await;
            results.push(result);
            if let Some(progress) = progress {
                progress(results.len(), total);
            }
        }
        results
    }

    /// Within a batch results are appended as they complete; batches
    /// themselves run in submission order.
    async fn upload_concurrent(
        &self,
        tasks: Vec<UploadTask>,
        batch_size: usize,
        progress: Option<&ProgressFn<'_>>,
    ) -> Vec<UploadResult> {
        let total = tasks.len();
        info!(total, batch_size, "starting concurrent upload");

        let mut results = Vec::with_capacity(total);
        for (index, batch) in tasks.chunks(batch_size).enumerate() {
            debug!(batch = index, size = batch.len(), "starting batch");
            let mut in_flight: FuturesUnordered<_> =
                batch.iter().map(|task| self.upload_one(task)).collect();

            while let Some(result) = in_flight.next().await {
                results.push(result);
                if let Some(progress) = progress {
                    progress(results.len(), total);
                }
            }
            debug!(batch = index, "batch settled");
        }
        results
    }

    /// Run both phases for one file. Never fails: errors become an
    /// `Error` result carrying the failure message.
    async fn upload_one(&self, task: &UploadTask) -> UploadResult {
        let started = Instant::now();
        let outcome = self.transfer(task).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => {
                debug!(key = task.target_key(), elapsed_ms, "uploaded");
                UploadResult {
                    file_name: task.file.name.clone(),
                    status: UploadStatus::Success,
                    error_message: None,
                    elapsed_ms,
                }
            }
            Err(err) => {
                warn!(key = task.target_key(), elapsed_ms, error = %err, "upload failed");
                UploadResult {
                    file_name: task.file.name.clone(),
                    status: UploadStatus::Error,
                    error_message: Some(err.to_string()),
                    elapsed_ms,
                }
            }
        }
    }

    async fn transfer(&self, task: &UploadTask) -> GatewayResult<()> {
        let url = self.gateway.request_upload_url(task.target_key()).await?;
        self.gateway
            .put_signed(&url, task.file.bytes.clone(), &task.file.content_type)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::FakeGateway;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    fn text_file(name: &str, len: usize) -> LocalFile {
        LocalFile::new(name, vec![b'x'; len], "text/plain")
    }

    fn tasks(names: &[&str], prefix: &str) -> Vec<UploadTask> {
        names
            .iter()
            .map(|name| UploadTask::new(text_file(name, 4), prefix))
            .collect()
    }

    fn names(results: &[UploadResult]) -> Vec<&str> {
        results.iter().map(|r| r.file_name.as_str()).collect()
    }

    #[test]
    fn test_task_target_key() {
        assert_eq!(UploadTask::new(text_file("a.txt", 1), "docs/").target_key(), "docs/a.txt");
        assert_eq!(UploadTask::new(text_file("a.txt", 1), "").target_key(), "a.txt");
    }

    #[test]
    fn test_concurrent_mode_clamps_zero_batch() {
        assert_eq!(UploadMode::concurrent(0), UploadMode::Concurrent { batch_size: 1 });
        assert_eq!(UploadMode::default(), UploadMode::Sequential);
    }

    #[tokio::test]
    async fn test_sequential_upload_to_prefix() {
        let gateway = Arc::new(FakeGateway::default());
        let orchestrator = UploadOrchestrator::new(gateway.clone());
        let tasks = vec![
            UploadTask::new(text_file("a.txt", 10), "docs/"),
            UploadTask::new(text_file("b.txt", 20), "docs/"),
        ];

        let results = orchestrator.upload(tasks, UploadMode::Sequential, None).await;

        assert_eq!(names(&results), vec!["a.txt", "b.txt"]);
        assert!(results.iter().all(UploadResult::is_success));
        let puts = gateway.puts.lock().clone();
        assert_eq!(
            puts,
            vec![
                ("docs/a.txt".to_string(), "text/plain".to_string()),
                ("docs/b.txt".to_string(), "text/plain".to_string()),
            ]
        );
        assert_eq!(gateway.objects.lock().get("docs/a.txt"), Some(&10));
        assert_eq!(gateway.objects.lock().get("docs/b.txt"), Some(&20));
    }

    #[tokio::test]
    async fn test_sequential_keeps_input_order_and_reports_progress() {
        let gateway = Arc::new(FakeGateway::default());
        gateway.failing_put_keys.lock().insert("b".into());
        let orchestrator = UploadOrchestrator::new(gateway.clone());

        let seen = Mutex::new(Vec::new());
        let progress = |done: usize, total: usize| seen.lock().push((done, total));
        let results = orchestrator
            .upload(tasks(&["c", "b", "a", "d"], ""), UploadMode::Sequential, Some(&progress))
            .await;

        assert_eq!(names(&results), vec!["c", "b", "a", "d"]);
        assert_eq!(
            results.iter().map(|r| r.status).collect::<Vec<_>>(),
            vec![
                UploadStatus::Success,
                UploadStatus::Error,
                UploadStatus::Success,
                UploadStatus::Success
            ]
        );
        assert_eq!(*seen.lock(), vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    }

    #[tokio::test]
    async fn test_upload_url_failure_skips_transfer() {
        let gateway = Arc::new(FakeGateway::default());
        gateway.failing_url_keys.lock().insert("docs/bad.txt".into());
        let orchestrator = UploadOrchestrator::new(gateway.clone());

        let results = orchestrator
            .upload(tasks(&["bad.txt", "good.txt"], "docs/"), UploadMode::Sequential, None)
            .await;

        assert_eq!(results[0].status, UploadStatus::Error);
        let message = results[0].error_message.as_deref().unwrap();
        assert!(message.contains("get upload URL for docs/bad.txt"), "{}", message);
        assert!(message.contains("403"), "{}", message);
        assert!(results[1].is_success());
        assert_eq!(gateway.puts.lock().len(), 1);
        assert!(!gateway.objects.lock().contains_key("docs/bad.txt"));
    }

    #[tokio::test]
    async fn test_concurrent_returns_one_result_per_file() {
        let gateway = Arc::new(FakeGateway::default());
        gateway.failing_put_keys.lock().insert("x3".into());
        gateway.failing_url_keys.lock().insert("x5".into());
        let orchestrator = UploadOrchestrator::new(gateway.clone());

        let input = ["x1", "x2", "x3", "x4", "x5", "x6", "x7", "x1"];
        let count = Mutex::new(0usize);
        let progress = |done: usize, total: usize| {
            assert_eq!(total, 8);
            *count.lock() = done;
        };
        let results = orchestrator
            .upload(tasks(&input, ""), UploadMode::concurrent(3), Some(&progress))
            .await;

        let mut got = names(&results);
        got.sort();
        let mut expected = input.to_vec();
        expected.sort();
        assert_eq!(got, expected);
        assert_eq!(*count.lock(), 8);

        let errors: HashMap<_, _> = results
            .iter()
            .map(|r| (r.file_name.as_str(), r.status))
            .collect();
        assert_eq!(errors["x3"], UploadStatus::Error);
        assert_eq!(errors["x5"], UploadStatus::Error);
        assert_eq!(errors["x4"], UploadStatus::Success);
    }

    #[tokio::test]
    async fn test_concurrent_batches_are_barriers() {
        let gateway = Arc::new(FakeGateway::default());
        // First file of each batch is the slow one.
        gateway.put_delays_ms.lock().insert("f1".into(), 30);
        gateway.put_delays_ms.lock().insert("f3".into(), 30);
        gateway.failing_put_keys.lock().insert("f2".into());
        let orchestrator = UploadOrchestrator::new(gateway.clone());

        let results = orchestrator
            .upload(
                tasks(&["f1", "f2", "f3", "f4", "f5"], ""),
                UploadMode::concurrent(2),
                None,
            )
            .await;
        assert_eq!(results.len(), 5);

        let events = gateway.events.lock().clone();
        let position = |event: &str| events.iter().position(|e| e == event).unwrap();

        // Batches [f1,f2], [f3,f4], [f5].
        for later in ["start:f3", "start:f4", "start:f5"] {
            assert!(position(later) > position("end:f1"), "{:?}", events);
            assert!(position(later) > position("end:f2"), "{:?}", events);
        }
        assert!(position("start:f5") > position("end:f3"), "{:?}", events);
        assert!(position("start:f5") > position("end:f4"), "{:?}", events);

        // Within a batch both members are in flight before either finishes.
        assert!(position("start:f2") < position("end:f1"), "{:?}", events);
        assert!(position("start:f4") < position("end:f3"), "{:?}", events);

        // Completion order inside the batch: the fast file lands first.
        assert_eq!(names(&results), vec!["f2", "f1", "f4", "f3", "f5"]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let orchestrator = UploadOrchestrator::new(Arc::new(FakeGateway::default()));
        assert!(orchestrator.upload(Vec::new(), UploadMode::concurrent(3), None).await.is_empty());
        assert!(orchestrator.upload(Vec::new(), UploadMode::Sequential, None).await.is_empty());
    }

    #[tokio::test]
    async fn test_local_file_from_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("photo.png");
        tokio::fs::write(&path, b"\x89PNG").await.unwrap();

        let file = LocalFile::from_path(&path).await.unwrap();
        assert_eq!(file.name, "photo.png");
        assert_eq!(file.size(), 4);
        assert_eq!(file.content_type, "image/png");

        assert!(LocalFile::from_path(&dir.path().join("missing.txt")).await.is_err());
    }
}
