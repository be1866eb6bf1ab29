//! Per-item download worker
//!
//! A worker owns one [`DownloadTask`] at a time and drives it through a fixed
//! number of attempts. Cancellation is observed before each attempt, after the
//! response headers arrive, and around every chunk written to disk.

use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::cancel::CancelToken;
use super::config::DownloadConfig;
use super::transport::FileTransport;
use super::types::{DownloadEvent, DownloadTask, TaskState};
use crate::errors::{DownloadError, DownloadResult};

/// Downloads single items on behalf of the orchestrator
#[derive(Debug)]
pub struct DownloadWorker<T: ?Sized> {
    transport: Arc<T>,
    config: DownloadConfig,
    cancel: CancelToken,
    events: mpsc::Sender<DownloadEvent>,
}

impl<T: FileTransport + ?Sized> DownloadWorker<T> {
    pub fn new(
        transport: Arc<T>,
        config: DownloadConfig,
        cancel: CancelToken,
        events: mpsc::Sender<DownloadEvent>,
    ) -> Self {
        Self {
            transport,
            config,
            cancel,
            events,
        }
    }

    /// Run all attempts for `task` and return it in a terminal state
    pub async fn run(&self, mut task: DownloadTask, url: &str) -> DownloadTask {
        let max_attempts = self.config.max_attempts;

        for attempt in 1..=max_attempts {
            if self.cancel.is_cancelled() {
                return self.finish_cancelled(task).await;
            }

            task.attempts = attempt;
            task.state = TaskState::Downloading;
            self.emit_status(&task, None).await;
            remove_partial(&task.destination).await;

            debug!(
                "Attempt {}/{} for {} -> {}",
                attempt,
                max_attempts,
                task.item_id,
                task.destination.display()
            );

            match self.attempt_once(url, &task.destination).await {
                Ok(bytes) => {
                    info!(
                        "Downloaded {} ({} bytes, attempt {})",
                        task.item_id, bytes, attempt
                    );
                    task.state = TaskState::Succeeded;
                    task.last_error = None;
                    self.emit_status(&task, None).await;
                    return task;
                }
                Err(DownloadError::Cancelled) => {
                    remove_partial(&task.destination).await;
                    return self.finish_cancelled(task).await;
                }
                Err(e) => {
                    debug!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt, max_attempts, task.item_id, e
                    );
                    task.last_error = Some(e.to_string());

                    if attempt < max_attempts {
                        let message = format!(
                            "Attempt {} failed: {}. Retrying in {:?}",
                            attempt, e, self.config.retry_delay
                        );
                        self.emit_status(&task, Some(message)).await;

                        tokio::select! {
                            _ = tokio::time::sleep(self.config.retry_delay) => {}
                            _ = self.cancel.cancelled() => {
                                return self.finish_cancelled(task).await;
                            }
                        }
                    }
                }
            }
        }

        remove_partial(&task.destination).await;
        let failure = DownloadError::MaxAttemptsExceeded {
            item_id: task.item_id.clone(),
            max_attempts,
            last_error: task
                .last_error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        };
        error!("{}", failure);
        task.state = TaskState::Failed;
        self.emit_status(&task, Some(failure.to_string())).await;
        task
    }

    /// One authenticated streaming GET written to `destination`
    async fn attempt_once(&self, url: &str, destination: &Path) -> DownloadResult<u64> {
        let budget = self.config.request_timeout;
        let timed_out = || DownloadError::Timeout {
            seconds: budget.as_secs(),
        };

        let response = timeout(budget, self.transport.open(url))
            .await
            .map_err(|_| timed_out())??;

        if self.cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        if response.status != 200 {
            return Err(DownloadError::ServerError {
                status: response.status,
            });
        }

        let file = tokio::fs::File::create(destination).await?;
        let mut writer = BufWriter::with_capacity(self.config.chunk_size, file);
        let mut body = response.body;
        let mut written = 0u64;

        loop {
            if self.cancel.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }

            let chunk = match timeout(budget, body.next()).await.map_err(|_| timed_out())? {
                Some(chunk) => chunk?,
                None => break,
            };

            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;

            if self.cancel.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }
        }

        writer.flush().await?;
        Ok(written)
    }

    async fn finish_cancelled(&self, mut task: DownloadTask) -> DownloadTask {
        debug!("Download of {} cancelled", task.item_id);
        task.state = TaskState::Cancelled;
        self.emit_status(&task, None).await;
        task
    }

    async fn emit_status(&self, task: &DownloadTask, message: Option<String>) {
        let event = DownloadEvent::ItemStatus {
            item_id: task.item_id.clone(),
            state: task.state,
            attempt: task.attempts,
            message,
        };
        // A dropped receiver only means nobody is watching
        let _ = self.events.send(event).await;
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial file {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::download::transport::TransportResponse;
    use async_trait::async_trait;
    use futures::stream;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Fails with HTTP 503 for the first `failures` calls
    struct FlakyTransport {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl FileTransport for FlakyTransport {
        async fn open(&self, _url: &str) -> DownloadResult<TransportResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Ok(TransportResponse {
                    status: 503,
                    body: stream::empty().boxed(),
                });
            }
            let chunks = vec![Ok(b"PK".to_vec()), Ok(b"data".to_vec())];
            Ok(TransportResponse {
                status: 200,
                body: stream::iter(chunks).boxed(),
            })
        }
    }

    fn fast_config() -> DownloadConfig {
        DownloadConfig {
            retry_delay: Duration::from_millis(10),
            request_timeout: Duration::from_secs(5),
            ..DownloadConfig::default()
        }
    }

    fn worker(
        transport: Arc<FlakyTransport>,
        cancel: CancelToken,
    ) -> (DownloadWorker<FlakyTransport>, mpsc::Receiver<DownloadEvent>) {
        let (tx, rx) = mpsc::channel(64);
        (DownloadWorker::new(transport, fast_config(), cancel, tx), rx)
    }

    #[tokio::test]
    async fn test_second_attempt_succeeds() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(FlakyTransport {
            failures: 1,
            calls: AtomicU32::new(0),
        });
        let (worker, _rx) = worker(Arc::clone(&transport), CancelToken::new());

        let task = DownloadTask::new("item", dir.path().join("item.zip"));
        let task = worker.run(task, "https://example.test/item").await;

        assert_eq!(task.state, TaskState::Succeeded);
        assert_eq!(task.attempts, 2);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(std::fs::read(dir.path().join("item.zip")).unwrap(), b"PKdata");
    }

    #[tokio::test]
    async fn test_exhausted_attempts_fail_without_fourth_try() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(FlakyTransport {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
        });
        let (worker, mut rx) = worker(Arc::clone(&transport), CancelToken::new());

        let task = DownloadTask::new("item", dir.path().join("item.zip"));
        let task = worker.run(task, "https://example.test/item").await;

        assert_eq!(task.state, TaskState::Failed);
        assert_eq!(task.attempts, 3);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert_eq!(task.last_error.as_deref(), Some("Server error: HTTP 503"));
        assert!(!dir.path().join("item.zip").exists());

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        match last {
            Some(DownloadEvent::ItemStatus { state, message, .. }) => {
                assert_eq!(state, TaskState::Failed);
                assert!(message.unwrap().contains("Maximum attempts (3)"));
            }
            other => panic!("unexpected final event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_start_makes_no_request() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(FlakyTransport {
            failures: 0,
            calls: AtomicU32::new(0),
        });
        let cancel = CancelToken::new();
        cancel.cancel();
        let (worker, _rx) = worker(Arc::clone(&transport), cancel);

        let task = DownloadTask::new("item", dir.path().join("item.zip"));
        let task = worker.run(task, "https://example.test/item").await;

        assert_eq!(task.state, TaskState::Cancelled);
        assert_eq!(task.attempts, 0);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_partial_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("item.zip");
        std::fs::write(&destination, b"stale partial content").unwrap();

        let transport = Arc::new(FlakyTransport {
            failures: 0,
            calls: AtomicU32::new(0),
        });
        let (worker, _rx) = worker(transport, CancelToken::new());

        let task = worker
            .run(DownloadTask::new("item", destination.clone()), "https://example.test/item")
            .await;
        assert_eq!(task.state, TaskState::Succeeded);
        assert_eq!(std::fs::read(&destination).unwrap(), b"PKdata");
    }

    /// Serves three chunks and trips the token while handing out the first,
    /// or before returning the response when `cancel_on_open` is set
    struct CancellingTransport {
        cancel: CancelToken,
        cancel_on_open: bool,
        calls: AtomicU32,
    }

    #[async_trait]
    impl FileTransport for CancellingTransport {
        async fn open(&self, _url: &str) -> DownloadResult<TransportResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.cancel_on_open {
                self.cancel.cancel();
            }
            let cancel = self.cancel.clone();
            let chunks = vec![Ok(b"PK".to_vec()), Ok(b"part".to_vec()), Ok(b"rest".to_vec())];
            let body = stream::iter(chunks)
                .map(move |chunk| {
                    cancel.cancel();
                    chunk
                })
                .boxed();
            Ok(TransportResponse { status: 200, body })
        }
    }

    async fn run_cancelling(cancel_on_open: bool) -> (DownloadTask, u32, TempDir, Vec<DownloadEvent>) {
        let dir = TempDir::new().unwrap();
        let cancel = CancelToken::new();
        let transport = Arc::new(CancellingTransport {
            cancel: cancel.clone(),
            cancel_on_open,
            calls: AtomicU32::new(0),
        });
        let (tx, mut rx) = mpsc::channel(64);
        let worker = DownloadWorker::new(Arc::clone(&transport), fast_config(), cancel, tx);

        let task = DownloadTask::new("item", dir.path().join("item.zip"));
        let task = worker.run(task, "https://example.test/item").await;
        drop(worker);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (task, transport.calls.load(Ordering::SeqCst), dir, events)
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_removes_partial_without_retry() {
        let (task, calls, dir, events) = run_cancelling(false).await;

        assert_eq!(task.state, TaskState::Cancelled);
        assert_eq!(task.attempts, 1);
        assert_eq!(calls, 1);
        assert!(task.last_error.is_none());
        assert!(!dir.path().join("item.zip").exists());
        assert!(matches!(
            events.last(),
            Some(DownloadEvent::ItemStatus {
                state: TaskState::Cancelled,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_cancel_during_request_writes_nothing() {
        let (task, calls, dir, _events) = run_cancelling(true).await;

        assert_eq!(task.state, TaskState::Cancelled);
        assert_eq!(calls, 1);
        assert!(!dir.path().join("item.zip").exists());
    }
}
