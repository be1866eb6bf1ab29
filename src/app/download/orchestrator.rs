//! Bounded-concurrency batch downloads
//!
//! The orchestrator plans one [`DownloadTask`] per selected search match,
//! admits the batch against the hourly quota, and runs the tasks on a fixed
//! number of workers. Progress is reported through an mpsc channel so any
//! front end (CLI bar, log lines, tests) can consume it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::cancel::CancelToken;
use super::config::DownloadConfig;
use super::transport::FileTransport;
use super::types::{percent, BatchReport, DownloadEvent, DownloadTask, TaskState};
use super::worker::DownloadWorker;
use crate::app::quota::BatchQuota;
use crate::app::search::ResultSet;
use crate::constants::files;
use crate::errors::{DownloadError, DownloadResult};

/// Runs download batches
pub struct DownloadOrchestrator<T: ?Sized> {
    transport: Arc<T>,
    config: DownloadConfig,
    quota: Option<Arc<dyn BatchQuota>>,
    cancel: CancelToken,
}

impl<T: ?Sized> std::fmt::Debug for DownloadOrchestrator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadOrchestrator")
            .field("config", &self.config)
            .field("has_quota", &self.quota.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl<T: FileTransport + ?Sized + 'static> DownloadOrchestrator<T> {
    /// Create an orchestrator, validating the configuration
    pub fn new(transport: Arc<T>, config: DownloadConfig) -> DownloadResult<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            config,
            quota: None,
            cancel: CancelToken::new(),
        })
    }

    /// Admit every batch against `quota` before anything is downloaded
    pub fn with_quota(mut self, quota: Arc<dyn BatchQuota>) -> Self {
        self.quota = Some(quota);
        self
    }

    /// Use an externally owned cancellation flag
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle for cancelling the running batch from elsewhere
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Download the matches of `results` whose identifier is in `selected`
    ///
    /// Per-item failures never abort the batch: they end up in the report
    /// and in a final `CompletedWithErrors` event. The returned error is
    /// reserved for problems that prevent the batch from starting.
    ///
    /// # Errors
    ///
    /// * `DownloadError::Quota` when the batch does not fit the hourly cap
    /// * `DownloadError::Io` when `dest_dir` cannot be created
    pub async fn run(
        &self,
        results: &ResultSet,
        selected: &[String],
        dest_dir: &Path,
        events: mpsc::Sender<DownloadEvent>,
    ) -> DownloadResult<BatchReport> {
        let (mut tasks, urls) = plan_batch(results, selected, dest_dir);
        let total = tasks.len();

        if total == 0 {
            info!("Nothing selected for download");
            let _ = events.send(DownloadEvent::Finished { succeeded: 0 }).await;
            return Ok(BatchReport::default());
        }

        if let Some(quota) = &self.quota {
            let status = quota.reserve(total).await?;
            debug!(
                "Quota admitted {} downloads ({}/{} used in the last hour)",
                total, status.consumed, status.cap
            );
        }

        tokio::fs::create_dir_all(dest_dir).await?;
        info!(
            "Starting download of {} files to {} with {} workers",
            total,
            dest_dir.display(),
            self.config.worker_count
        );

        let worker = Arc::new(DownloadWorker::new(
            Arc::clone(&self.transport),
            self.config.clone(),
            self.cancel.clone(),
            events.clone(),
        ));
        let permits = Arc::new(Semaphore::new(self.config.worker_count));
        let mut join_set = JoinSet::new();

        for (index, (task, url)) in tasks.iter().cloned().zip(urls).enumerate() {
            if self.cancel.is_cancelled() {
                debug!("Cancelled before submitting {}", task.item_id);
                break;
            }

            let worker = Arc::clone(&worker);
            let permits = Arc::clone(&permits);
            join_set.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let fallback = task.clone();
                let handle = tokio::spawn(async move { worker.run(task, &url).await });
                match handle.await {
                    Ok(task) => (index, task),
                    Err(e) => {
                        let failure = DownloadError::WorkerPanic {
                            reason: e.to_string(),
                        };
                        error!("{}: {}", fallback.item_id, failure);
                        let mut task = fallback;
                        task.state = TaskState::Failed;
                        task.last_error = Some(failure.to_string());
                        (index, task)
                    }
                }
            });
        }

        let mut completed = 0usize;
        let mut finished = vec![false; total];
        while let Some(joined) = join_set.join_next().await {
            let (index, task) = match joined {
                Ok(done) => done,
                Err(e) => {
                    error!("Download task could not be joined: {}", e);
                    continue;
                }
            };

            if task.state != TaskState::Cancelled {
                completed += 1;
                let _ = events
                    .send(DownloadEvent::Progress {
                        completed,
                        total,
                        percent: percent(completed, total),
                    })
                    .await;
            }

            finished[index] = true;
            tasks[index] = task;
        }

        // Items never handed to a worker
        for (task, _) in tasks
            .iter_mut()
            .zip(finished.iter())
            .filter(|(_, done)| !**done)
        {
            task.state = TaskState::Cancelled;
            let _ = events
                .send(DownloadEvent::ItemStatus {
                    item_id: task.item_id.clone(),
                    state: TaskState::Cancelled,
                    attempt: task.attempts,
                    message: None,
                })
                .await;
        }

        let report = BatchReport {
            tasks,
            cancelled: self.cancel.is_cancelled(),
        };

        let final_event = if report.cancelled {
            warn!(
                "Download cancelled: {} of {} files completed",
                report.succeeded(),
                total
            );
            DownloadEvent::Cancelled
        } else if report.failed() > 0 {
            warn!(
                "Download finished with {} failures out of {} files",
                report.failed(),
                total
            );
            DownloadEvent::CompletedWithErrors {
                errors: report.errors(),
            }
        } else {
            info!("Download finished: {} files", report.succeeded());
            DownloadEvent::Finished {
                succeeded: report.succeeded(),
            }
        };
        let _ = events.send(final_event).await;

        Ok(report)
    }
}

/// One task per selected match, in result order
fn plan_batch(
    results: &ResultSet,
    selected: &[String],
    dest_dir: &Path,
) -> (Vec<DownloadTask>, Vec<String>) {
    let wanted: HashSet<&str> = selected.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    let mut tasks = Vec::new();
    let mut urls = Vec::new();

    for item in results {
        let id = item.result_identifier();
        if wanted.contains(id) && seen.insert(id) {
            tasks.push(DownloadTask::new(id, destination_for(dest_dir, id)));
            urls.push(item.download_url().to_string());
        }
    }

    for missing in wanted.difference(&seen) {
        warn!("Selected item {} is not part of the results", missing);
    }

    (tasks, urls)
}

/// `<dest_dir>/<id>.zip`, with path separators in the id replaced
pub fn destination_for(dest_dir: &Path, item_id: &str) -> PathBuf {
    let file_stem: String = item_id
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    dest_dir.join(format!("{}.{}", file_stem, files::PRODUCT_EXTENSION))
}
