//! Download task, event and report types

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Lifecycle of one selected item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Downloading,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskState {
    /// Whether the item will not change state again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Cancelled
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TaskState::Pending => "pending",
            TaskState::Downloading => "downloading",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        };
        f.write_str(text)
    }
}

/// One item of a batch, owned by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadTask {
    pub item_id: String,
    pub destination: PathBuf,
    pub state: TaskState,
    /// Attempts started so far
    pub attempts: u32,
    /// Error of the last failed attempt
    pub last_error: Option<String>,
}

impl DownloadTask {
    pub fn new(item_id: impl Into<String>, destination: PathBuf) -> Self {
        Self {
            item_id: item_id.into(),
            destination,
            state: TaskState::Pending,
            attempts: 0,
            last_error: None,
        }
    }
}

/// Progress notifications of a running batch
///
/// `Progress` is only ever sent with a non-decreasing `completed` count.
/// Exactly one of `Finished`, `CompletedWithErrors` or `Cancelled` ends the
/// stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    ItemStatus {
        item_id: String,
        state: TaskState,
        attempt: u32,
        message: Option<String>,
    },
    Progress {
        completed: usize,
        total: usize,
        percent: u8,
    },
    Finished {
        succeeded: usize,
    },
    CompletedWithErrors {
        errors: Vec<String>,
    },
    Cancelled,
}

/// Outcome of a whole batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub tasks: Vec<DownloadTask>,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn count(&self, state: TaskState) -> usize {
        self.tasks.iter().filter(|t| t.state == state).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(TaskState::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(TaskState::Failed)
    }

    /// One line per permanently failed item
    pub fn errors(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|t| t.state == TaskState::Failed)
            .map(|t| {
                format!(
                    "{}: {}",
                    t.item_id,
                    t.last_error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect()
    }

    pub fn task(&self, item_id: &str) -> Option<&DownloadTask> {
        self.tasks.iter().find(|t| t.item_id == item_id)
    }
}

/// Integer percentage of `completed` over `total`
pub fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((completed.min(total) * 100) / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_is_floored() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 66);
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(0, 0), 100);
    }

    #[test]
    fn test_report_errors() {
        let mut failed = DownloadTask::new("b", PathBuf::from("/tmp/b.zip"));
        failed.state = TaskState::Failed;
        failed.last_error = Some("Server error: HTTP 503".to_string());
        let mut ok = DownloadTask::new("a", PathBuf::from("/tmp/a.zip"));
        ok.state = TaskState::Succeeded;

        let report = BatchReport {
            tasks: vec![ok, failed],
            cancelled: false,
        };
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.errors(), vec!["b: Server error: HTTP 503"]);
        assert!(TaskState::Cancelled.is_terminal());
        assert!(!TaskState::Downloading.is_terminal());
    }
}
