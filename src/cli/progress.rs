//! Download progress display
//!
//! Consumes the orchestrator's [`DownloadEvent`] channel and renders it with
//! indicatif: one bar for the batch and a message line for the most recent
//! item status. When stdout is not a terminal, events are written as plain
//! lines instead.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::app::download::{DownloadEvent, TaskState};

/// Configuration for progress display
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Enable visual progress bars
    pub enable_progress_bars: bool,
    /// Spinner tick interval
    pub tick_interval: Duration,
    /// Print one line per item status change
    pub show_item_details: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bars: atty::is(atty::Stream::Stdout),
            tick_interval: Duration::from_millis(120),
            show_item_details: false,
        }
    }
}

/// Final tally seen by the display
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSummary {
    pub completed: usize,
    pub total: usize,
    pub errors: Vec<String>,
    pub cancelled: bool,
}

/// Renders download events
pub struct ProgressDisplay {
    config: ProgressConfig,
    bar: ProgressBar,
    summary: ProgressSummary,
}

impl ProgressDisplay {
    pub fn new(config: ProgressConfig, total: usize) -> Self {
        let bar = if config.enable_progress_bars {
            let bar = ProgressBar::new(total as u64);
            let style = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-");
            bar.set_style(style);
            bar.enable_steady_tick(config.tick_interval);
            bar
        } else {
            ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::hidden())
        };

        Self {
            config,
            bar,
            summary: ProgressSummary {
                total,
                ..ProgressSummary::default()
            },
        }
    }

    /// Apply one event
    pub fn update(&mut self, event: DownloadEvent) {
        match event {
            DownloadEvent::ItemStatus {
                item_id,
                state,
                attempt,
                message,
            } => {
                let line = match (&state, &message) {
                    (TaskState::Downloading, None) => {
                        format!("{} (attempt {})", item_id, attempt)
                    }
                    (_, Some(message)) => format!("{}: {}", item_id, message),
                    (state, None) => format!("{}: {}", item_id, state),
                };
                let settled = matches!(state, TaskState::Succeeded | TaskState::Failed);
                if self.config.show_item_details || (settled && !self.config.enable_progress_bars) {
                    self.print_line(&line);
                }
                self.bar.set_message(line);
            }
            DownloadEvent::Progress {
                completed,
                total,
                percent,
            } => {
                self.summary.completed = completed;
                self.summary.total = total;
                self.bar.set_length(total as u64);
                self.bar.set_position(completed as u64);
                if !self.config.enable_progress_bars {
                    self.print_line(&format!("Progress: {}/{} ({}%)", completed, total, percent));
                }
            }
            DownloadEvent::Finished { succeeded } => {
                self.bar
                    .finish_with_message(format!("Downloaded {} files", succeeded));
            }
            DownloadEvent::CompletedWithErrors { errors } => {
                self.bar.abandon_with_message(format!(
                    "Finished with {} failed downloads",
                    errors.len()
                ));
                self.summary.errors = errors;
            }
            DownloadEvent::Cancelled => {
                self.summary.cancelled = true;
                self.bar.abandon_with_message("Download cancelled");
            }
        }
    }

    fn print_line(&self, line: &str) {
        if self.config.enable_progress_bars {
            self.bar.println(line);
        } else {
            println!("{}", line);
        }
    }

    pub fn summary(&self) -> &ProgressSummary {
        &self.summary
    }

    /// Drain `events` on a background task until every sender is gone
    pub fn spawn(mut self, mut events: mpsc::Receiver<DownloadEvent>) -> JoinHandle<ProgressSummary> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.update(event);
            }
            if !self.bar.is_finished() {
                self.bar.finish_and_clear();
            }
            self.summary
        })
    }
}
