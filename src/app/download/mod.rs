//! Product downloads
//!
//! - `orchestrator`: batch planning, quota admission and the worker pool
//! - `worker`: per-item attempt loop with fixed-delay retry
//! - `transport`: authenticated streaming GET
//! - `cancel`: cooperative cancellation flag and signal listener

pub mod cancel;
pub mod config;
pub mod orchestrator;
pub mod transport;
pub mod types;
pub mod worker;

pub use cancel::{spawn_signal_listener, CancelToken};
pub use config::{DownloadConfig, DownloadConfigBuilder};
pub use orchestrator::{destination_for, DownloadOrchestrator};
pub use transport::{FileTransport, HttpTransport, TransportResponse};
pub use types::{BatchReport, DownloadEvent, DownloadTask, TaskState};
pub use worker::DownloadWorker;
