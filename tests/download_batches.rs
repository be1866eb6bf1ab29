//! Integration tests for quota-aware download batches
//!
//! Batches run through the public orchestrator API against an in-memory
//! transport and a ledger kept in a temporary directory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use copernicus_connect::app::download::TransportResponse;
use copernicus_connect::app::{
    DownloadConfig, DownloadEvent, DownloadLedger, DownloadOrchestrator, FileTransport,
    HourlyQuota, ResultSet, SearchMatch, TaskState,
};
use copernicus_connect::errors::{DownloadError, DownloadResult, QuotaError};
use futures::stream::{self, StreamExt};
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Fails the first `failures` requests of every URL, then serves the URL as body
#[derive(Default)]
struct ScriptedTransport {
    failures: HashMap<String, usize>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedTransport {
    fn failing(pairs: &[(&str, usize)]) -> Self {
        Self {
            failures: pairs
                .iter()
                .map(|(id, n)| (format!("https://broker.test/download/{}", id), *n))
                .collect(),
            calls: Mutex::default(),
        }
    }

    fn calls_for(&self, id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&format!("https://broker.test/download/{}", id))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl FileTransport for ScriptedTransport {
    async fn open(&self, url: &str) -> DownloadResult<TransportResponse> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(url.to_string()).or_default();
            *count += 1;
            *count
        };

        if call <= self.failures.get(url).copied().unwrap_or(0) {
            return Err(DownloadError::ServerError { status: 502 });
        }
        Ok(TransportResponse {
            status: 200,
            body: stream::iter(vec![Ok(url.as_bytes().to_vec())]).boxed(),
        })
    }
}

fn results(ids: &[&str]) -> ResultSet {
    ResultSet::new(
        ids.iter()
            .map(|id| SearchMatch {
                id: id.to_string(),
                size: None,
                download_url: format!("https://broker.test/download/{}", id),
            })
            .collect(),
    )
}

fn config() -> DownloadConfig {
    DownloadConfig {
        worker_count: 2,
        retry_delay: Duration::from_millis(5),
        ..DownloadConfig::default()
    }
}

async fn collect(mut rx: mpsc::Receiver<DownloadEvent>) -> Vec<DownloadEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_transient_failure_recovers_on_second_attempt() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(ScriptedTransport::failing(&[("S2A_0002", 1)]));
    let orchestrator = DownloadOrchestrator::new(Arc::clone(&transport), config()).unwrap();
    let (tx, rx) = mpsc::channel(64);
    let collector = tokio::spawn(collect(rx));

    let report = orchestrator
        .run(
            &results(&["S2A_0001", "S2A_0002", "S2A_0003"]),
            &["S2A_0001".to_string(), "S2A_0002".to_string(), "S2A_0003".to_string()],
            dir.path(),
            tx,
        )
        .await
        .unwrap();
    let events = collector.await.unwrap();

    assert_eq!(report.succeeded(), 3);
    assert_eq!(transport.calls_for("S2A_0002"), 2);
    assert_eq!(report.task("S2A_0002").unwrap().attempts, 2);
    assert_eq!(
        std::fs::read(dir.path().join("S2A_0002.zip")).unwrap(),
        b"https://broker.test/download/S2A_0002"
    );
    assert_eq!(
        events.last(),
        Some(&DownloadEvent::Finished { succeeded: 3 })
    );
}

#[tokio::test]
async fn test_persistent_failure_stops_after_three_attempts() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(ScriptedTransport::failing(&[("bad", 10)]));
    let orchestrator = DownloadOrchestrator::new(Arc::clone(&transport), config()).unwrap();
    let (tx, rx) = mpsc::channel(64);
    let collector = tokio::spawn(collect(rx));

    let report = orchestrator
        .run(
            &results(&["good", "bad"]),
            &["good".to_string(), "bad".to_string()],
            dir.path(),
            tx,
        )
        .await
        .unwrap();
    let events = collector.await.unwrap();

    assert_eq!(transport.calls_for("bad"), 3);
    assert_eq!(report.task("bad").unwrap().state, TaskState::Failed);
    assert_eq!(report.task("good").unwrap().state, TaskState::Succeeded);
    assert!(!dir.path().join("bad.zip").exists());

    let progress: Vec<usize> = events
        .iter()
        .filter_map(|event| match event {
            DownloadEvent::Progress { completed, .. } => Some(*completed),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![1, 2]);

    match events.last() {
        Some(DownloadEvent::CompletedWithErrors { errors }) => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].starts_with("bad: "));
        }
        other => panic!("unexpected final event {:?}", other),
    }
}

#[tokio::test]
async fn test_batches_share_the_hourly_ledger() {
    let dir = TempDir::new().unwrap();
    let ledger_path = dir.path().join(".hda_download_status");
    let quota = Arc::new(HourlyQuota::new(DownloadLedger::new(&ledger_path), 3));
    let transport = Arc::new(ScriptedTransport::default());
    let orchestrator = DownloadOrchestrator::new(Arc::clone(&transport), config())
        .unwrap()
        .with_quota(quota.clone());

    let found = results(&["a", "b", "c"]);
    let (tx, _rx) = mpsc::channel(64);
    let first = orchestrator
        .run(&found, &["a".to_string(), "b".to_string()], &dir.path().join("out"), tx)
        .await
        .unwrap();
    assert_eq!(first.succeeded(), 2);
    assert_eq!(quota.status().await.unwrap().remaining, 1);

    let (tx, _rx) = mpsc::channel(64);
    let refused = orchestrator
        .run(&found, &["b".to_string(), "c".to_string()], &dir.path().join("out"), tx)
        .await;
    assert!(matches!(
        refused,
        Err(DownloadError::Quota(QuotaError::Exceeded { allowed: 1, .. }))
    ));
    assert_eq!(transport.calls_for("c"), 0);

    // A fresh handle on the same file sees the earlier batch
    let reopened = DownloadLedger::new(&ledger_path);
    assert_eq!(reopened.consumed_in_last_hour().unwrap(), 2);
}
