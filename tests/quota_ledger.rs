//! Integration tests for the hourly download ledger

use chrono::{Duration, Utc};
use copernicus_connect::app::quota::{select_interval, select_named};
use copernicus_connect::app::{BatchQuota, DownloadLedger, HourlyQuota, QuotaStatus};
use copernicus_connect::errors::QuotaError;
use tempfile::TempDir;

fn ids(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("S1A_IW_GRDH_{i:04}")).collect()
}

#[tokio::test]
async fn test_concurrent_reservations_never_exceed_cap() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(".hda_download_status");

    let mut handles = Vec::new();
    for _ in 0..8 {
        // Separate handles on one file, as separate processes would have
        let quota = HourlyQuota::new(DownloadLedger::new(&path), 20);
        handles.push(tokio::spawn(async move { quota.reserve(4).await }));
    }

    let mut admitted = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(QuotaError::Exceeded { .. }) => refused += 1,
            Err(e) => panic!("unexpected ledger error: {}", e),
        }
    }

    assert_eq!(admitted, 5);
    assert_eq!(refused, 3);
    assert_eq!(DownloadLedger::new(&path).consumed_in_last_hour().unwrap(), 20);
}

#[test]
fn test_window_slides_past_old_batches() {
    let dir = TempDir::new().unwrap();
    let ledger = DownloadLedger::new(dir.path().join("ledger"));
    let now = Utc::now();

    ledger.record_at(now - Duration::minutes(90), 60).unwrap();
    ledger.record_at(now - Duration::minutes(30), 50).unwrap();

    let status = ledger.reserve_at(now, 50, 100).unwrap();
    assert_eq!(status, QuotaStatus::new(100, 100));
    assert!(ledger.reserve_at(now, 1, 100).is_err());

    // Thirty-one minutes on, only the batch reserved at `now` is left
    let later = now + Duration::minutes(31);
    assert_eq!(ledger.consumed_at(later).unwrap(), 50);
}

#[tokio::test]
async fn test_selection_is_sized_against_live_status() {
    let dir = TempDir::new().unwrap();
    let quota = HourlyQuota::new(DownloadLedger::new(dir.path().join("ledger")), 10);
    quota.reserve(7).await.unwrap();

    let status = quota.status().await.unwrap();
    assert_eq!(status.remaining, 3);

    let results = ids(12);
    let picked = select_interval(&results, 10, 12, &status).unwrap();
    assert_eq!(picked, results[9..12].to_vec());

    match select_interval(&results, 1, 4, &status) {
        Err(QuotaError::Exceeded {
            requested,
            allowed,
            consumed,
            cap,
        }) => assert_eq!((requested, allowed, consumed, cap), (4, 3, 7, 10)),
        other => panic!("unexpected selection {:?}", other),
    }

    let named = vec![results[5].clone(), results[0].clone()];
    assert_eq!(
        select_named(&results, &named, &status).unwrap(),
        vec![results[0].clone(), results[5].clone()]
    );
}
