//! Hourly download ledger
//!
//! One line per accepted batch, `<RFC 3339 timestamp> <count>`. Entries older
//! than the window are dropped whenever the ledger is read, and every write
//! rewrites the file with only the surviving entries. Writers hold an
//! advisory lock on a sibling `.lock` file for the whole read-modify-write
//! and replace the ledger through an atomic rename.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use fd_lock::RwLock;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::QuotaStatus;
use crate::constants::{files, limits};
use crate::errors::{QuotaError, QuotaResult};

/// One accepted batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLedgerEntry {
    pub timestamp: DateTime<Utc>,
    pub count: usize,
}

impl RateLedgerEntry {
    /// Parse a ledger line, `None` when it is malformed
    ///
    /// Timestamps are RFC 3339, or naive ISO 8601 read as local time.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let timestamp = parse_timestamp(parts.next()?)?;
        let count = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { timestamp, count })
    }

    fn to_line(self) -> String {
        format!(
            "{} {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            self.count
        )
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Persisted sliding-window record of download batches
#[derive(Debug, Clone)]
pub struct DownloadLedger {
    path: PathBuf,
}

impl DownloadLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ledger at its default location in the home directory
    ///
    /// # Errors
    ///
    /// Returns `QuotaError::NoHomeDirectory` when no home directory is known.
    pub fn in_home() -> QuotaResult<Self> {
        let home = dirs::home_dir().ok_or(QuotaError::NoHomeDirectory)?;
        Ok(Self::new(home.join(files::LEDGER_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Downloads recorded in the trailing hour
    pub fn consumed_in_last_hour(&self) -> QuotaResult<usize> {
        self.consumed_at(Utc::now())
    }

    /// Downloads recorded in the hour before `now`
    ///
    /// # Errors
    ///
    /// Returns `QuotaError::Io` when the ledger exists but cannot be read.
    pub fn consumed_at(&self, now: DateTime<Utc>) -> QuotaResult<usize> {
        let lock = self.open_lock()?;
        let _guard = lock.read().map_err(|e| self.lock_error(e))?;
        Ok(total(&self.read_live_entries(now)?))
    }

    /// Append a batch of `count` downloads at the current time
    pub fn record(&self, count: usize) -> QuotaResult<()> {
        self.record_at(Utc::now(), count)
    }

    /// Append a batch at `now` and compact the ledger
    ///
    /// # Errors
    ///
    /// Returns `QuotaError::Io` when the ledger cannot be locked, read or
    /// rewritten.
    pub fn record_at(&self, now: DateTime<Utc>, count: usize) -> QuotaResult<()> {
        let mut lock = self.open_lock()?;
        let _guard = lock.write().map_err(|e| self.lock_error(e))?;

        let mut entries = self.read_live_entries(now)?;
        entries.push(RateLedgerEntry {
            timestamp: now,
            count,
        });
        self.rewrite(&entries)?;
        debug!("Recorded {} download(s) in {}", count, self.path.display());
        Ok(())
    }

    /// Check a batch against `cap` and record it, under one lock
    ///
    /// Nothing is written when the batch is refused.
    ///
    /// # Errors
    ///
    /// Returns `QuotaError::Exceeded` when `requested` is larger than what
    /// remains of the cap, and `QuotaError::Io` on ledger I/O failures.
    pub fn reserve_at(
        &self,
        now: DateTime<Utc>,
        requested: usize,
        cap: usize,
    ) -> QuotaResult<QuotaStatus> {
        let mut lock = self.open_lock()?;
        let _guard = lock.write().map_err(|e| self.lock_error(e))?;

        let mut entries = self.read_live_entries(now)?;
        let status = QuotaStatus::new(total(&entries), cap);
        if requested > status.remaining {
            return Err(QuotaError::Exceeded {
                requested,
                allowed: status.remaining,
                consumed: status.consumed,
                cap,
            });
        }

        if requested > 0 {
            entries.push(RateLedgerEntry {
                timestamp: now,
                count: requested,
            });
            self.rewrite(&entries)?;
        }

        info!(
            "Reserved {} of {} remaining download(s) this hour",
            requested, status.remaining
        );
        Ok(QuotaStatus::new(status.consumed + requested, cap))
    }

    fn read_live_entries(&self, now: DateTime<Utc>) -> QuotaResult<Vec<RateLedgerEntry>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let cutoff = now - Duration::minutes(limits::QUOTA_WINDOW_MINUTES);
        let entries = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let entry = RateLedgerEntry::parse(line);
                if entry.is_none() {
                    debug!("Skipping malformed ledger line: {}", line);
                }
                entry
            })
            .filter(|entry| entry.timestamp > cutoff)
            .collect();
        Ok(entries)
    }

    fn rewrite(&self, entries: &[RateLedgerEntry]) -> QuotaResult<()> {
        let dir = self.parent_dir();
        fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        for entry in entries {
            writeln!(temp, "{}", entry.to_line()).map_err(|e| self.io_error(e))?;
        }
        temp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        temp.persist(&self.path).map_err(|e| self.io_error(e.error))?;
        Ok(())
    }

    fn open_lock(&self) -> QuotaResult<RwLock<File>> {
        let lock_path = self.path.with_extension("lock");
        fs::create_dir_all(self.parent_dir()).map_err(|e| self.io_error(e))?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| QuotaError::Io {
                path: lock_path,
                source: e,
            })?;
        Ok(RwLock::new(file))
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn io_error(&self, source: std::io::Error) -> QuotaError {
        QuotaError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn lock_error(&self, source: std::io::Error) -> QuotaError {
        QuotaError::Io {
            path: self.path.with_extension("lock"),
            source,
        }
    }
}

fn total(entries: &[RateLedgerEntry]) -> usize {
    entries.iter().map(|entry| entry.count).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ledger() -> (TempDir, DownloadLedger) {
        let dir = TempDir::new().unwrap();
        let ledger = DownloadLedger::new(dir.path().join(".hda_download_status"));
        (dir, ledger)
    }

    #[test]
    fn test_missing_ledger_is_empty() {
        let (_dir, ledger) = ledger();
        assert_eq!(ledger.consumed_in_last_hour().unwrap(), 0);
    }

    #[test]
    fn test_old_entries_age_out() {
        let (_dir, ledger) = ledger();
        let start = Utc::now() - Duration::minutes(61);

        ledger.record_at(start, 30).unwrap();
        ledger.record_at(start + Duration::minutes(61), 80).unwrap();

        assert_eq!(ledger.consumed_at(start + Duration::minutes(61)).unwrap(), 80);
        let text = fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn test_entries_inside_window_all_count() {
        let (_dir, ledger) = ledger();
        let now = Utc::now();

        ledger.record_at(now - Duration::minutes(59), 10).unwrap();
        ledger.record_at(now - Duration::minutes(1), 5).unwrap();

        assert_eq!(ledger.consumed_at(now).unwrap(), 15);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let (_dir, ledger) = ledger();
        let now = Utc::now();
        let recent = (now - Duration::minutes(5)).to_rfc3339();
        let naive_local = (Local::now() - Duration::minutes(10))
            .naive_local()
            .format("%Y-%m-%dT%H:%M:%S%.f")
            .to_string();
        fs::write(
            ledger.path(),
            format!("{recent} 7\nnot-a-date 3\n{recent} many\n\n{naive_local} 2\n"),
        )
        .unwrap();

        assert_eq!(ledger.consumed_at(now).unwrap(), 9);
    }

    #[test]
    fn test_reserve_refuses_batches_over_cap() {
        let (_dir, ledger) = ledger();
        let now = Utc::now();
        ledger.record_at(now - Duration::minutes(10), 80).unwrap();

        let refused = ledger.reserve_at(now, 30, 100);
        assert!(matches!(
            refused,
            Err(QuotaError::Exceeded {
                requested: 30,
                allowed: 20,
                consumed: 80,
                cap: 100
            })
        ));
        assert_eq!(ledger.consumed_at(now).unwrap(), 80);

        let status = ledger.reserve_at(now, 20, 100).unwrap();
        assert_eq!(status.remaining, 0);
        assert_eq!(ledger.consumed_at(now).unwrap(), 100);
    }

    #[test]
    fn test_concurrent_reservations_never_exceed_cap() {
        let (_dir, ledger) = ledger();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || ledger.reserve_at(Utc::now(), 20, 100).is_ok())
            })
            .collect();

        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(accepted, 5);
        assert_eq!(ledger.consumed_in_last_hour().unwrap(), 100);
    }
}
