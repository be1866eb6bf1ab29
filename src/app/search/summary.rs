//! Human-readable search outcome

use std::fmt;

use super::models::ResultSet;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// `x.xx GB` from one GiB up, `x.x MB` below
pub fn format_size(bytes: u64) -> String {
    let bytes = bytes as f64;
    if bytes >= GIB {
        format!("{:.2} GB", bytes / GIB)
    } else {
        format!("{:.1} MB", bytes / MIB)
    }
}

/// Counts and sizes of a finished search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSummary {
    pub count: usize,
    pub volume: Option<u64>,
    /// Result cutoff the search ran with, `None` when unlimited
    pub limit: Option<u32>,
}

impl SearchSummary {
    pub fn new(results: &ResultSet, limit: Option<u32>) -> Self {
        Self {
            count: results.len(),
            volume: results.volume,
            limit,
        }
    }

    /// The cutoff was hit, so the broker may hold more matches
    pub fn limit_reached(&self) -> bool {
        self.limit
            .map(|limit| self.count >= limit as usize)
            .unwrap_or(false)
    }
}

impl fmt::Display for SearchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = self
            .volume
            .map(format_size)
            .unwrap_or_else(|| "unknown".to_string());
        write!(f, "Found {} results. Size: {}", self.count, size)?;
        if let (true, Some(limit)) = (self.limit_reached(), self.limit) {
            write!(
                f,
                "\nThe number of matches has reached the limit of {}. There may be additional matches.",
                limit
            )?;
        }
        Ok(())
    }
}
