//! Choosing which search results to download

use std::collections::HashSet;

use super::QuotaStatus;
use crate::errors::{QuotaError, QuotaResult};

fn check_allowance(requested: usize, status: &QuotaStatus) -> QuotaResult<()> {
    if requested > status.remaining {
        return Err(QuotaError::Exceeded {
            requested,
            allowed: status.remaining,
            consumed: status.consumed,
            cap: status.cap,
        });
    }
    Ok(())
}

/// Every listed item, when the whole list fits the allowance
pub fn select_all(ids: &[String], status: &QuotaStatus) -> QuotaResult<Vec<String>> {
    check_allowance(ids.len(), status)?;
    Ok(ids.to_vec())
}

/// Items `start..=end`, counted from 1
///
/// Reversed bounds are swapped.
///
/// # Errors
///
/// Returns `QuotaError::InvalidSelection` when a bound falls outside the list
/// and `QuotaError::Exceeded` when the interval is larger than the allowance.
pub fn select_interval(
    ids: &[String],
    start: usize,
    end: usize,
    status: &QuotaStatus,
) -> QuotaResult<Vec<String>> {
    let (start, end) = if start <= end { (start, end) } else { (end, start) };
    if start < 1 || end > ids.len() {
        return Err(QuotaError::InvalidSelection {
            reason: format!(
                "interval {}-{} is outside the result list (1-{})",
                start,
                end,
                ids.len()
            ),
        });
    }

    check_allowance(end - start + 1, status)?;
    Ok(ids[start - 1..end].to_vec())
}

/// Explicitly named items, in result order
///
/// # Errors
///
/// Returns `QuotaError::InvalidSelection` when a name is not in the list.
pub fn select_named(ids: &[String], wanted: &[String], status: &QuotaStatus) -> QuotaResult<Vec<String>> {
    let known: HashSet<&str> = ids.iter().map(String::as_str).collect();
    if let Some(unknown) = wanted.iter().find(|id| !known.contains(id.as_str())) {
        return Err(QuotaError::InvalidSelection {
            reason: format!("'{}' is not among the search results", unknown),
        });
    }

    let wanted: HashSet<&str> = wanted.iter().map(String::as_str).collect();
    let selected: Vec<String> = ids
        .iter()
        .filter(|id| wanted.contains(id.as_str()))
        .cloned()
        .collect();
    check_allowance(selected.len(), status)?;
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("item-{i}")).collect()
    }

    #[test]
    fn test_select_all_respects_allowance() {
        let status = QuotaStatus::new(95, 100);
        assert_eq!(select_all(&ids(5), &status).unwrap().len(), 5);
        assert!(matches!(
            select_all(&ids(6), &status),
            Err(QuotaError::Exceeded { allowed: 5, .. })
        ));
    }

    #[test]
    fn test_interval_is_one_based_and_swaps() {
        let status = QuotaStatus::new(0, 100);
        let picked = select_interval(&ids(10), 4, 2, &status).unwrap();
        assert_eq!(picked, vec!["item-2", "item-3", "item-4"]);
    }

    #[test]
    fn test_interval_out_of_range() {
        let status = QuotaStatus::new(0, 100);
        assert!(matches!(
            select_interval(&ids(3), 0, 2, &status),
            Err(QuotaError::InvalidSelection { .. })
        ));
        assert!(matches!(
            select_interval(&ids(3), 2, 4, &status),
            Err(QuotaError::InvalidSelection { .. })
        ));
    }

    #[test]
    fn test_named_selection_keeps_result_order() {
        let status = QuotaStatus::new(0, 100);
        let wanted = vec!["item-3".to_string(), "item-1".to_string()];
        assert_eq!(
            select_named(&ids(4), &wanted, &status).unwrap(),
            vec!["item-1", "item-3"]
        );

        let unknown = vec!["item-9".to_string()];
        assert!(select_named(&ids(4), &unknown, &status).is_err());
    }
}
