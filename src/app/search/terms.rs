//! Terms-of-use acceptance lookup

use serde_json::Value;
use tracing::warn;

use super::client::SearchClient;
use crate::constants::search;

/// Whether the user accepted a dataset's terms
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermsStatus {
    Accepted,
    NotAccepted,
    /// The lookup itself failed; the caller may retry
    Unknown(String),
}

/// Look up one term id in the user's accepted terms
pub async fn check_terms<C: SearchClient + ?Sized>(client: &C, term_id: &str) -> TermsStatus {
    match client.get(search::TERMS_PATH).await {
        Ok(response) => terms_status(&response, term_id),
        Err(e) => {
            warn!("Could not verify terms {}: {}", term_id, e);
            TermsStatus::Unknown(e.to_string())
        }
    }
}

/// Interpret a `termsaccepted` response
pub fn terms_status(response: &Value, term_id: &str) -> TermsStatus {
    let accepted = response
        .get("features")
        .and_then(Value::as_array)
        .and_then(|features| {
            features
                .iter()
                .find(|f| f.get("term_id").and_then(Value::as_str) == Some(term_id))
        })
        .and_then(|f| f.get("accepted").and_then(Value::as_bool))
        .unwrap_or(false);

    if accepted {
        TermsStatus::Accepted
    } else {
        TermsStatus::NotAccepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_terms_status() {
        let response = json!({"features": [
            {"term_id": "Copernicus_General_License", "accepted": true},
            {"term_id": "Copernicus_Sentinel_License", "accepted": false}
        ]});

        assert_eq!(terms_status(&response, "Copernicus_General_License"), TermsStatus::Accepted);
        assert_eq!(terms_status(&response, "Copernicus_Sentinel_License"), TermsStatus::NotAccepted);
        assert_eq!(terms_status(&response, "EUMETSAT_License"), TermsStatus::NotAccepted);
        assert_eq!(terms_status(&json!({}), "x"), TermsStatus::NotAccepted);
    }
}
