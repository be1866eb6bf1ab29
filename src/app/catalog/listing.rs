//! Broker dataset listing

use serde_json::Value;

use super::models::DatasetDescriptor;
use crate::constants::catalog;

/// Relative broker path listing every dataset in one page
pub fn listing_path() -> String {
    format!(
        "datasets?startIndex=0&itemsPerPage={}&q=",
        catalog::LISTING_PAGE_SIZE
    )
}

/// Extract dataset descriptors from a listing response
///
/// The broker answers either with a bare array or with an object holding the
/// entries under `features` or `content`. Entries without an identifier are
/// skipped. The result is sorted by title, case-insensitively.
pub fn parse_dataset_listing(response: &Value) -> Vec<DatasetDescriptor> {
    let entries = match response {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => map
            .get("features")
            .or_else(|| map.get("content"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[],
    };

    let mut descriptors: Vec<DatasetDescriptor> =
        entries.iter().filter_map(descriptor_from_entry).collect();
    descriptors.sort_by_key(|d| d.title.to_lowercase());
    descriptors
}

fn descriptor_from_entry(entry: &Value) -> Option<DatasetDescriptor> {
    let dataset_id = entry.get("dataset_id")?.as_str()?.to_string();
    let metadata = entry.get("metadata").cloned().unwrap_or(Value::Null);

    let text = |key: &str| metadata.get(key).and_then(Value::as_str).map(str::to_string);

    let title = text("datasetTitle").unwrap_or_else(|| dataset_id.clone());
    let abstract_text = text("abstract").unwrap_or_else(|| catalog::NO_DESCRIPTION.to_string());

    let terms = entry
        .get("terms")
        .and_then(Value::as_array)
        .map(|terms| {
            terms
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let thumbnail = match metadata.get("thumbnails") {
        Some(Value::String(url)) => Some(url.clone()),
        Some(Value::Array(urls)) => urls.first().and_then(Value::as_str).map(str::to_string),
        _ => None,
    };

    Some(DatasetDescriptor {
        capability_urls: advertised_capability_urls(&metadata),
        dataset_id,
        title,
        abstract_text,
        terms,
        temporal_begin: text("tempextent_begin"),
        temporal_end: text("tempextent_end"),
        thumbnail,
    })
}

/// `digitalTransfers[*].availability[*].url` values that request capabilities
fn advertised_capability_urls(metadata: &Value) -> Vec<String> {
    let Some(transfers) = metadata.get("digitalTransfers").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut urls = Vec::new();
    for transfer in transfers {
        let availability: Vec<&Value> = match transfer.get("availability") {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(item @ Value::Object(_)) => vec![item],
            _ => continue,
        };

        for item in availability {
            if let Some(url) = item.get("url").and_then(Value::as_str) {
                if url.contains("GetCapabilities") && !urls.iter().any(|u| u == url) {
                    urls.push(url.to_string());
                }
            }
        }
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listing_from_features_sorted_by_title() {
        let response = json!({
            "features": [
                {"dataset_id": "B:ID", "metadata": {"datasetTitle": "zeta"}},
                {"dataset_id": "A:ID", "metadata": {"datasetTitle": "Alpha", "abstract": "first"}},
                {"metadata": {"datasetTitle": "no id"}}
            ]
        });

        let listing = parse_dataset_listing(&response);
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].dataset_id, "A:ID");
        assert_eq!(listing[0].abstract_text, "first");
        assert_eq!(listing[1].abstract_text, "No description available.");
    }

    #[test]
    fn test_listing_reads_transfers_and_terms() {
        let response = json!([{
            "dataset_id": "EO:EEA:DAT:CLMS",
            "terms": ["Copernicus_General_License"],
            "metadata": {
                "datasetTitle": "Land",
                "tempextent_begin": "2015-01-01T00:00:00Z",
                "thumbnails": ["https://img.example/thumb.png"],
                "digitalTransfers": [
                    {"availability": {"url": "https://maps.example/wms?request=GetCapabilities"}},
                    {"availability": [
                        {"url": "https://maps.example/wms?request=GetCapabilities"},
                        {"url": "https://maps.example/download"}
                    ]}
                ]
            }
        }]);

        let listing = parse_dataset_listing(&response);
        let entry = &listing[0];
        assert_eq!(entry.capability_urls, vec!["https://maps.example/wms?request=GetCapabilities"]);
        assert_eq!(entry.terms_of_use(), Some("Copernicus_General_License"));
        assert_eq!(entry.temporal_begin.as_deref(), Some("2015-01-01T00:00:00Z"));
        assert_eq!(entry.temporal_end, None);
        assert_eq!(entry.thumbnail.as_deref(), Some("https://img.example/thumb.png"));
    }

    #[test]
    fn test_listing_of_unexpected_shape_is_empty() {
        assert!(parse_dataset_listing(&json!("nope")).is_empty());
        assert!(parse_dataset_listing(&json!({"items": []})).is_empty());
    }
}
