//! Search request and result types

use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::QueryError;

/// Broker search request, a JSON object that always names its dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SearchQuery {
    body: Map<String, Value>,
}

impl SearchQuery {
    /// Query with only a dataset identifier
    pub fn for_dataset(dataset_id: impl Into<String>) -> Self {
        let mut body = Map::new();
        body.insert("dataset_id".to_string(), Value::String(dataset_id.into()));
        Self { body }
    }

    /// Wrap an existing JSON query
    ///
    /// # Errors
    ///
    /// Returns `QueryError::NotAnObject` or `QueryError::MissingDatasetId`.
    pub fn from_value(value: Value) -> Result<Self, QueryError> {
        let Value::Object(body) = value else {
            return Err(QueryError::NotAnObject);
        };
        match body.get("dataset_id") {
            Some(Value::String(id)) if !id.trim().is_empty() => Ok(Self { body }),
            _ => Err(QueryError::MissingDatasetId),
        }
    }

    /// Parse a JSON query document
    pub fn from_json_str(text: &str) -> Result<Self, QueryError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    pub fn dataset_id(&self) -> &str {
        self.body
            .get("dataset_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.body.get(field)
    }

    pub(crate) fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.body.insert(field.into(), value);
    }

    /// Fields other than the dataset identifier
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.body.iter().filter(|(key, _)| key.as_str() != "dataset_id")
    }

    /// Request body with paging parameters added
    pub fn page_body(&self, start_index: u32, items_per_page: u32) -> Value {
        let mut body = self.body.clone();
        body.insert("startIndex".to_string(), start_index.into());
        body.insert("itemsPerPage".to_string(), items_per_page.into());
        Value::Object(body)
    }
}

/// One downloadable product
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    pub id: String,
    /// Size in bytes, when the broker reports one
    pub size: Option<u64>,
    pub download_url: String,
}

impl SearchMatch {
    pub fn result_identifier(&self) -> &str {
        &self.id
    }

    pub fn download_url(&self) -> &str {
        &self.download_url
    }
}

/// Products found by one search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultSet {
    pub matches: Vec<SearchMatch>,
    /// Aggregate size in bytes
    pub volume: Option<u64>,
}

impl ResultSet {
    pub fn new(matches: Vec<SearchMatch>) -> Self {
        let volume = matches
            .iter()
            .map(|m| m.size)
            .sum::<Option<u64>>()
            .filter(|_| !matches.is_empty());
        Self { matches, volume }
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SearchMatch> {
        self.matches.iter()
    }

    /// Result identifiers in result order
    pub fn ids(&self) -> Vec<String> {
        self.matches.iter().map(|m| m.id.clone()).collect()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a SearchMatch;
    type IntoIter = std::slice::Iter<'a, SearchMatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.iter()
    }
}
