//! Product search against the data broker
//!
//! Searches go through [`SearchGuard`], which enforces a wall-clock budget
//! independent of the client's own retry behaviour. Queries are either taken
//! as written or validated against the dataset's [`FieldSchema`].

pub mod client;
pub mod fields;
pub mod guard;
pub mod models;
pub mod summary;
pub mod terms;

pub use client::{BrokerClient, SearchClient};
pub use fields::{FieldDefinition, FieldKind, FieldSchema, QueryBuilder};
pub use guard::SearchGuard;
pub use models::{ResultSet, SearchMatch, SearchQuery};
pub use summary::{format_size, SearchSummary};
pub use terms::{check_terms, TermsStatus};

use crate::constants::search;
use crate::errors::SearchResult;

/// Fetch and type the queryable fields of a dataset
pub async fn load_field_schema<C: SearchClient + ?Sized>(
    client: &C,
    dataset_id: &str,
) -> SearchResult<FieldSchema> {
    let path = format!("{}/{}", search::QUERYABLE_PATH, dataset_id);
    let queryables = client.get(&path).await?;
    Ok(FieldSchema::from_queryables(&queryables))
}
