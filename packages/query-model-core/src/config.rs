//! Query model configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::filter::Filter;
use crate::schema_query::SchemaQuery;
use crate::sort::QuerySort;

/// Default page size for new models.
pub const DEFAULT_MAX_ROWS: i64 = 20;

/// Default prefix for URL-bound grid state.
pub const DEFAULT_URL_PREFIX: &str = "query";

/// Creation-time input for a [`QueryModel`](crate::model::QueryModel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryConfig {
    /// Explicit model id (derived from `schema_query` when absent)
    pub id: Option<String>,
    /// Schema/query/view identity; required at model construction
    pub schema_query: Option<SchemaQuery>,
    /// Filters applied regardless of user interaction
    pub base_filters: Vec<Filter>,
    /// Initial user sorts
    pub sorts: Vec<QuerySort>,
    /// Container (folder) path requests are scoped to
    pub container_path: Option<String>,
    /// Container filter name, e.g. `CurrentAndSubfolders`
    pub container_filter: Option<String>,
    /// Initial row offset
    pub offset: u64,
    /// Page size; `<= 0` means all rows
    pub max_rows: i64,
    /// Columns always requested
    pub required_columns: Vec<String>,
    /// Columns never requested (case-insensitive)
    pub omitted_columns: Vec<String>,
    /// Parameters for parameterized queries
    pub query_parameters: BTreeMap<String, String>,
    /// Single primary key value for detail models
    pub key_value: Option<String>,
    /// Prefix for URL-bound state
    pub url_prefix: String,
    /// Ask the server for the total row count
    pub include_total_count: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            id: None,
            schema_query: None,
            base_filters: Vec::new(),
            sorts: Vec::new(),
            container_path: None,
            container_filter: None,
            offset: 0,
            max_rows: DEFAULT_MAX_ROWS,
            required_columns: Vec::new(),
            omitted_columns: Vec::new(),
            query_parameters: BTreeMap::new(),
            key_value: None,
            url_prefix: DEFAULT_URL_PREFIX.to_string(),
            include_total_count: true,
        }
    }
}

impl QueryConfig {
    /// Config for `schema_query` with default settings.
    pub fn new(schema_query: SchemaQuery) -> Self {
        Self {
            schema_query: Some(schema_query),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_max_rows(mut self, max_rows: i64) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn with_base_filters(mut self, filters: Vec<Filter>) -> Self {
        self.base_filters = filters;
        self
    }

    pub fn with_key_value(mut self, key_value: impl Into<String>) -> Self {
        self.key_value = Some(key_value.into());
        self
    }
}
