//! Immutable client-side model of one query result.
//!
//! A [`QueryModel`] holds a query's configuration together with the
//! snapshot loaded so far: metadata, the current page of rows, and the
//! selection. It never performs I/O. Every update returns a new model;
//! heavy fields sit behind `Arc` so unchanged data is shared between
//! versions.

mod derived;
mod paging;
mod selection;
mod url;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde_json::Value;

use crate::config::QueryConfig;
use crate::error::{QueryModelError, Result};
use crate::filter::Filter;
use crate::load_state::LoadStatus;
use crate::query_info::QueryInfo;
use crate::schema_query::{SchemaQuery, ViewName};
use crate::sort::QuerySort;

pub use derived::{KeyFilterWarning, REPLACED_COLUMN};
pub use selection::SelectedState;
pub use url::UrlState;

/// One row as returned by the server, keyed by field key.
pub type Row = serde_json::Map<String, Value>;

/// One page of rows as delivered by a loader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowsResponse {
    /// Row values keyed by opaque row key
    pub rows: HashMap<String, Row>,
    /// Display order of the keys in `rows`
    pub ordered_rows: Vec<String>,
    /// Total matching rows on the server, not just this page
    pub row_count: u64,
    pub messages: Vec<String>,
}

/// Configuration plus loaded state of one query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryModel {
    id: String,
    schema_query: SchemaQuery,
    base_filters: Vec<Filter>,
    container_path: Option<String>,
    container_filter: Option<String>,
    required_columns: Vec<String>,
    omitted_columns: Vec<String>,
    query_parameters: BTreeMap<String, String>,
    key_value: Option<String>,
    url_prefix: String,
    include_total_count: bool,
    default_max_rows: i64,

    offset: u64,
    max_rows: i64,
    filter_array: Vec<Filter>,
    sorts: Vec<QuerySort>,

    query_info: Option<Arc<QueryInfo>>,
    query_info_status: LoadStatus,

    rows: Option<Arc<HashMap<String, Row>>>,
    ordered_rows: Option<Arc<Vec<String>>>,
    row_count: Option<u64>,
    messages: Arc<Vec<String>>,
    rows_status: LoadStatus,

    selections: Option<Arc<BTreeSet<String>>>,
    selections_status: LoadStatus,
}

impl QueryModel {
    /// Builds an unloaded model from `config`.
    ///
    /// Fails with [`QueryModelError::MissingSchemaQuery`] when the config has
    /// no schema/query identity.
    pub fn new(config: QueryConfig) -> Result<Self> {
        let schema_query = config
            .schema_query
            .ok_or(QueryModelError::MissingSchemaQuery)?;
        let id = config.id.unwrap_or_else(|| schema_query.model_id());

        Ok(Self {
            id,
            schema_query,
            base_filters: config.base_filters,
            container_path: config.container_path,
            container_filter: config.container_filter,
            required_columns: config.required_columns,
            omitted_columns: config.omitted_columns,
            query_parameters: config.query_parameters,
            key_value: config.key_value,
            url_prefix: config.url_prefix,
            include_total_count: config.include_total_count,
            default_max_rows: config.max_rows,
            offset: config.offset,
            max_rows: config.max_rows,
            filter_array: Vec::new(),
            sorts: config.sorts,
            query_info: None,
            query_info_status: LoadStatus::initialized(),
            rows: None,
            ordered_rows: None,
            row_count: None,
            messages: Arc::new(Vec::new()),
            rows_status: LoadStatus::initialized(),
            selections: None,
            selections_status: LoadStatus::initialized(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn schema_query(&self) -> &SchemaQuery {
        &self.schema_query
    }

    pub fn view_name(&self) -> Option<&ViewName> {
        self.schema_query.view_name.as_ref()
    }

    pub fn base_filters(&self) -> &[Filter] {
        &self.base_filters
    }

    /// Filters applied by the user, separate from base and view filters.
    pub fn filter_array(&self) -> &[Filter] {
        &self.filter_array
    }

    /// Sorts applied by the user, separate from view sorts.
    pub fn sorts(&self) -> &[QuerySort] {
        &self.sorts
    }

    pub fn container_path(&self) -> Option<&str> {
        self.container_path.as_deref()
    }

    pub fn container_filter(&self) -> Option<&str> {
        self.container_filter.as_deref()
    }

    pub fn required_columns(&self) -> &[String] {
        &self.required_columns
    }

    pub fn omitted_columns(&self) -> &[String] {
        &self.omitted_columns
    }

    pub fn query_parameters(&self) -> &BTreeMap<String, String> {
        &self.query_parameters
    }

    pub fn key_value(&self) -> Option<&str> {
        self.key_value.as_deref()
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    pub fn include_total_count(&self) -> bool {
        self.include_total_count
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn max_rows(&self) -> i64 {
        self.max_rows
    }

    pub fn query_info(&self) -> Option<&QueryInfo> {
        self.query_info.as_deref()
    }

    pub fn query_info_status(&self) -> &LoadStatus {
        &self.query_info_status
    }

    pub fn query_info_error(&self) -> Option<&str> {
        self.query_info_status.error()
    }

    pub fn rows(&self) -> Option<&HashMap<String, Row>> {
        self.rows.as_deref()
    }

    pub fn ordered_rows(&self) -> Option<&[String]> {
        self.ordered_rows.as_deref().map(Vec::as_slice)
    }

    /// Total matching rows on the server, once rows have loaded.
    pub fn row_count(&self) -> Option<u64> {
        self.row_count
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn rows_status(&self) -> &LoadStatus {
        &self.rows_status
    }

    pub fn rows_error(&self) -> Option<&str> {
        self.rows_status.error()
    }

    pub fn selections(&self) -> Option<&BTreeSet<String>> {
        self.selections.as_deref()
    }

    pub fn selections_status(&self) -> &LoadStatus {
        &self.selections_status
    }

    pub fn selections_error(&self) -> Option<&str> {
        self.selections_status.error()
    }

    /// True until both query info and rows have settled. Failures settle too.
    pub fn is_loading(&self) -> bool {
        !(self.query_info_status.is_settled() && self.rows_status.is_settled())
    }

    /// True once any row load has succeeded, even if it returned no rows.
    pub fn has_data(&self) -> bool {
        self.rows.is_some()
    }

    pub fn has_rows(&self) -> bool {
        self.ordered_rows.as_ref().is_some_and(|rows| !rows.is_empty())
    }

    /// Rows in display order.
    ///
    /// Returns references into the loaded row map; no row is copied. Fails
    /// when no rows have been loaded yet.
    pub fn grid_data(&self) -> Result<Vec<&Row>> {
        let (Some(rows), Some(ordered)) = (&self.rows, &self.ordered_rows) else {
            return Err(QueryModelError::RowsNotLoaded {
                id: self.id.clone(),
            });
        };
        ordered
            .iter()
            .map(|key| {
                rows.get(key).ok_or_else(|| QueryModelError::MissingRow {
                    id: self.id.clone(),
                    key: key.clone(),
                })
            })
            .collect()
    }

    /// Looks up a loaded row by key.
    pub fn row(&self, key: &str) -> Option<&Row> {
        self.rows.as_ref()?.get(key)
    }

    // Updates. Each returns a new model and leaves `self` untouched.

    /// Moves the page window.
    pub fn with_offset(&self, offset: u64) -> Self {
        Self {
            offset,
            ..self.clone()
        }
    }

    /// Changes the page size; the window returns to the first page.
    pub fn with_max_rows(&self, max_rows: i64) -> Self {
        Self {
            max_rows,
            offset: 0,
            ..self.clone()
        }
    }

    pub fn with_filters(&self, filters: Vec<Filter>) -> Self {
        Self {
            filter_array: filters,
            ..self.clone()
        }
    }

    pub fn with_sorts(&self, sorts: Vec<QuerySort>) -> Self {
        Self {
            sorts,
            ..self.clone()
        }
    }

    /// Switches to another view of the same query. Rows and selections no
    /// longer match the new column set and are reset; metadata is kept.
    pub fn with_view(&self, view_name: Option<ViewName>) -> Self {
        Self {
            schema_query: self.schema_query.with_view(view_name),
            ..self.clone()
        }
        .reset_rows()
        .reset_selections()
    }

    /// Points the model at another schema/query. Everything loaded is reset.
    pub fn with_schema_query(&self, schema_query: SchemaQuery) -> Self {
        Self {
            schema_query,
            ..self.clone()
        }
        .reset_query_info()
        .reset_rows()
        .reset_selections()
    }

    pub fn reset_query_info(&self) -> Self {
        Self {
            query_info: None,
            query_info_status: LoadStatus::initialized(),
            ..self.clone()
        }
    }

    pub fn reset_rows(&self) -> Self {
        Self {
            rows: None,
            ordered_rows: None,
            row_count: None,
            messages: Arc::new(Vec::new()),
            rows_status: LoadStatus::initialized(),
            ..self.clone()
        }
    }

    pub fn reset_selections(&self) -> Self {
        Self {
            selections: None,
            selections_status: LoadStatus::initialized(),
            ..self.clone()
        }
    }

    pub fn query_info_loading(&self) -> Self {
        Self {
            query_info_status: LoadStatus::loading(),
            ..self.clone()
        }
    }

    pub fn query_info_loaded(&self, query_info: Arc<QueryInfo>) -> Self {
        Self {
            query_info: Some(query_info),
            query_info_status: LoadStatus::loaded(),
            ..self.clone()
        }
    }

    pub fn query_info_failed(&self, message: impl Into<String>) -> Self {
        Self {
            query_info_status: LoadStatus::failed(message),
            ..self.clone()
        }
    }

    /// Marks a row request in flight. Rows already shown stay until the
    /// response lands.
    pub fn rows_loading(&self) -> Self {
        Self {
            rows_status: LoadStatus::loading(),
            ..self.clone()
        }
    }

    pub fn rows_loaded(&self, response: RowsResponse) -> Self {
        Self {
            rows: Some(Arc::new(response.rows)),
            ordered_rows: Some(Arc::new(response.ordered_rows)),
            row_count: Some(response.row_count),
            messages: Arc::new(response.messages),
            rows_status: LoadStatus::loaded(),
            ..self.clone()
        }
    }

    pub fn rows_failed(&self, message: impl Into<String>) -> Self {
        Self {
            rows_status: LoadStatus::failed(message),
            ..self.clone()
        }
    }

    pub fn selections_loading(&self) -> Self {
        Self {
            selections_status: LoadStatus::loading(),
            ..self.clone()
        }
    }

    pub fn selections_loaded(&self, selections: BTreeSet<String>) -> Self {
        Self {
            selections: Some(Arc::new(selections)),
            selections_status: LoadStatus::loaded(),
            ..self.clone()
        }
    }

    pub fn selections_failed(&self, message: impl Into<String>) -> Self {
        Self {
            selections_status: LoadStatus::failed(message),
            ..self.clone()
        }
    }

    fn require_query_info(&self, operation: &'static str) -> Result<&QueryInfo> {
        self.query_info
            .as_deref()
            .ok_or_else(|| QueryModelError::QueryInfoNotLoaded {
                id: self.id.clone(),
                operation,
            })
    }
}
