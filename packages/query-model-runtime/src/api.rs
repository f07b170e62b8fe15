//! Remote query API seam and the request/response shapes it speaks.
//!
//! [`QueryApi`] is the transport boundary: query details, row selection, and
//! persisted row selections. No concrete client ships here; the default
//! loader drives whatever implementation is plugged in.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use query_model_core::model::Row;
use query_model_core::{Filter, QueryInfo, QueryModel, QueryModelError, ViewName};
use serde::{Deserialize, Serialize};

use crate::error::LoaderResult;

/// Characters left unescaped in query strings.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Prefix the server expects for data region parameters.
const REGION: &str = "query";

/// Transport-level query API.
#[async_trait]
pub trait QueryApi: Send + Sync {
    async fn get_query_details(&self, request: &QueryDetailsRequest) -> LoaderResult<QueryInfo>;

    async fn select_rows(&self, request: &SelectRowsRequest) -> LoaderResult<SelectRowsResponse>;

    async fn get_selected(&self, key: &SelectionKey) -> LoaderResult<Vec<String>>;

    async fn set_selected(&self, key: &SelectionKey, checked: bool, ids: &[String]) -> LoaderResult<()>;

    async fn replace_selected(&self, key: &SelectionKey, ids: &[String]) -> LoaderResult<()>;

    async fn clear_selected(&self, key: &SelectionKey) -> LoaderResult<()>;

    async fn select_all(&self, key: &SelectionKey) -> LoaderResult<Vec<String>>;
}

/// Request for a query's column and view metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDetailsRequest {
    pub schema_name: String,
    pub query_name: String,
    pub view_name: Option<String>,
    pub container_path: Option<String>,
}

impl QueryDetailsRequest {
    pub fn from_model(model: &QueryModel) -> Self {
        let sq = model.schema_query();
        Self {
            schema_name: sq.schema_name.clone(),
            query_name: sq.query_name.clone(),
            view_name: named_view(model.view_name()),
            container_path: model.container_path().map(str::to_string),
        }
    }
}

/// Request for one page of rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectRowsRequest {
    pub schema_name: String,
    pub query_name: String,
    pub view_name: Option<String>,
    pub container_path: Option<String>,
    pub container_filter: Option<String>,
    pub columns: String,
    pub sort: String,
    pub filters: Vec<Filter>,
    pub offset: u64,
    /// Page size; `<= 0` requests all rows
    pub max_rows: i64,
    pub parameters: BTreeMap<String, String>,
    pub include_total_count: bool,
}

impl SelectRowsRequest {
    /// Derives the request from a model snapshot.
    ///
    /// Fails when the model's metadata has not loaded, since columns, sorts,
    /// and filters all depend on it.
    pub fn from_model(model: &QueryModel) -> Result<Self, QueryModelError> {
        let sq = model.schema_query();
        Ok(Self {
            schema_name: sq.schema_name.clone(),
            query_name: sq.query_name.clone(),
            view_name: named_view(model.view_name()),
            container_path: model.container_path().map(str::to_string),
            container_filter: model.container_filter().map(str::to_string),
            columns: model.column_string()?,
            sort: model.sort_string()?,
            filters: model.filters()?,
            offset: model.offset(),
            max_rows: model.max_rows(),
            parameters: model.query_parameters().clone(),
            include_total_count: model.include_total_count(),
        })
    }

    /// Request parameters in the server's data region format.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("schemaName".to_string(), self.schema_name.clone()),
            (format!("{REGION}.queryName"), self.query_name.clone()),
        ];
        if let Some(view) = &self.view_name {
            params.push((format!("{REGION}.viewName"), view.clone()));
        }
        if !self.columns.is_empty() {
            params.push((format!("{REGION}.columns"), self.columns.clone()));
        }
        if !self.sort.is_empty() {
            params.push((format!("{REGION}.sort"), self.sort.clone()));
        }
        if self.offset > 0 {
            params.push((format!("{REGION}.offset"), self.offset.to_string()));
        }
        if self.max_rows > 0 {
            params.push((format!("{REGION}.maxRows"), self.max_rows.to_string()));
        } else {
            params.push((format!("{REGION}.showRows"), "all".to_string()));
        }
        if let Some(container_filter) = &self.container_filter {
            params.push((
                format!("{REGION}.containerFilterName"),
                container_filter.clone(),
            ));
        }
        for (name, value) in &self.parameters {
            params.push((format!("{REGION}.param.{name}"), value.clone()));
        }
        for filter in &self.filters {
            params.push((
                filter.url_param_name(REGION),
                filter.url_param_value().to_string(),
            ));
        }
        params.push((
            "includeTotalCount".to_string(),
            self.include_total_count.to_string(),
        ));
        params
    }

    /// Percent-encoded query string for [`to_params`](Self::to_params).
    pub fn to_query_string(&self) -> String {
        encode_query_string(&self.to_params())
    }
}

/// One page of rows as returned by the server.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRowsResponse {
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub row_count: u64,
    #[serde(default)]
    pub messages: Vec<String>,
}

/// Identifies a persisted selection: the model plus the filter context the
/// selection was made in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionKey {
    pub key: String,
    pub schema_name: String,
    pub query_name: String,
    pub view_name: Option<String>,
    pub container_path: Option<String>,
    pub filters: Vec<Filter>,
    pub query_parameters: BTreeMap<String, String>,
}

impl SelectionKey {
    /// Derives the key from a model snapshot. Filters are only available
    /// once metadata has loaded; before that the key carries none.
    pub fn from_model(model: &QueryModel) -> Self {
        let sq = model.schema_query();
        Self {
            key: model.id().to_string(),
            schema_name: sq.schema_name.clone(),
            query_name: sq.query_name.clone(),
            view_name: named_view(model.view_name()),
            container_path: model.container_path().map(str::to_string),
            filters: model.filters().unwrap_or_default(),
            query_parameters: model.query_parameters().clone(),
        }
    }
}

/// Collects selected ids into a set.
pub(crate) fn id_set(ids: Vec<String>) -> BTreeSet<String> {
    ids.into_iter().collect()
}

fn named_view(view: Option<&ViewName>) -> Option<String> {
    view.filter(|v| **v != ViewName::Default)
        .map(|v| v.as_str().to_string())
}

/// Percent-encodes `name=value` pairs joined with `&`.
pub fn encode_query_string(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(name, value)| {
            format!(
                "{}={}",
                utf8_percent_encode(name, QUERY_ENCODE_SET),
                utf8_percent_encode(value, QUERY_ENCODE_SET)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Parses a URL query string into decoded parameters.
///
/// Pairs without `=` decode to an empty value; a leading `?` is ignored.
/// Later duplicates win.
pub fn parse_query_string(query: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    for pair in query.trim_start_matches('?').split('&') {
        if pair.is_empty() {
            continue;
        }
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let name = percent_decode_str(&name.replace('+', " "))
            .decode_utf8_lossy()
            .to_string();
        let value = percent_decode_str(&value.replace('+', " "))
            .decode_utf8_lossy()
            .to_string();
        params.insert(name, value);
    }
    params
}
