//! Loader backed by a [`QueryApi`] transport.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use query_model_core::model::Row;
use query_model_core::{QueryInfo, QueryModel, RowsResponse};
use serde_json::Value;

use crate::api::{id_set, QueryApi, QueryDetailsRequest, SelectRowsRequest, SelectRowsResponse, SelectionKey};
use crate::error::LoaderResult;
use crate::loader::QueryModelLoader;

/// Translates model snapshots into [`QueryApi`] requests and responses back
/// into model-shaped results.
pub struct DefaultQueryModelLoader<A> {
    api: A,
}

impl<A: QueryApi> DefaultQueryModelLoader<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }
}

#[async_trait]
impl<A: QueryApi> QueryModelLoader for DefaultQueryModelLoader<A> {
    async fn load_query_info(&self, model: &QueryModel) -> LoaderResult<QueryInfo> {
        let request = QueryDetailsRequest::from_model(model);
        self.api.get_query_details(&request).await
    }

    async fn load_rows(&self, model: &QueryModel) -> LoaderResult<RowsResponse> {
        let request = SelectRowsRequest::from_model(model)?;
        tracing::debug!(
            "Selecting rows for model {}: {}",
            model.id(),
            request.to_query_string()
        );
        let response = self.api.select_rows(&request).await?;
        Ok(keyed_rows(model, response))
    }

    async fn load_selections(&self, model: &QueryModel) -> LoaderResult<BTreeSet<String>> {
        let key = SelectionKey::from_model(model);
        self.api.get_selected(&key).await.map(id_set)
    }

    async fn set_selections(
        &self,
        model: &QueryModel,
        checked: bool,
        keys: &[String],
    ) -> LoaderResult<()> {
        let key = SelectionKey::from_model(model);
        self.api.set_selected(&key, checked, keys).await
    }

    async fn replace_selections(&self, model: &QueryModel, keys: &[String]) -> LoaderResult<()> {
        let key = SelectionKey::from_model(model);
        self.api.replace_selected(&key, keys).await
    }

    async fn clear_selections(&self, model: &QueryModel) -> LoaderResult<()> {
        let key = SelectionKey::from_model(model);
        self.api.clear_selected(&key).await
    }

    async fn select_all_rows(&self, model: &QueryModel) -> LoaderResult<BTreeSet<String>> {
        let key = SelectionKey::from_model(model);
        self.api.select_all(&key).await.map(id_set)
    }
}

/// Keys each row by its primary key value.
///
/// Compound keys join with `,`. Rows without a usable key, or whose key
/// repeats an earlier row's, are keyed by absolute position
/// (`offset + index`), moving past positions already taken as keys.
fn keyed_rows(model: &QueryModel, response: SelectRowsResponse) -> RowsResponse {
    let pk: Vec<String> = model
        .query_info()
        .map(|info| info.pk_field_keys().into_iter().map(str::to_string).collect())
        .unwrap_or_default();

    let mut rows = HashMap::with_capacity(response.rows.len());
    let mut ordered_rows = Vec::with_capacity(response.rows.len());
    for (index, row) in response.rows.into_iter().enumerate() {
        let key = match row_key(&row, &pk) {
            Some(key) if !rows.contains_key(&key) => key,
            _ => {
                let mut position = model.offset() + index as u64;
                while rows.contains_key(&position.to_string()) {
                    position += 1;
                }
                position.to_string()
            }
        };
        ordered_rows.push(key.clone());
        rows.insert(key, row);
    }

    RowsResponse {
        rows,
        ordered_rows,
        row_count: response.row_count,
        messages: response.messages,
    }
}

fn row_key(row: &Row, pk: &[String]) -> Option<String> {
    if pk.is_empty() {
        return None;
    }
    let parts = pk
        .iter()
        .map(|field_key| cell(row, field_key).and_then(cell_value))
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join(","))
}

fn cell<'a>(row: &'a Row, field_key: &str) -> Option<&'a Value> {
    row.get(field_key).or_else(|| {
        row.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(field_key))
            .map(|(_, value)| value)
    })
}

/// Raw scalar of a cell; formatted cells carry it in `value`.
fn cell_value(cell: &Value) -> Option<String> {
    let raw = match cell {
        Value::Object(formatted) => formatted.get("value")?,
        other => other,
    };
    match raw {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use query_model_core::{QueryColumn, QueryConfig, SchemaQuery};
    use serde_json::json;

    fn model(pk: &[&str]) -> QueryModel {
        let mut info = QueryInfo::new("lists", "Fruit");
        info.columns = vec![QueryColumn::new("Key"), QueryColumn::new("Name")];
        info.pk_cols = pk.iter().map(|k| k.to_string()).collect();
        QueryModel::new(QueryConfig::new(SchemaQuery::new("lists", "Fruit")))
            .unwrap()
            .query_info_loaded(Arc::new(info))
            .with_offset(20)
    }

    fn response(rows: Vec<Value>) -> SelectRowsResponse {
        SelectRowsResponse {
            rows: rows
                .into_iter()
                .filter_map(|r| match r {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
            row_count: 100,
            messages: Vec::new(),
        }
    }

    #[test]
    fn test_rows_keyed_by_primary_key() {
        let keyed = keyed_rows(
            &model(&["Key"]),
            response(vec![
                json!({"Key": {"value": 7}, "Name": {"value": "apple"}}),
                json!({"key": "k-8", "Name": {"value": "pear"}}),
            ]),
        );
        assert_eq!(keyed.ordered_rows, vec!["7".to_string(), "k-8".to_string()]);
        assert_eq!(keyed.row_count, 100);
        assert!(keyed.rows.contains_key("7"));
    }

    #[test]
    fn test_compound_keys_join() {
        let keyed = keyed_rows(
            &model(&["Key", "Name"]),
            response(vec![json!({"Key": 1, "Name": "apple"})]),
        );
        assert_eq!(keyed.ordered_rows, vec!["1,apple".to_string()]);
    }

    #[test]
    fn test_missing_or_duplicate_keys_fall_back_to_position() {
        let keyed = keyed_rows(
            &model(&["Key"]),
            response(vec![
                json!({"Key": {"value": null}}),
                json!({"Key": 5}),
                json!({"Key": 5}),
            ]),
        );
        assert_eq!(
            keyed.ordered_rows,
            vec!["20".to_string(), "5".to_string(), "22".to_string()]
        );
        assert_eq!(keyed.rows.len(), 3);
    }

    #[test]
    fn test_positional_key_skips_taken_keys() {
        let keyed = keyed_rows(
            &model(&["Key"]),
            response(vec![json!({"Key": 21}), json!({"Key": null})]),
        );
        assert_eq!(keyed.ordered_rows, vec!["21".to_string(), "22".to_string()]);
        assert_eq!(keyed.rows.len(), 2);
        assert_eq!(keyed.rows["21"].get("Key"), Some(&json!(21)));
    }
}
