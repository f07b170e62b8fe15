//! Query models built from serialized configs and metadata.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use query_model_core::model::REPLACED_COLUMN;
use query_model_core::{
    Filter, FilterType, LoadingState, QueryConfig, QueryInfo, QueryModel, QuerySort, ViewName,
};

const SAMPLES_INFO: &str = r#"{
    "schemaName": "samples",
    "name": "Blood",
    "title": "Blood Samples",
    "columns": [
        {"fieldKey": "RowId", "isKeyField": true, "hidden": true},
        {"fieldKey": "Name", "caption": "Sample ID"},
        {"fieldKey": "Volume", "jsonType": "float"},
        {"fieldKey": "Replaced", "hidden": true}
    ],
    "views": [
        {
            "name": "~~DEFAULT~~",
            "columns": [{"fieldKey": "Name"}, {"fieldKey": "Volume"}],
            "sorts": [{"fieldKey": "Name", "dir": "DESC"}]
        },
        {
            "name": "Small",
            "label": "Small samples",
            "columns": [{"fieldKey": "Name"}],
            "filters": [{"column": "Volume", "filterType": "lt", "value": "5"}]
        }
    ]
}"#;

fn samples_info() -> Arc<QueryInfo> {
    Arc::new(serde_json::from_str(SAMPLES_INFO).unwrap())
}

#[test]
fn test_grid_model_from_json() {
    let config: QueryConfig = serde_json::from_str(
        r#"{
            "schemaQuery": {"schemaName": "samples", "queryName": "Blood"},
            "baseFilters": [{"column": "Volume", "filterType": "isnonblank"}],
            "sorts": [{"fieldKey": "Volume"}],
            "maxRows": 50
        }"#,
    )
    .unwrap();
    assert_eq!(config.url_prefix, "query");
    assert!(config.include_total_count);

    let model = QueryModel::new(config).unwrap();
    assert_eq!(model.id(), "samples-Blood");
    assert_eq!(model.query_info_status().state, LoadingState::Initialized);

    let model = model.query_info_loaded(samples_info());
    assert_eq!(model.column_string().unwrap(), "RowId,Name,Volume");
    assert_eq!(model.sort_string().unwrap(), "Volume,-Name");
    assert_eq!(
        model.filters().unwrap(),
        vec![Filter::new("Volume", FilterType::IsNonBlank, None)]
    );
}

#[test]
fn test_named_view_filters_and_columns() {
    let config: QueryConfig = serde_json::from_str(
        r#"{"schemaQuery": {"schemaName": "samples", "queryName": "Blood", "viewName": "Small"}}"#,
    )
    .unwrap();
    let model = QueryModel::new(config)
        .unwrap()
        .query_info_loaded(samples_info());

    assert_eq!(model.id(), "samples-Blood-Small");
    assert_eq!(model.column_string().unwrap(), "RowId,Name");
    assert_eq!(model.sort_string().unwrap(), "");
    assert_eq!(
        model.filters().unwrap(),
        vec![Filter::new("Volume", FilterType::Lt, Some("5".to_string()))]
    );
}

#[test]
fn test_detail_model_skips_replaced_rows() {
    let config: QueryConfig = serde_json::from_str(
        r#"{
            "schemaQuery": {"schemaName": "samples", "queryName": "Blood", "viewName": "~~DETAILS~~"},
            "keyValue": "7"
        }"#,
    )
    .unwrap();
    let model = QueryModel::new(config)
        .unwrap()
        .query_info_loaded(samples_info())
        .with_sorts(vec![QuerySort::asc("Volume")]);

    assert_eq!(model.view_name(), Some(&ViewName::Detail));
    assert_eq!(
        model.filters().unwrap(),
        vec![
            Filter::equal("RowId", "7"),
            Filter::new(REPLACED_COLUMN, FilterType::IsNonBlank, None),
        ]
    );
    assert_eq!(model.key_filter_warning(), None);
}

#[test]
fn test_config_serializes_camel_case() {
    let config = QueryConfig::default().with_id("grid").with_max_rows(-1);
    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["id"], "grid");
    assert_eq!(json["maxRows"], -1);
    assert_eq!(json["urlPrefix"], "query");
}
