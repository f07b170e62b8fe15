//! Controller integration tests.
//!
//! Drives [`QueryModels`] against an in-memory loader that counts requests
//! and can hold individual requests open to force out-of-order responses.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::Notify;

use query_model_core::model::{KeyFilterWarning, SelectedState};
use query_model_core::{
    Filter, QueryColumn, QueryConfig, QueryInfo, QueryModel, QuerySort, RowsResponse,
    SchemaQuery, ViewInfo, ViewName,
};
use query_model_runtime::{
    ControllerError, ControllerSettings, LoaderError, LoaderResult, ModelEvent,
    QueryModelLoader, QueryModels,
};

const ROW_COUNT: u64 = 661;

/// Request that blocks until released.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Held {
    QueryInfo(String),
    Rows(u64),
    LoadSelections,
    SetSelection(String),
}

struct Hold {
    request: Held,
    started: Arc<Notify>,
    release: Arc<Notify>,
}

#[derive(Default)]
struct FakeLoader {
    query_info_calls: AtomicUsize,
    rows_calls: AtomicUsize,
    selection_calls: AtomicUsize,
    fail_query_info: AtomicBool,
    fail_rows: AtomicBool,
    compound_key: AtomicBool,
    holds: Mutex<Vec<Hold>>,
    selected: Mutex<BTreeSet<String>>,
}

impl FakeLoader {
    fn query_info_calls(&self) -> usize {
        self.query_info_calls.load(Ordering::SeqCst)
    }

    fn rows_calls(&self) -> usize {
        self.rows_calls.load(Ordering::SeqCst)
    }

    /// Holds the next matching request; returns (started, release).
    fn hold(&self, request: Held) -> (Arc<Notify>, Arc<Notify>) {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        self.holds.lock().push(Hold {
            request,
            started: Arc::clone(&started),
            release: Arc::clone(&release),
        });
        (started, release)
    }

    fn hold_rows_at(&self, offset: u64) -> (Arc<Notify>, Arc<Notify>) {
        self.hold(Held::Rows(offset))
    }

    async fn wait_if_held(&self, matches: impl Fn(&Held) -> bool) {
        let held = {
            let mut holds = self.holds.lock();
            holds
                .iter()
                .position(|h| matches(&h.request))
                .map(|index| holds.remove(index))
        };
        if let Some(hold) = held {
            hold.started.notify_one();
            hold.release.notified().await;
        }
    }
}

#[async_trait]
impl QueryModelLoader for FakeLoader {
    async fn load_query_info(&self, model: &QueryModel) -> LoaderResult<QueryInfo> {
        self.query_info_calls.fetch_add(1, Ordering::SeqCst);
        let query_name = model.schema_query().query_name.clone();
        self.wait_if_held(|h| *h == Held::QueryInfo(query_name.clone()))
            .await;
        if self.fail_query_info.load(Ordering::SeqCst) {
            return Err(LoaderError::Request {
                status: 404,
                message: Some(format!("Query '{}' not found", model.schema_query().query_name)),
            });
        }
        let sq = model.schema_query();
        let mut info = QueryInfo::new(sq.schema_name.clone(), sq.query_name.clone());
        info.columns = vec![QueryColumn::key("RowId"), QueryColumn::new("Name")];
        if self.compound_key.load(Ordering::SeqCst) {
            info.pk_cols = vec!["RowId".to_string(), "Name".to_string()];
        }
        info.views = vec![
            ViewInfo::new(ViewName::Default).with_columns(["Name"]),
            ViewInfo::new(ViewName::Named("mine".to_string())).with_columns(["RowId", "Name"]),
        ];
        Ok(info)
    }

    async fn load_rows(&self, model: &QueryModel) -> LoaderResult<RowsResponse> {
        self.rows_calls.fetch_add(1, Ordering::SeqCst);
        let offset = model.offset();
        self.wait_if_held(|h| *h == Held::Rows(offset)).await;
        if self.fail_rows.load(Ordering::SeqCst) {
            return Err(LoaderError::Unavailable);
        }

        let page = model.page_size().unwrap_or(ROW_COUNT);
        let end = (model.offset() + page).min(ROW_COUNT);
        let mut rows = HashMap::new();
        let mut ordered_rows = Vec::new();
        for n in model.offset()..end {
            let key = n.to_string();
            if let serde_json::Value::Object(row) = json!({ "RowId": { "value": n } }) {
                rows.insert(key.clone(), row);
            }
            ordered_rows.push(key);
        }
        Ok(RowsResponse {
            rows,
            ordered_rows,
            row_count: ROW_COUNT,
            messages: Vec::new(),
        })
    }

    async fn load_selections(&self, _model: &QueryModel) -> LoaderResult<BTreeSet<String>> {
        self.selection_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_if_held(|h| *h == Held::LoadSelections).await;
        Ok(self.selected.lock().clone())
    }

    async fn set_selections(
        &self,
        _model: &QueryModel,
        checked: bool,
        keys: &[String],
    ) -> LoaderResult<()> {
        self.selection_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_if_held(|h| matches!(h, Held::SetSelection(key) if keys.contains(key)))
            .await;
        let mut selected = self.selected.lock();
        for key in keys {
            if checked {
                selected.insert(key.clone());
            } else {
                selected.remove(key);
            }
        }
        Ok(())
    }

    async fn replace_selections(&self, _model: &QueryModel, keys: &[String]) -> LoaderResult<()> {
        self.selection_calls.fetch_add(1, Ordering::SeqCst);
        *self.selected.lock() = keys.iter().cloned().collect();
        Ok(())
    }

    async fn clear_selections(&self, _model: &QueryModel) -> LoaderResult<()> {
        self.selection_calls.fetch_add(1, Ordering::SeqCst);
        self.selected.lock().clear();
        Ok(())
    }

    async fn select_all_rows(&self, _model: &QueryModel) -> LoaderResult<BTreeSet<String>> {
        self.selection_calls.fetch_add(1, Ordering::SeqCst);
        let all: BTreeSet<String> = (0..ROW_COUNT).map(|n| n.to_string()).collect();
        *self.selected.lock() = all.clone();
        Ok(all)
    }
}

fn fruit() -> SchemaQuery {
    SchemaQuery::new("lists", "Fruit")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn setup() -> (Arc<FakeLoader>, Arc<QueryModels>) {
    init_tracing();
    let loader = Arc::new(FakeLoader::default());
    let controller = Arc::new(QueryModels::with_loader(loader.clone()));
    (loader, controller)
}

async fn loaded(controller: &QueryModels) -> String {
    controller
        .add_model(QueryConfig::new(fruit()), true)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_add_model_loads_metadata_then_rows() {
    let (loader, controller) = setup();
    let id = loaded(&controller).await;

    assert_eq!(id, "lists-Fruit");
    assert_eq!(loader.query_info_calls(), 1);
    assert_eq!(loader.rows_calls(), 1);

    let model = controller.model(&id).unwrap();
    assert!(!model.is_loading());
    assert_eq!(model.row_count(), Some(ROW_COUNT));
    assert_eq!(model.page_count(), 34);
    assert_eq!(model.grid_data().unwrap().len(), 20);
}

#[tokio::test]
async fn test_add_model_without_load() {
    let (loader, controller) = setup();
    let id = controller
        .add_model(QueryConfig::new(fruit()), false)
        .await
        .unwrap();
    assert_eq!(loader.query_info_calls(), 0);
    assert!(controller.model(&id).unwrap().is_loading());
    assert_eq!(controller.model_ids(), vec![id]);
}

#[tokio::test]
async fn test_duplicate_model_rejected() {
    let (_, controller) = setup();
    loaded(&controller).await;
    let err = controller
        .add_model(QueryConfig::new(fruit()), false)
        .await
        .unwrap_err();
    assert_eq!(err, ControllerError::DuplicateModel("lists-Fruit".to_string()));
}

#[tokio::test]
async fn test_unknown_model() {
    let (_, controller) = setup();
    let err = controller.load_next_page("nope").await.unwrap_err();
    assert_eq!(err, ControllerError::ModelNotFound("nope".to_string()));
    assert!(controller.remove_model("nope").is_err());
}

#[tokio::test]
async fn test_set_max_rows_reloads_rows_once() {
    let (loader, controller) = setup();
    let id = loaded(&controller).await;
    controller.set_offset(&id, 40).await.unwrap();
    assert_eq!(loader.rows_calls(), 2);

    controller.set_max_rows(&id, 50).await.unwrap();
    assert_eq!(loader.rows_calls(), 3);
    assert_eq!(loader.query_info_calls(), 1);

    let model = controller.model(&id).unwrap();
    assert_eq!(model.offset(), 0);
    assert_eq!(model.max_rows(), 50);
    assert_eq!(model.grid_data().unwrap().len(), 50);

    controller.set_max_rows(&id, 50).await.unwrap();
    assert_eq!(loader.rows_calls(), 3);
}

#[tokio::test]
async fn test_set_schema_query_reloads_metadata_then_rows() {
    let (loader, controller) = setup();
    let id = loaded(&controller).await;

    controller
        .set_schema_query(&id, SchemaQuery::new("lists", "Vegetables"))
        .await
        .unwrap();
    assert_eq!(loader.query_info_calls(), 2);
    assert_eq!(loader.rows_calls(), 2);

    let model = controller.model(&id).unwrap();
    assert_eq!(model.id(), "lists-Fruit");
    assert_eq!(model.query_info().unwrap().name, "Vegetables");
    assert!(!model.is_loading());
}

#[tokio::test]
async fn test_set_view_reloads_rows_only() {
    let (loader, controller) = setup();
    let id = loaded(&controller).await;

    controller
        .set_view(&id, Some(ViewName::Named("mine".to_string())))
        .await
        .unwrap();
    assert_eq!(loader.query_info_calls(), 1);
    assert_eq!(loader.rows_calls(), 2);
    let model = controller.model(&id).unwrap();
    assert_eq!(model.column_string().unwrap(), "RowId,Name");

    controller.set_view(&id, Some("mine".into())).await.unwrap();
    assert_eq!(loader.rows_calls(), 2);
}

#[tokio::test]
async fn test_filters_and_sorts_compare_by_value() {
    let (loader, controller) = setup();
    let id = loaded(&controller).await;

    controller
        .set_filters(&id, vec![Filter::equal("Name", "apple")])
        .await
        .unwrap();
    controller
        .set_filters(&id, vec![Filter::equal("Name", "apple")])
        .await
        .unwrap();
    controller
        .set_sorts(&id, vec![QuerySort::desc("Name")])
        .await
        .unwrap();
    controller
        .set_sorts(&id, vec![QuerySort::desc("Name")])
        .await
        .unwrap();
    assert_eq!(loader.rows_calls(), 3);

    let model = controller.model(&id).unwrap();
    assert_eq!(model.sort_string().unwrap(), "-Name");
}

#[tokio::test]
async fn test_paging_boundaries() {
    let (loader, controller) = setup();
    let id = loaded(&controller).await;

    controller.load_previous_page(&id).await.unwrap();
    controller.load_first_page(&id).await.unwrap();
    assert_eq!(loader.rows_calls(), 1);

    controller.load_last_page(&id).await.unwrap();
    assert_eq!(controller.model(&id).unwrap().offset(), 660);
    assert_eq!(loader.rows_calls(), 2);

    controller.load_next_page(&id).await.unwrap();
    assert_eq!(loader.rows_calls(), 2);
    assert!(controller.model(&id).unwrap().is_last_page());

    controller.load_previous_page(&id).await.unwrap();
    assert_eq!(controller.model(&id).unwrap().offset(), 640);
}

#[tokio::test]
async fn test_failed_rows_settle_with_generic_message() {
    let (loader, controller) = setup();
    loader.fail_rows.store(true, Ordering::SeqCst);
    let id = loaded(&controller).await;

    let model = controller.model(&id).unwrap();
    assert!(!model.is_loading());
    assert!(model.query_info().is_some());
    assert_eq!(model.rows_error(), Some("Error while loading rows for lists.Fruit"));
}

#[tokio::test]
async fn test_failed_metadata_skips_rows() {
    let (loader, controller) = setup();
    loader.fail_query_info.store(true, Ordering::SeqCst);
    let id = loaded(&controller).await;

    assert_eq!(loader.rows_calls(), 0);
    let model = controller.model(&id).unwrap();
    assert!(!model.is_loading());
    assert_eq!(model.query_info_error(), Some("Query 'Fruit' not found"));
}

#[tokio::test]
async fn test_load_rows_before_metadata_loads_metadata() {
    let (loader, controller) = setup();
    let id = controller
        .add_model(QueryConfig::new(fruit()), false)
        .await
        .unwrap();
    controller.load_rows(&id).await.unwrap();
    assert_eq!(loader.query_info_calls(), 1);
    assert_eq!(loader.rows_calls(), 1);
    assert!(controller.model(&id).unwrap().has_data());
}

#[tokio::test]
async fn test_stale_rows_response_is_discarded() -> anyhow::Result<()> {
    let (loader, controller) = setup();
    let id = loaded(&controller).await;

    let (started, release) = loader.hold_rows_at(20);
    let slow = {
        let controller = Arc::clone(&controller);
        let id = id.clone();
        tokio::spawn(async move { controller.load_next_page(&id).await })
    };
    started.notified().await;

    controller.load_next_page(&id).await?;
    assert_eq!(controller.model(&id).unwrap().offset(), 40);

    release.notify_one();
    tokio::time::timeout(Duration::from_secs(5), slow).await???;

    let model = controller.model(&id).unwrap();
    assert_eq!(model.offset(), 40);
    assert_eq!(model.ordered_rows().unwrap().first().map(String::as_str), Some("40"));
    assert!(!model.is_loading());
    Ok(())
}

#[tokio::test]
async fn test_rows_for_previous_query_are_discarded() -> anyhow::Result<()> {
    let (loader, controller) = setup();
    let id = controller
        .add_model(QueryConfig::new(fruit()), false)
        .await?;

    let (rows_started, rows_release) = loader.hold_rows_at(0);
    let fruit_load = {
        let controller = Arc::clone(&controller);
        let id = id.clone();
        tokio::spawn(async move { controller.load_model(&id, false).await })
    };
    rows_started.notified().await;

    let (info_started, info_release) = loader.hold(Held::QueryInfo("Vegetables".to_string()));
    let vegetables_load = {
        let controller = Arc::clone(&controller);
        let id = id.clone();
        tokio::spawn(async move {
            controller
                .set_schema_query(&id, SchemaQuery::new("lists", "Vegetables"))
                .await
        })
    };
    info_started.notified().await;

    rows_release.notify_one();
    tokio::time::timeout(Duration::from_secs(5), fruit_load).await???;
    let model = controller.model(&id).unwrap();
    assert_eq!(model.schema_query().query_name, "Vegetables");
    assert!(!model.has_data());
    assert!(model.is_loading());

    loader.fail_query_info.store(true, Ordering::SeqCst);
    info_release.notify_one();
    tokio::time::timeout(Duration::from_secs(5), vegetables_load).await???;

    let model = controller.model(&id).unwrap();
    assert!(!model.is_loading());
    assert!(!model.has_data());
    assert_eq!(model.query_info_error(), Some("Query 'Vegetables' not found"));
    Ok(())
}

#[tokio::test]
async fn test_selections_for_previous_view_are_discarded() -> anyhow::Result<()> {
    let (loader, controller) = setup();
    loader.selected.lock().insert("3".to_string());
    let id = loaded(&controller).await;

    let (started, release) = loader.hold(Held::LoadSelections);
    let pending = {
        let controller = Arc::clone(&controller);
        let id = id.clone();
        tokio::spawn(async move { controller.load_selections(&id).await })
    };
    started.notified().await;

    controller.set_view(&id, Some("mine".into())).await?;
    release.notify_one();
    tokio::time::timeout(Duration::from_secs(5), pending).await???;

    let model = controller.model(&id).unwrap();
    assert!(model.selections().is_none());
    assert!(!model.is_row_selected("3"));
    Ok(())
}

#[tokio::test]
async fn test_overlapping_selection_changes_both_apply() -> anyhow::Result<()> {
    let (loader, controller) = setup();
    let id = loaded(&controller).await;

    let (started, release) = loader.hold(Held::SetSelection("1".to_string()));
    let first = {
        let controller = Arc::clone(&controller);
        let id = id.clone();
        tokio::spawn(async move { controller.select_row(&id, "1", true).await })
    };
    started.notified().await;

    controller.select_row(&id, "2", true).await?;
    release.notify_one();
    tokio::time::timeout(Duration::from_secs(5), first).await???;

    let expected: BTreeSet<String> = ["1".to_string(), "2".to_string()].into();
    assert_eq!(*loader.selected.lock(), expected);
    assert_eq!(controller.model(&id).unwrap().selected_ids(), vec!["1", "2"]);
    Ok(())
}

#[tokio::test]
async fn test_selection_change_dropped_after_query_change() -> anyhow::Result<()> {
    let (loader, controller) = setup();
    let id = loaded(&controller).await;

    let (started, release) = loader.hold(Held::SetSelection("1".to_string()));
    let pending = {
        let controller = Arc::clone(&controller);
        let id = id.clone();
        tokio::spawn(async move { controller.select_row(&id, "1", true).await })
    };
    started.notified().await;

    controller
        .set_schema_query(&id, SchemaQuery::new("lists", "Vegetables"))
        .await?;
    release.notify_one();
    tokio::time::timeout(Duration::from_secs(5), pending).await???;

    assert!(controller.model(&id).unwrap().selections().is_none());
    Ok(())
}

#[tokio::test]
async fn test_removed_model_drops_in_flight_response() -> anyhow::Result<()> {
    let (loader, controller) = setup();
    let id = loaded(&controller).await;
    let mut events = controller.subscribe();

    let (started, release) = loader.hold_rows_at(20);
    let slow = {
        let controller = Arc::clone(&controller);
        let id = id.clone();
        tokio::spawn(async move { controller.load_next_page(&id).await })
    };
    started.notified().await;
    controller.remove_model(&id)?;
    release.notify_one();
    tokio::time::timeout(Duration::from_secs(5), slow).await???;

    assert!(controller.model(&id).is_none());
    let mut removed = false;
    while let Ok(event) = events.try_recv() {
        removed |= event == ModelEvent::Removed { id: id.clone() };
    }
    assert!(removed);
    Ok(())
}

#[tokio::test]
async fn test_events_published() {
    let (_, controller) = setup();
    let mut events = controller.subscribe();
    let id = loaded(&controller).await;

    let event = events.recv().await.unwrap();
    assert_eq!(event, ModelEvent::Changed { id: id.clone() });
    assert_eq!(event.id(), id);
}

#[tokio::test]
async fn test_key_lookup_warning_event() {
    let (loader, controller) = setup();
    loader.compound_key.store(true, Ordering::SeqCst);
    let mut events = controller.subscribe();

    let config = QueryConfig::new(fruit()).with_key_value("7");
    let id = controller.add_model(config, true).await.unwrap();
    assert!(controller.model(&id).unwrap().filters().unwrap().is_empty());

    let mut warning = None;
    while let Ok(event) = events.try_recv() {
        if let ModelEvent::Warning { warning: w, .. } = event {
            warning = Some(w);
        }
    }
    assert!(matches!(
        warning,
        Some(KeyFilterWarning::MultiplePrimaryKeys { .. })
    ));
}

#[tokio::test]
async fn test_selections() {
    let (_, controller) = setup();
    let id = loaded(&controller).await;

    controller.select_row(&id, "3", true).await.unwrap();
    let model = controller.model(&id).unwrap();
    assert_eq!(model.selected_state(), SelectedState::Some);
    assert!(model.is_row_selected("3"));

    controller.select_page(&id, true).await.unwrap();
    assert_eq!(controller.model(&id).unwrap().selected_state(), SelectedState::All);

    controller
        .replace_selections(&id, vec!["1".to_string()])
        .await
        .unwrap();
    assert_eq!(controller.model(&id).unwrap().selected_ids(), vec!["1"]);

    controller.select_all_rows(&id).await.unwrap();
    assert_eq!(
        controller.model(&id).unwrap().selections().unwrap().len(),
        ROW_COUNT as usize
    );

    controller.clear_selections(&id).await.unwrap();
    controller.load_selections(&id).await.unwrap();
    assert!(!controller.model(&id).unwrap().has_selections());
}

#[tokio::test]
async fn test_load_selections_with_model() {
    let (loader, controller) = setup();
    loader.selected.lock().insert("5".to_string());
    let id = controller
        .add_model(QueryConfig::new(fruit()), false)
        .await
        .unwrap();
    controller.load_model(&id, true).await.unwrap();
    assert!(controller.model(&id).unwrap().is_row_selected("5"));
}

#[tokio::test]
async fn test_url_query_string() {
    let (loader, controller) = setup();
    let id = loaded(&controller).await;

    controller
        .set_url_query_string(&id, "?query.p=3&query.sort=-Name&query.Name~eq=pear")
        .await
        .unwrap();
    assert_eq!(loader.rows_calls(), 2);

    let model = controller.model(&id).unwrap();
    assert_eq!(model.offset(), 40);
    assert_eq!(model.sorts(), &[QuerySort::desc("Name")]);
    assert_eq!(model.filter_array(), &[Filter::equal("Name", "pear")]);
    assert_eq!(
        model.url_query_params().get("query.p").map(String::as_str),
        Some("3")
    );

    let err = controller
        .set_url_query_string(&id, "query.p=0")
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::Model(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_load_all_models() {
    let (loader, controller) = setup();
    for query in ["Fruit", "Vegetables", "Grains"] {
        controller
            .add_model(QueryConfig::new(SchemaQuery::new("lists", query)), false)
            .await
            .unwrap();
    }
    controller.load_all_models(false).await;

    assert_eq!(loader.query_info_calls(), 3);
    assert_eq!(loader.rows_calls(), 3);
    for id in controller.model_ids() {
        assert!(!controller.model(&id).unwrap().is_loading());
    }
}

#[tokio::test]
async fn test_config_for_uses_default_page_size() {
    let loader = Arc::new(FakeLoader::default());
    let settings = ControllerSettings {
        default_max_rows: 50,
        ..ControllerSettings::default()
    };
    let controller = QueryModels::new(loader, settings);
    let id = controller
        .add_model(controller.config_for(fruit()), true)
        .await
        .unwrap();
    let model = controller.model(&id).unwrap();
    assert_eq!(model.max_rows(), 50);
    assert!(!model.url_query_params().contains_key("query.pageSize"));
}
