//! Model controller owning a keyed collection of query models.
//!
//! Every action commits a new immutable snapshot, publishes a
//! [`ModelEvent`], and issues the reload the action requires. Loads for one
//! model are ordered per concern (metadata, rows, selections) by a
//! generation stamp: a response is only applied if no newer request for the
//! same concern was issued since, and only while the model is registered.
//! Pointing a model at another query or view supersedes the requests that
//! reset. Confirmed selection changes are exempt: they already happened on
//! the server and apply to the latest snapshot of the same query and view.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use query_model_core::{Filter, QueryConfig, QueryModel, QuerySort, SchemaQuery, ViewName};
use tokio::sync::broadcast;
use tokio::task::JoinSet;

use crate::actions::{reduce, ModelAction, Reload};
use crate::api::parse_query_string;
use crate::error::{ControllerError, LoaderError, Result};
use crate::events::ModelEvent;
use crate::loader::QueryModelLoader;
use crate::settings::ControllerSettings;

/// Load concern tracked independently per model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Concern {
    QueryInfo,
    Rows,
    Selections,
}

impl Concern {
    fn label(self) -> &'static str {
        match self {
            Concern::QueryInfo => "query details",
            Concern::Rows => "rows",
            Concern::Selections => "selections",
        }
    }
}

/// Registered model with the generation of its latest request per concern.
#[derive(Debug)]
struct Entry {
    model: Arc<QueryModel>,
    query_info_generation: u64,
    rows_generation: u64,
    selections_generation: u64,
}

impl Entry {
    fn new(model: QueryModel) -> Self {
        Self {
            model: Arc::new(model),
            query_info_generation: 0,
            rows_generation: 0,
            selections_generation: 0,
        }
    }

    /// Supersedes every request in flight for `concerns`.
    fn invalidate(&mut self, concerns: &[Concern], generation: u64) {
        for concern in concerns {
            *self.generation_mut(*concern) = generation;
        }
    }

    fn generation_mut(&mut self, concern: Concern) -> &mut u64 {
        match concern {
            Concern::QueryInfo => &mut self.query_info_generation,
            Concern::Rows => &mut self.rows_generation,
            Concern::Selections => &mut self.selections_generation,
        }
    }
}

/// Keyed collection of query models and the actions that drive them.
pub struct QueryModels {
    models: Mutex<HashMap<String, Entry>>,
    loader: Arc<dyn QueryModelLoader>,
    settings: ControllerSettings,
    events: broadcast::Sender<ModelEvent>,
    /// Shared across models so a re-added id never matches a stale stamp
    next_generation: AtomicU64,
}

impl QueryModels {
    /// Creates an empty controller.
    pub fn new(loader: Arc<dyn QueryModelLoader>, settings: ControllerSettings) -> Self {
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));
        Self {
            models: Mutex::new(HashMap::new()),
            loader,
            settings,
            events,
            next_generation: AtomicU64::new(0),
        }
    }

    /// Creates an empty controller with default settings.
    pub fn with_loader(loader: Arc<dyn QueryModelLoader>) -> Self {
        Self::new(loader, ControllerSettings::default())
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Subscribes to model change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ModelEvent> {
        self.events.subscribe()
    }

    /// Config for `schema_query` carrying the controller's default page size.
    pub fn config_for(&self, schema_query: SchemaQuery) -> QueryConfig {
        QueryConfig::new(schema_query).with_max_rows(self.settings.default_max_rows)
    }

    /// Current snapshot of a model.
    pub fn model(&self, id: &str) -> Option<Arc<QueryModel>> {
        self.models.lock().get(id).map(|entry| Arc::clone(&entry.model))
    }

    /// Ids of all registered models, sorted.
    pub fn model_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.models.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Registers a model built from `config` and optionally starts loading it.
    ///
    /// # Arguments
    /// * `config` - Model configuration; the id defaults from its schema/query
    /// * `load` - Load metadata and rows right away
    ///
    /// # Returns
    /// The id of the new model.
    pub async fn add_model(&self, config: QueryConfig, load: bool) -> Result<String> {
        let model = QueryModel::new(config)?;
        let id = model.id().to_string();
        {
            let mut models = self.models.lock();
            if models.contains_key(&id) {
                return Err(ControllerError::DuplicateModel(id));
            }
            models.insert(id.clone(), Entry::new(model));
        }
        tracing::info!("Added model {}", id);
        self.emit(ModelEvent::Changed { id: id.clone() });

        if load {
            self.load_model(&id, self.settings.load_selections).await?;
        }
        Ok(id)
    }

    /// Removes a model. Responses still in flight for it are discarded.
    pub fn remove_model(&self, id: &str) -> Result<()> {
        self.models
            .lock()
            .remove(id)
            .ok_or_else(|| ControllerError::ModelNotFound(id.to_string()))?;
        tracing::info!("Removed model {}", id);
        self.emit(ModelEvent::Removed { id: id.to_string() });
        Ok(())
    }

    /// Loads metadata, then the current page of rows, then optionally
    /// selections.
    ///
    /// A metadata failure settles the model with the error on both metadata
    /// and rows; rows are not requested.
    pub async fn load_model(&self, id: &str, load_selections: bool) -> Result<()> {
        let (generation, snapshot) =
            self.begin(id, Concern::QueryInfo, QueryModel::query_info_loading)?;

        match self.loader.load_query_info(&snapshot).await {
            Ok(query_info) => {
                let query_info = Arc::new(query_info);
                if !self.settle(id, Concern::QueryInfo, generation, |model| {
                    model.query_info_loaded(query_info)
                }) {
                    return Ok(());
                }
            }
            Err(e) => {
                let message = failure_message(&snapshot, "loading query details", &e);
                tracing::error!("Failed to load query details for model {}: {}", id, e);
                self.settle(id, Concern::QueryInfo, generation, |model| {
                    model
                        .query_info_failed(message.clone())
                        .rows_failed(message)
                });
                return Ok(());
            }
        }

        ignore_removed(self.fetch_rows(id).await)?;
        if load_selections {
            ignore_removed(self.fetch_selections(id).await)?;
        }
        Ok(())
    }

    /// Loads every registered model concurrently.
    pub async fn load_all_models(self: &Arc<Self>, load_selections: bool) {
        let mut tasks = JoinSet::new();
        for id in self.model_ids() {
            let controller = Arc::clone(self);
            tasks.spawn(async move {
                let result = controller.load_model(&id, load_selections).await;
                (id, result)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((id, Err(e))) => tracing::debug!("Skipped loading model {}: {}", id, e),
                Err(e) => tracing::error!("Model load task failed: {}", e),
            }
        }
    }

    /// Reloads the current page of rows, loading metadata first if it has
    /// not been loaded yet.
    pub async fn load_rows(&self, id: &str) -> Result<()> {
        let snapshot = self.require(id)?;
        if snapshot.query_info().is_none() {
            return self.load_model(id, false).await;
        }
        self.fetch_rows(id).await
    }

    /// Reloads the persisted selection.
    pub async fn load_selections(&self, id: &str) -> Result<()> {
        self.fetch_selections(id).await
    }

    pub async fn set_offset(&self, id: &str, offset: u64) -> Result<()> {
        self.dispatch(id, ModelAction::SetOffset(offset)).await
    }

    /// Moves to the next page; a no-op on the last page.
    pub async fn load_next_page(&self, id: &str) -> Result<()> {
        self.dispatch(id, ModelAction::NextPage).await
    }

    /// Moves to the previous page; a no-op on the first page.
    pub async fn load_previous_page(&self, id: &str) -> Result<()> {
        self.dispatch(id, ModelAction::PreviousPage).await
    }

    pub async fn load_first_page(&self, id: &str) -> Result<()> {
        self.dispatch(id, ModelAction::FirstPage).await
    }

    pub async fn load_last_page(&self, id: &str) -> Result<()> {
        self.dispatch(id, ModelAction::LastPage).await
    }

    /// Changes the page size and returns to the first page.
    pub async fn set_max_rows(&self, id: &str, max_rows: i64) -> Result<()> {
        self.dispatch(id, ModelAction::SetMaxRows(max_rows)).await
    }

    /// Replaces the user filters and returns to the first page.
    pub async fn set_filters(&self, id: &str, filters: Vec<Filter>) -> Result<()> {
        self.dispatch(id, ModelAction::SetFilters(filters)).await
    }

    pub async fn set_sorts(&self, id: &str, sorts: Vec<QuerySort>) -> Result<()> {
        self.dispatch(id, ModelAction::SetSorts(sorts)).await
    }

    /// Switches the view. Metadata is kept; rows and selections reset.
    pub async fn set_view(&self, id: &str, view_name: Option<ViewName>) -> Result<()> {
        self.dispatch(id, ModelAction::SetView(view_name)).await
    }

    /// Points the model at another schema/query, resetting all loaded state.
    pub async fn set_schema_query(&self, id: &str, schema_query: SchemaQuery) -> Result<()> {
        self.dispatch(id, ModelAction::SetSchemaQuery(schema_query)).await
    }

    /// Applies grid state decoded from URL parameters.
    pub async fn set_url_query_params(
        &self,
        id: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<()> {
        let state = self.require(id)?.url_state(params)?;
        self.dispatch(id, ModelAction::ApplyUrlState(state)).await
    }

    /// Applies grid state from a raw URL query string.
    pub async fn set_url_query_string(&self, id: &str, query: &str) -> Result<()> {
        self.set_url_query_params(id, &parse_query_string(query)).await
    }

    /// Checks or unchecks `keys` in the persisted selection.
    pub async fn set_selections(&self, id: &str, checked: bool, keys: Vec<String>) -> Result<()> {
        let (_, snapshot) = self.begin(id, Concern::Selections, QueryModel::selections_loading)?;
        match self.loader.set_selections(&snapshot, checked, &keys).await {
            Ok(()) => {
                self.settle_mutation(id, &snapshot, |model| {
                    model.selections_changed(checked, &keys)
                });
            }
            Err(e) => self.mutation_failed(id, &snapshot, "updating selections", e),
        }
        Ok(())
    }

    pub async fn select_row(&self, id: &str, key: impl Into<String>, checked: bool) -> Result<()> {
        self.set_selections(id, checked, vec![key.into()]).await
    }

    /// Checks or unchecks every row on the current page.
    pub async fn select_page(&self, id: &str, checked: bool) -> Result<()> {
        let keys = self
            .require(id)?
            .ordered_rows()
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        if keys.is_empty() {
            return Ok(());
        }
        self.set_selections(id, checked, keys).await
    }

    /// Replaces the persisted selection with exactly `keys`.
    pub async fn replace_selections(&self, id: &str, keys: Vec<String>) -> Result<()> {
        let (_, snapshot) = self.begin(id, Concern::Selections, QueryModel::selections_loading)?;
        match self.loader.replace_selections(&snapshot, &keys).await {
            Ok(()) => {
                let selections: BTreeSet<String> = keys.into_iter().collect();
                self.settle_mutation(id, &snapshot, |model| model.selections_loaded(selections));
            }
            Err(e) => self.mutation_failed(id, &snapshot, "replacing selections", e),
        }
        Ok(())
    }

    /// Selects every row matching the model's filters, across all pages.
    pub async fn select_all_rows(&self, id: &str) -> Result<()> {
        let (_, snapshot) = self.begin(id, Concern::Selections, QueryModel::selections_loading)?;
        match self.loader.select_all_rows(&snapshot).await {
            Ok(selections) => {
                self.settle_mutation(id, &snapshot, |model| model.selections_loaded(selections));
            }
            Err(e) => self.mutation_failed(id, &snapshot, "selecting all rows", e),
        }
        Ok(())
    }

    pub async fn clear_selections(&self, id: &str) -> Result<()> {
        let (_, snapshot) = self.begin(id, Concern::Selections, QueryModel::selections_loading)?;
        match self.loader.clear_selections(&snapshot).await {
            Ok(()) => {
                self.settle_mutation(id, &snapshot, |model| {
                    model.selections_loaded(BTreeSet::new())
                });
            }
            Err(e) => self.mutation_failed(id, &snapshot, "clearing selections", e),
        }
        Ok(())
    }

    /// Reduces `action`, commits the result, and issues the reload it needs.
    async fn dispatch(&self, id: &str, action: ModelAction) -> Result<()> {
        let (reload, reload_selections) = {
            let mut models = self.models.lock();
            let entry = models
                .get_mut(id)
                .ok_or_else(|| ControllerError::ModelNotFound(id.to_string()))?;
            let transition = reduce(&entry.model, &action, self.settings.load_selections);
            match transition.model {
                Some(next) => {
                    let (previous, current) = (entry.model.schema_query(), next.schema_query());
                    let query_changed = previous.schema_name != current.schema_name
                        || previous.query_name != current.query_name;
                    if query_changed {
                        entry.invalidate(
                            &[Concern::QueryInfo, Concern::Rows, Concern::Selections],
                            self.next_generation(),
                        );
                    } else if next.view_name() != entry.model.view_name() {
                        entry.invalidate(&[Concern::Rows, Concern::Selections], self.next_generation());
                    }
                    entry.model = Arc::new(next);
                }
                None => {
                    tracing::debug!("Action {:?} left model {} unchanged", action, id);
                    return Ok(());
                }
            }
            (transition.reload, transition.reload_selections)
        };
        self.emit(ModelEvent::Changed { id: id.to_string() });

        match reload {
            Reload::None => {}
            Reload::Rows => {
                self.load_rows(id).await?;
                if reload_selections {
                    ignore_removed(self.fetch_selections(id).await)?;
                }
            }
            Reload::QueryInfo => self.load_model(id, reload_selections).await?,
        }
        Ok(())
    }

    async fn fetch_rows(&self, id: &str) -> Result<()> {
        let (generation, snapshot) = self.begin(id, Concern::Rows, QueryModel::rows_loading)?;
        if let Some(warning) = snapshot.key_filter_warning() {
            self.emit(ModelEvent::Warning {
                id: id.to_string(),
                warning,
            });
        }
        tracing::debug!(
            "Loading rows for model {} (offset {}, max rows {})",
            id,
            snapshot.offset(),
            snapshot.max_rows()
        );

        match self.loader.load_rows(&snapshot).await {
            Ok(response) => {
                self.settle(id, Concern::Rows, generation, |model| {
                    model.rows_loaded(response)
                });
            }
            Err(e) => {
                let message = failure_message(&snapshot, "loading rows", &e);
                tracing::error!("Failed to load rows for model {}: {}", id, e);
                self.settle(id, Concern::Rows, generation, |model| {
                    model.rows_failed(message)
                });
            }
        }
        Ok(())
    }

    async fn fetch_selections(&self, id: &str) -> Result<()> {
        let (generation, snapshot) =
            self.begin(id, Concern::Selections, QueryModel::selections_loading)?;
        match self.loader.load_selections(&snapshot).await {
            Ok(selections) => {
                self.settle(id, Concern::Selections, generation, |model| {
                    model.selections_loaded(selections)
                });
            }
            Err(e) => self.selections_failed(id, generation, &snapshot, "loading selections", e),
        }
        Ok(())
    }

    fn selections_failed(
        &self,
        id: &str,
        generation: u64,
        snapshot: &QueryModel,
        action: &str,
        error: LoaderError,
    ) {
        let message = failure_message(snapshot, action, &error);
        tracing::error!("Failed {} for model {}: {}", action, id, error);
        self.settle(id, Concern::Selections, generation, |model| {
            model.selections_failed(message)
        });
    }

    fn mutation_failed(&self, id: &str, issued: &QueryModel, action: &str, error: LoaderError) {
        let message = failure_message(issued, action, &error);
        tracing::error!("Failed {} for model {}: {}", action, id, error);
        self.settle_mutation(id, issued, |model| model.selections_failed(message));
    }

    fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Stamps a new request for `concern` and commits its loading state.
    fn begin(
        &self,
        id: &str,
        concern: Concern,
        mark: impl FnOnce(&QueryModel) -> QueryModel,
    ) -> Result<(u64, Arc<QueryModel>)> {
        let generation = self.next_generation();
        let snapshot = {
            let mut models = self.models.lock();
            let entry = models
                .get_mut(id)
                .ok_or_else(|| ControllerError::ModelNotFound(id.to_string()))?;
            *entry.generation_mut(concern) = generation;
            entry.model = Arc::new(mark(&entry.model));
            Arc::clone(&entry.model)
        };
        self.emit(ModelEvent::Changed { id: id.to_string() });
        Ok((generation, snapshot))
    }

    /// Applies a response to the latest snapshot if it is still current.
    fn settle(
        &self,
        id: &str,
        concern: Concern,
        generation: u64,
        apply: impl FnOnce(&QueryModel) -> QueryModel,
    ) -> bool {
        {
            let mut models = self.models.lock();
            let Some(entry) = models.get_mut(id) else {
                tracing::debug!(
                    "Discarding {} response for removed model {}",
                    concern.label(),
                    id
                );
                return false;
            };
            if *entry.generation_mut(concern) != generation {
                tracing::debug!(
                    "Discarding stale {} response for model {}",
                    concern.label(),
                    id
                );
                return false;
            }
            entry.model = Arc::new(apply(&entry.model));
        }
        self.emit(ModelEvent::Changed { id: id.to_string() });
        true
    }

    /// Applies a confirmed selection change to the latest snapshot.
    ///
    /// The change already took effect on the server, so newer requests do not
    /// supersede it. It is dropped only when the model was removed or now
    /// points at another query or view than `issued`.
    fn settle_mutation(
        &self,
        id: &str,
        issued: &QueryModel,
        apply: impl FnOnce(&QueryModel) -> QueryModel,
    ) -> bool {
        {
            let mut models = self.models.lock();
            let Some(entry) = models.get_mut(id) else {
                tracing::debug!("Discarding selection change for removed model {}", id);
                return false;
            };
            if entry.model.schema_query() != issued.schema_query() {
                tracing::debug!(
                    "Discarding selection change for model {} made against {}",
                    id,
                    issued.schema_query()
                );
                return false;
            }
            entry.model = Arc::new(apply(&entry.model));
        }
        self.emit(ModelEvent::Changed { id: id.to_string() });
        true
    }

    fn require(&self, id: &str) -> Result<Arc<QueryModel>> {
        self.model(id)
            .ok_or_else(|| ControllerError::ModelNotFound(id.to_string()))
    }

    fn emit(&self, event: ModelEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}

/// Loader message if present, otherwise a generic message naming the query.
fn failure_message(model: &QueryModel, action: &str, error: &LoaderError) -> String {
    error.message().unwrap_or_else(|| {
        let sq = model.schema_query();
        format!(
            "Error while {} for {}.{}",
            action, sq.schema_name, sq.query_name
        )
    })
}

/// Treats a model removed mid-chain as a completed load.
fn ignore_removed(result: Result<()>) -> Result<()> {
    match result {
        Err(ControllerError::ModelNotFound(id)) => {
            tracing::debug!("Model {} removed before its load chain finished", id);
            Ok(())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_model_core::QueryInfo;

    fn model() -> QueryModel {
        QueryModel::new(QueryConfig::new(SchemaQuery::new("lists", "Fruit"))).unwrap()
    }

    #[test]
    fn test_failure_message_prefers_loader_text() {
        let err = LoaderError::Transport("connection reset".to_string());
        assert_eq!(failure_message(&model(), "loading rows", &err), "connection reset");
    }

    #[test]
    fn test_failure_message_generic() {
        assert_eq!(
            failure_message(&model(), "loading rows", &LoaderError::Unavailable),
            "Error while loading rows for lists.Fruit"
        );
    }

    #[test]
    fn test_generation_per_concern() {
        let mut entry = Entry::new(model().query_info_loaded(Arc::new(QueryInfo::new("lists", "Fruit"))));
        *entry.generation_mut(Concern::Rows) = 7;
        assert_eq!(entry.rows_generation, 7);
        assert_eq!(entry.query_info_generation, 0);
        assert_eq!(entry.selections_generation, 0);
    }

    #[test]
    fn test_ignore_removed() {
        assert!(ignore_removed(Err(ControllerError::ModelNotFound("x".to_string()))).is_ok());
        assert!(ignore_removed(Err(ControllerError::DuplicateModel("x".to_string()))).is_err());
    }
}
