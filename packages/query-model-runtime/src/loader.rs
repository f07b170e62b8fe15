//! Loader contract between the model controller and the data source.

use std::collections::BTreeSet;

use async_trait::async_trait;
use query_model_core::{QueryInfo, QueryModel, RowsResponse};

use crate::error::LoaderResult;

/// Resolves metadata, rows, and selections for a model.
///
/// Every method receives a read-only snapshot of the requesting model and
/// derives the request from it (filters, sort string, column string, page
/// window). Implementations own transport, pooling, and retries; the
/// controller only relies on the result shapes and on failures being
/// reported as `Err`.
#[async_trait]
pub trait QueryModelLoader: Send + Sync {
    /// Loads column and view metadata for the model's schema/query.
    async fn load_query_info(&self, model: &QueryModel) -> LoaderResult<QueryInfo>;

    /// Loads the model's current page of rows.
    async fn load_rows(&self, model: &QueryModel) -> LoaderResult<RowsResponse>;

    /// Loads the persisted selection for the model's filter/sort context.
    async fn load_selections(&self, model: &QueryModel) -> LoaderResult<BTreeSet<String>>;

    /// Checks or unchecks `keys`.
    async fn set_selections(
        &self,
        model: &QueryModel,
        checked: bool,
        keys: &[String],
    ) -> LoaderResult<()>;

    /// Replaces the whole selection with `keys`.
    async fn replace_selections(&self, model: &QueryModel, keys: &[String]) -> LoaderResult<()>;

    /// Clears the selection.
    async fn clear_selections(&self, model: &QueryModel) -> LoaderResult<()>;

    /// Selects every row matching the model's filters and returns the keys.
    async fn select_all_rows(&self, model: &QueryModel) -> LoaderResult<BTreeSet<String>>;
}
