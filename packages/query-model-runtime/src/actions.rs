//! Pure state transitions for controller actions.
//!
//! [`reduce`] computes the next model and the reload it requires without
//! touching the loader. The controller commits the model and then issues
//! exactly the reload named in the [`Transition`].

use query_model_core::model::UrlState;
use query_model_core::{Filter, QueryModel, QuerySort, SchemaQuery, ViewName};

/// A state-changing action against one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelAction {
    SetOffset(u64),
    NextPage,
    PreviousPage,
    FirstPage,
    LastPage,
    SetMaxRows(i64),
    SetFilters(Vec<Filter>),
    SetSorts(Vec<QuerySort>),
    SetView(Option<ViewName>),
    SetSchemaQuery(SchemaQuery),
    ApplyUrlState(UrlState),
}

/// Fetch required after a committed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reload {
    None,
    /// Reload the current page of rows
    Rows,
    /// Reload metadata, then rows
    QueryInfo,
}

/// Outcome of reducing one action.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Next model; `None` when the action changes nothing
    pub model: Option<QueryModel>,
    pub reload: Reload,
    pub reload_selections: bool,
}

impl Transition {
    fn unchanged() -> Self {
        Self {
            model: None,
            reload: Reload::None,
            reload_selections: false,
        }
    }

    fn rows(model: QueryModel) -> Self {
        Self {
            model: Some(model),
            reload: Reload::Rows,
            reload_selections: false,
        }
    }

    fn with_selections(mut self, reload_selections: bool) -> Self {
        self.reload_selections = reload_selections && self.model.is_some();
        self
    }

    pub fn is_changed(&self) -> bool {
        self.model.is_some()
    }
}

/// Reduces `action` against `model`.
///
/// `load_selections` decides whether actions that change which rows are
/// selectable (filters, views, identity) also reload selections.
pub fn reduce(model: &QueryModel, action: &ModelAction, load_selections: bool) -> Transition {
    match action {
        ModelAction::SetOffset(offset) => set_offset(model, *offset),
        ModelAction::NextPage => match model.next_page_offset() {
            Some(offset) => set_offset(model, offset),
            None => Transition::unchanged(),
        },
        ModelAction::PreviousPage => match model.previous_page_offset() {
            Some(offset) => set_offset(model, offset),
            None => Transition::unchanged(),
        },
        ModelAction::FirstPage => set_offset(model, 0),
        ModelAction::LastPage => set_offset(model, model.last_page_offset()),
        ModelAction::SetMaxRows(max_rows) => {
            if *max_rows == model.max_rows() {
                Transition::unchanged()
            } else {
                Transition::rows(model.with_max_rows(*max_rows))
            }
        }
        ModelAction::SetFilters(filters) => {
            if filters.as_slice() == model.filter_array() {
                Transition::unchanged()
            } else {
                // A new filter changes the row count; the old page may not exist.
                Transition::rows(model.with_filters(filters.clone()).with_offset(0))
                    .with_selections(load_selections)
            }
        }
        ModelAction::SetSorts(sorts) => {
            if sorts.as_slice() == model.sorts() {
                Transition::unchanged()
            } else {
                Transition::rows(model.with_sorts(sorts.clone()))
            }
        }
        ModelAction::SetView(view) => {
            let view = normalize_view(view.clone());
            if view.as_ref() == model.view_name() {
                Transition::unchanged()
            } else {
                Transition::rows(model.with_view(view)).with_selections(load_selections)
            }
        }
        ModelAction::SetSchemaQuery(schema_query) => {
            if schema_query == model.schema_query() {
                Transition::unchanged()
            } else {
                Transition {
                    model: Some(model.with_schema_query(schema_query.clone())),
                    reload: Reload::QueryInfo,
                    reload_selections: load_selections,
                }
            }
        }
        ModelAction::ApplyUrlState(state) => apply_url_state(model, state, load_selections),
    }
}

fn set_offset(model: &QueryModel, offset: u64) -> Transition {
    if offset == model.offset() {
        Transition::unchanged()
    } else {
        Transition::rows(model.with_offset(offset))
    }
}

fn normalize_view(view: Option<ViewName>) -> Option<ViewName> {
    view.filter(|v| *v != ViewName::Default)
}

fn apply_url_state(model: &QueryModel, state: &UrlState, load_selections: bool) -> Transition {
    let view = normalize_view(state.view_name.clone());
    let view_changed = view.as_ref() != model.view_name();
    let unchanged = !view_changed
        && state.offset == model.offset()
        && state.max_rows == model.max_rows()
        && state.sorts.as_slice() == model.sorts()
        && state.filters.as_slice() == model.filter_array();
    if unchanged {
        return Transition::unchanged();
    }

    let base = if view_changed {
        model.with_view(view)
    } else {
        model.clone()
    };
    let next = base
        .with_max_rows(state.max_rows)
        .with_offset(state.offset)
        .with_sorts(state.sorts.clone())
        .with_filters(state.filters.clone());

    let filters_changed = state.filters.as_slice() != model.filter_array();
    Transition::rows(next).with_selections(load_selections && (view_changed || filters_changed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use query_model_core::{QueryColumn, QueryConfig, QueryInfo, RowsResponse};

    fn model(row_count: u64) -> QueryModel {
        let mut info = QueryInfo::new("exp.data", "mixtures");
        info.columns = vec![QueryColumn::key("RowId"), QueryColumn::new("Name")];
        QueryModel::new(QueryConfig::new(SchemaQuery::new("exp.data", "mixtures")))
            .unwrap()
            .query_info_loaded(Arc::new(info))
            .rows_loaded(RowsResponse {
                row_count,
                ..RowsResponse::default()
            })
    }

    #[test]
    fn test_next_page_moves_offset() {
        let t = reduce(&model(661), &ModelAction::NextPage, false);
        assert_eq!(t.reload, Reload::Rows);
        assert_eq!(t.model.unwrap().offset(), 20);
    }

    #[test]
    fn test_boundaries_are_noops() {
        let first = model(661);
        assert!(!reduce(&first, &ModelAction::PreviousPage, false).is_changed());
        assert!(!reduce(&first, &ModelAction::FirstPage, false).is_changed());

        let last = first.with_offset(660);
        let t = reduce(&last, &ModelAction::NextPage, false);
        assert_eq!(t.reload, Reload::None);
        assert!(!reduce(&last, &ModelAction::LastPage, false).is_changed());
        assert!(!reduce(&last, &ModelAction::SetOffset(660), false).is_changed());
    }

    #[test]
    fn test_last_page() {
        let t = reduce(&model(661), &ModelAction::LastPage, false);
        assert_eq!(t.model.unwrap().offset(), 660);
    }

    #[test]
    fn test_set_max_rows_resets_offset() {
        let m = model(661).with_offset(40);
        let t = reduce(&m, &ModelAction::SetMaxRows(50), false);
        assert_eq!(t.reload, Reload::Rows);
        assert!(!t.reload_selections);
        let next = t.model.unwrap();
        assert_eq!(next.offset(), 0);
        assert_eq!(next.max_rows(), 50);
        assert!(!reduce(&next, &ModelAction::SetMaxRows(50), false).is_changed());
    }

    #[test]
    fn test_filters_compare_by_value() {
        let m = model(10).with_filters(vec![Filter::equal("Name", "a")]);
        let same = reduce(&m, &ModelAction::SetFilters(vec![Filter::equal("Name", "a")]), true);
        assert!(!same.is_changed());
        assert!(!same.reload_selections);

        let changed = reduce(&m.with_offset(20), &ModelAction::SetFilters(vec![]), true);
        assert_eq!(changed.reload, Reload::Rows);
        assert!(changed.reload_selections);
        assert_eq!(changed.model.unwrap().offset(), 0);
    }

    #[test]
    fn test_sorts_compare_by_value() {
        let m = model(10);
        let t = reduce(&m, &ModelAction::SetSorts(vec![QuerySort::desc("RowId")]), true);
        assert_eq!(t.reload, Reload::Rows);
        assert!(!t.reload_selections);
        let next = t.model.unwrap();
        assert!(!reduce(&next, &ModelAction::SetSorts(vec![QuerySort::desc("RowId")]), true).is_changed());
    }

    #[test]
    fn test_set_view_resets_rows_keeps_metadata() {
        let t = reduce(&model(10), &ModelAction::SetView(Some("mine".into())), false);
        assert_eq!(t.reload, Reload::Rows);
        let next = t.model.unwrap();
        assert!(next.query_info().is_some());
        assert!(!next.has_data());
        assert_eq!(next.id(), "exp.data-mixtures");

        let default = reduce(&model(10), &ModelAction::SetView(Some(ViewName::Default)), false);
        assert!(!default.is_changed());
    }

    #[test]
    fn test_set_schema_query_reloads_metadata() {
        let other = SchemaQuery::new("exp.data", "other");
        let t = reduce(&model(10), &ModelAction::SetSchemaQuery(other.clone()), true);
        assert_eq!(t.reload, Reload::QueryInfo);
        assert!(t.reload_selections);
        let next = t.model.unwrap();
        assert!(next.query_info().is_none());
        assert_eq!(next.schema_query(), &other);
    }

    #[test]
    fn test_apply_url_state() {
        let m = model(661);
        let state = UrlState {
            offset: 40,
            max_rows: 20,
            sorts: vec![QuerySort::desc("RowId")],
            filters: Vec::new(),
            view_name: None,
        };
        let t = reduce(&m, &ModelAction::ApplyUrlState(state.clone()), true);
        assert_eq!(t.reload, Reload::Rows);
        assert!(!t.reload_selections);
        let next = t.model.unwrap();
        assert_eq!(next.offset(), 40);
        assert!(!reduce(&next, &ModelAction::ApplyUrlState(state), true).is_changed());
    }
}
