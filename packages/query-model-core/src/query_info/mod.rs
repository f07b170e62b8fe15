//! Query metadata: columns, primary keys, and saved views.

mod column;
mod view;

use serde::{Deserialize, Serialize};

use crate::schema_query::{SchemaQuery, ViewName};

pub use column::QueryColumn;
pub use view::{ViewColumn, ViewInfo};

/// Column and view metadata for one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryInfo {
    pub schema_name: String,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Columns in server order
    #[serde(default)]
    pub columns: Vec<QueryColumn>,
    /// Primary key field keys; when empty, columns flagged `is_key_field` are used
    #[serde(default)]
    pub pk_cols: Vec<String>,
    #[serde(default)]
    pub views: Vec<ViewInfo>,
}

impl QueryInfo {
    /// Creates metadata with no columns or views.
    pub fn new(schema_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            name: name.into(),
            title: None,
            columns: Vec::new(),
            pk_cols: Vec::new(),
            views: Vec::new(),
        }
    }

    pub fn schema_query(&self) -> SchemaQuery {
        SchemaQuery::new(self.schema_name.clone(), self.name.clone())
    }

    /// Looks up a column by field key (case-insensitive).
    pub fn column(&self, field_key: &str) -> Option<&QueryColumn> {
        self.columns.iter().find(|c| c.matches(field_key))
    }

    /// Primary key field keys.
    pub fn pk_field_keys(&self) -> Vec<&str> {
        if !self.pk_cols.is_empty() {
            return self.pk_cols.iter().map(String::as_str).collect();
        }
        self.columns
            .iter()
            .filter(|c| c.is_key_field)
            .map(|c| c.field_key.as_str())
            .collect()
    }

    /// Primary key columns that exist in the column list.
    pub fn pk_columns(&self) -> Vec<&QueryColumn> {
        self.pk_field_keys()
            .into_iter()
            .filter_map(|key| self.column(key))
            .collect()
    }

    /// Resolves a view by name; `None` and unknown names fall back to the
    /// default view.
    pub fn view(&self, name: Option<&ViewName>) -> Option<&ViewInfo> {
        let wanted = name.unwrap_or(&ViewName::Default);
        self.views
            .iter()
            .find(|v| &v.name == wanted)
            .or_else(|| self.default_view())
    }

    pub fn default_view(&self) -> Option<&ViewInfo> {
        self.views
            .iter()
            .find(|v| v.name == ViewName::Default)
            .or_else(|| self.views.iter().find(|v| v.is_default))
    }

    /// Views offered to users, system views excluded.
    pub fn visible_views(&self) -> Vec<&ViewInfo> {
        self.views.iter().filter(|v| v.is_visible()).collect()
    }

    /// Columns shown by `view`, excluding `omitted` (case-insensitive).
    ///
    /// Follows the view's column list; field keys the query does not know are
    /// skipped. A view without columns shows every non-hidden column.
    pub fn display_columns(&self, view: Option<&ViewName>, omitted: &[String]) -> Vec<&QueryColumn> {
        let is_omitted = |c: &QueryColumn| omitted.iter().any(|o| c.matches(o));

        match self.view(view).filter(|v| !v.columns.is_empty()) {
            Some(view) => view
                .columns
                .iter()
                .filter_map(|vc| self.column(&vc.field_key))
                .filter(|c| !is_omitted(c))
                .collect(),
            None => self
                .columns
                .iter()
                .filter(|c| !c.hidden && !is_omitted(c))
                .collect(),
        }
    }

    /// Display columns followed by every other query column.
    pub fn all_columns(&self, view: Option<&ViewName>, omitted: &[String]) -> Vec<&QueryColumn> {
        let mut columns = self.display_columns(view, omitted);
        for column in &self.columns {
            let seen = columns.iter().any(|c| c.matches(&column.field_key));
            let is_omitted = omitted.iter().any(|o| column.matches(o));
            if !seen && !is_omitted {
                columns.push(column);
            }
        }
        columns
    }
}
