//! Saved grid view definitions.

use serde::{Deserialize, Serialize};

use crate::filter::Filter;
use crate::schema_query::ViewName;
use crate::sort::QuerySort;

/// A column reference inside a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewColumn {
    pub field_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ViewColumn {
    pub fn new(field_key: impl Into<String>) -> Self {
        Self {
            field_key: field_key.into(),
            title: None,
        }
    }
}

/// One named grid view: its columns plus the filters and sorts baked into it.
///
/// Views are values. Edits go through the `with_*` methods, which return a
/// new view and leave the original untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewInfo {
    #[serde(default)]
    pub name: ViewName,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub columns: Vec<ViewColumn>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub sorts: Vec<QuerySort>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub shared: bool,
    /// Unsaved edits held in the user's session
    #[serde(default)]
    pub session: bool,
    /// Inherited by sub-folders
    #[serde(default)]
    pub inherit: bool,
    #[serde(default)]
    pub hidden: bool,
}

impl ViewInfo {
    pub fn new(name: ViewName) -> Self {
        Self {
            is_default: name == ViewName::Default,
            name,
            label: None,
            columns: Vec::new(),
            filters: Vec::new(),
            sorts: Vec::new(),
            shared: false,
            session: false,
            inherit: false,
            hidden: false,
        }
    }

    pub fn with_columns<I, S>(&self, field_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: field_keys.into_iter().map(ViewColumn::new).collect(),
            ..self.clone()
        }
    }

    pub fn with_filters(&self, filters: Vec<Filter>) -> Self {
        Self {
            filters,
            ..self.clone()
        }
    }

    pub fn with_sorts(&self, sorts: Vec<QuerySort>) -> Self {
        Self {
            sorts,
            ..self.clone()
        }
    }

    pub fn with_label(&self, label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..self.clone()
        }
    }

    /// Reserved system views (default, detail, update).
    pub fn is_system_view(&self) -> bool {
        self.name.is_reserved()
    }

    /// Views offered in user-facing pickers.
    pub fn is_visible(&self) -> bool {
        !self.is_system_view() && !self.hidden
    }

    /// Label, falling back to the view name.
    pub fn display_label(&self) -> &str {
        match (&self.label, &self.name) {
            (Some(label), _) => label,
            (None, ViewName::Default) => "Default",
            (None, name) => name.as_str(),
        }
    }
}
