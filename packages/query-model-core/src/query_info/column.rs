//! Column metadata within a query.

use serde::{Deserialize, Serialize};

/// Column definition as reported by the query metadata endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryColumn {
    /// Encoded field key, e.g. `Run/Name` for a lookup
    pub field_key: String,
    /// Column name
    #[serde(default)]
    pub name: String,
    /// Display caption
    #[serde(default)]
    pub caption: Option<String>,
    /// JSON type reported by the server (`string`, `int`, `date`, ...)
    #[serde(default)]
    pub json_type: Option<String>,
    /// Hidden columns are left out of default display column sets
    #[serde(default)]
    pub hidden: bool,
    /// Part of the primary key
    #[serde(default)]
    pub is_key_field: bool,
    #[serde(default = "default_true")]
    pub sortable: bool,
    #[serde(default = "default_true")]
    pub filterable: bool,
}

fn default_true() -> bool {
    true
}

impl QueryColumn {
    /// Creates a visible, sortable, filterable column whose name equals its
    /// field key.
    pub fn new(field_key: impl Into<String>) -> Self {
        let field_key = field_key.into();
        Self {
            name: field_key.clone(),
            field_key,
            caption: None,
            json_type: None,
            hidden: false,
            is_key_field: false,
            sortable: true,
            filterable: true,
        }
    }

    pub fn key(field_key: impl Into<String>) -> Self {
        Self {
            is_key_field: true,
            ..Self::new(field_key)
        }
    }

    pub fn hidden(field_key: impl Into<String>) -> Self {
        Self {
            hidden: true,
            ..Self::new(field_key)
        }
    }

    /// Case-insensitive field key comparison.
    pub fn matches(&self, field_key: &str) -> bool {
        self.field_key.eq_ignore_ascii_case(field_key)
    }

    /// Caption, falling back to the column name.
    pub fn label(&self) -> &str {
        self.caption.as_deref().unwrap_or(&self.name)
    }
}
