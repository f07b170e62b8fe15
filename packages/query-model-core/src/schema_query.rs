//! Schema/query/view identity.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const DEFAULT_VIEW: &str = "~~DEFAULT~~";
const DETAIL_VIEW: &str = "~~DETAILS~~";
const UPDATE_VIEW: &str = "~~UPDATE~~";

/// Name of a grid view.
///
/// The server reserves a few sentinel names for system views. They are kept
/// as variants so a mistyped sentinel cannot silently become a named view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ViewName {
    /// The default view of a query
    #[default]
    Default,
    /// The single-row detail view
    Detail,
    /// The single-row update view
    Update,
    /// A user or shared saved view
    Named(String),
}

impl ViewName {
    /// Parses a view name, mapping reserved sentinels (case-insensitive) to
    /// their variants. An empty name is the default view.
    pub fn parse(name: &str) -> Self {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(DEFAULT_VIEW) {
            ViewName::Default
        } else if trimmed.eq_ignore_ascii_case(DETAIL_VIEW) {
            ViewName::Detail
        } else if trimmed.eq_ignore_ascii_case(UPDATE_VIEW) {
            ViewName::Update
        } else {
            ViewName::Named(trimmed.to_string())
        }
    }

    /// Returns the wire name of the view.
    pub fn as_str(&self) -> &str {
        match self {
            ViewName::Default => DEFAULT_VIEW,
            ViewName::Detail => DETAIL_VIEW,
            ViewName::Update => UPDATE_VIEW,
            ViewName::Named(name) => name,
        }
    }

    /// Returns true for the system views hidden from view pickers.
    pub fn is_reserved(&self) -> bool {
        !matches!(self, ViewName::Named(_))
    }
}

impl fmt::Display for ViewName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ViewName {
    fn from(value: &str) -> Self {
        ViewName::parse(value)
    }
}

impl Serialize for ViewName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ViewName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ViewName::parse(&raw))
    }
}

/// Identity of a query: schema, query (table) and optional view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaQuery {
    pub schema_name: String,
    pub query_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_name: Option<ViewName>,
}

impl SchemaQuery {
    /// Creates an identity without a view.
    pub fn new(schema_name: impl Into<String>, query_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            query_name: query_name.into(),
            view_name: None,
        }
    }

    /// Returns a copy of this identity pointing at `view`.
    pub fn with_view(&self, view: Option<ViewName>) -> Self {
        Self {
            view_name: view,
            ..self.clone()
        }
    }

    /// Returns true if both identities name the same schema and query,
    /// ignoring the view.
    pub fn is_same_query(&self, other: &SchemaQuery) -> bool {
        self.schema_name.eq_ignore_ascii_case(&other.schema_name)
            && self.query_name.eq_ignore_ascii_case(&other.query_name)
    }

    /// Id used for a model when the config does not name one.
    pub fn model_id(&self) -> String {
        match &self.view_name {
            Some(view) => format!("{}-{}-{}", self.schema_name, self.query_name, view),
            None => format!("{}-{}", self.schema_name, self.query_name),
        }
    }
}

impl fmt::Display for SchemaQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema_name, self.query_name)?;
        if let Some(view) = &self.view_name {
            write!(f, "/{}", view)?;
        }
        Ok(())
    }
}
