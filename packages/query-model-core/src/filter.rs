//! Column filters and their URL encoding.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Comparison applied by a filter, named by its URL suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    Eq,
    #[serde(rename = "neqornull")]
    NeqOrNull,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    #[serde(rename = "doesnotcontain")]
    DoesNotContain,
    #[serde(rename = "startswith")]
    StartsWith,
    In,
    #[serde(rename = "notin")]
    NotIn,
    #[serde(rename = "isblank")]
    IsBlank,
    #[serde(rename = "isnonblank")]
    IsNonBlank,
}

impl FilterType {
    const ALL: [FilterType; 13] = [
        FilterType::Eq,
        FilterType::NeqOrNull,
        FilterType::Gt,
        FilterType::Gte,
        FilterType::Lt,
        FilterType::Lte,
        FilterType::Contains,
        FilterType::DoesNotContain,
        FilterType::StartsWith,
        FilterType::In,
        FilterType::NotIn,
        FilterType::IsBlank,
        FilterType::IsNonBlank,
    ];

    /// URL suffix, e.g. `eq` in `query.Name~eq`.
    pub fn url_suffix(self) -> &'static str {
        match self {
            FilterType::Eq => "eq",
            FilterType::NeqOrNull => "neqornull",
            FilterType::Gt => "gt",
            FilterType::Gte => "gte",
            FilterType::Lt => "lt",
            FilterType::Lte => "lte",
            FilterType::Contains => "contains",
            FilterType::DoesNotContain => "doesnotcontain",
            FilterType::StartsWith => "startswith",
            FilterType::In => "in",
            FilterType::NotIn => "notin",
            FilterType::IsBlank => "isblank",
            FilterType::IsNonBlank => "isnonblank",
        }
    }

    /// Looks up a filter type by URL suffix (case-insensitive).
    pub fn from_url_suffix(suffix: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.url_suffix().eq_ignore_ascii_case(suffix))
    }

    /// Returns false for filters that ignore their value.
    pub fn requires_value(self) -> bool {
        !matches!(self, FilterType::IsBlank | FilterType::IsNonBlank)
    }

    /// Returns true for filters whose value is a `;`-separated list.
    pub fn is_multi_valued(self) -> bool {
        matches!(self, FilterType::In | FilterType::NotIn)
    }
}

/// A single column predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub column: String,
    pub filter_type: FilterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Filter {
    /// Creates a filter. The value is dropped for value-less filter types.
    pub fn new(column: impl Into<String>, filter_type: FilterType, value: Option<String>) -> Self {
        Self {
            column: column.into(),
            filter_type,
            value: if filter_type.requires_value() {
                value
            } else {
                None
            },
        }
    }

    /// Equality filter.
    pub fn equal(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(column, FilterType::Eq, Some(value.into()))
    }

    /// Multi-valued `in` filter.
    pub fn one_of<I, S>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(";");
        Self::new(column, FilterType::In, Some(joined))
    }

    /// Values of a multi-valued filter, or the single value otherwise.
    pub fn values(&self) -> Vec<&str> {
        match &self.value {
            Some(value) if self.filter_type.is_multi_valued() => {
                value.split(';').filter(|v| !v.is_empty()).collect()
            }
            Some(value) => vec![value.as_str()],
            None => Vec::new(),
        }
    }

    /// URL parameter name under `prefix`, e.g. `query.Name~eq`.
    pub fn url_param_name(&self, prefix: &str) -> String {
        format!("{}.{}~{}", prefix, self.column, self.filter_type.url_suffix())
    }

    /// URL parameter value; empty for value-less filters.
    pub fn url_param_value(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    /// Parses a `prefix.Column~suffix` parameter back into a filter.
    ///
    /// Returns `None` for parameters outside `prefix` or with an unknown
    /// suffix.
    pub fn parse_url_param(prefix: &str, name: &str, value: &str) -> Option<Self> {
        let rest = name.strip_prefix(prefix)?.strip_prefix('.')?;
        let (column, suffix) = rest.rsplit_once('~')?;
        if column.is_empty() {
            return None;
        }
        let filter_type = FilterType::from_url_suffix(suffix)?;
        let value = (!value.is_empty()).then(|| value.to_string());
        Some(Self::new(column, filter_type, value))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~{}", self.column, self.filter_type.url_suffix())?;
        if let Some(value) = &self.value {
            write!(f, "={}", value)?;
        }
        Ok(())
    }
}
