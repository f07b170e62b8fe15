//! Sort specifications.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Sort on one column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySort {
    pub field_key: String,
    #[serde(default, rename = "dir")]
    pub direction: SortDirection,
}

impl QuerySort {
    pub fn asc(field_key: impl Into<String>) -> Self {
        Self {
            field_key: field_key.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field_key: impl Into<String>) -> Self {
        Self {
            field_key: field_key.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Parses a single segment, `-Name` meaning descending.
    pub fn parse(segment: &str) -> Option<Self> {
        let segment = segment.trim();
        match segment.strip_prefix('-') {
            Some("") => None,
            Some(field_key) => Some(Self::desc(field_key)),
            None if segment.is_empty() => None,
            None => Some(Self::asc(segment)),
        }
    }
}

impl fmt::Display for QuerySort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.direction == SortDirection::Desc {
            f.write_str("-")?;
        }
        f.write_str(&self.field_key)
    }
}

/// Joins sorts into the comma-separated form used by the server.
pub fn sort_string<'a, I>(sorts: I) -> String
where
    I: IntoIterator<Item = &'a QuerySort>,
{
    sorts
        .into_iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses a comma-separated sort string, skipping blank segments.
pub fn parse_sort_string(value: &str) -> Vec<QuerySort> {
    value.split(',').filter_map(QuerySort::parse).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_string() {
        let sorts = vec![QuerySort::desc("RowId"), QuerySort::asc("Data")];
        assert_eq!(sort_string(&sorts), "-RowId,Data");
    }

    #[test]
    fn test_parse_sort_string() {
        assert_eq!(
            parse_sort_string("-RowId, Data,,-"),
            vec![QuerySort::desc("RowId"), QuerySort::asc("Data")]
        );
        assert!(parse_sort_string("").is_empty());
    }
}
