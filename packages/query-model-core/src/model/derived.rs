//! Column, sort, and filter derivation from loaded metadata.

use std::fmt;

use super::QueryModel;
use crate::error::Result;
use crate::filter::{Filter, FilterType};
use crate::query_info::{QueryColumn, QueryInfo, ViewInfo};
use crate::sort::{sort_string, QuerySort};

/// Column tracking replaced rows. Single-row lookups include replaced rows.
pub const REPLACED_COLUMN: &str = "Replaced";

/// A key lookup that could not be turned into a key filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFilterWarning {
    NoPrimaryKey { id: String },
    MultiplePrimaryKeys { id: String, keys: Vec<String> },
}

impl fmt::Display for KeyFilterWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyFilterWarning::NoPrimaryKey { id } => write!(
                f,
                "Model '{}' requested a keyValue but its query has no primary key column; no key filter applied",
                id
            ),
            KeyFilterWarning::MultiplePrimaryKeys { id, keys } => write!(
                f,
                "Model '{}' requested a keyValue but its query has {} primary key columns ({}); no key filter applied",
                id,
                keys.len(),
                keys.join(", ")
            ),
        }
    }
}

impl QueryModel {
    fn view(&self) -> Option<&ViewInfo> {
        self.query_info()?.view(self.view_name())
    }

    /// Columns shown by the current view. `None` until metadata is loaded.
    pub fn display_columns(&self) -> Option<Vec<&QueryColumn>> {
        let info = self.query_info()?;
        Some(info.display_columns(self.view_name(), &self.omitted_columns))
    }

    /// Display columns followed by the rest of the query's columns.
    pub fn all_columns(&self) -> Option<Vec<&QueryColumn>> {
        let info = self.query_info()?;
        Some(info.all_columns(self.view_name(), &self.omitted_columns))
    }

    /// Primary key columns. `None` until metadata is loaded.
    pub fn key_columns(&self) -> Option<Vec<&QueryColumn>> {
        Some(self.query_info()?.pk_columns())
    }

    /// Comma-separated field keys to request: required columns, then primary
    /// keys, then display columns. Omitted columns are removed
    /// (case-insensitive) and repeats keep their first position.
    pub fn column_string(&self) -> Result<String> {
        let info = self.require_query_info("columnString")?;

        let display = info.display_columns(self.view_name(), &self.omitted_columns);
        let candidates = self
            .required_columns
            .iter()
            .map(String::as_str)
            .chain(info.pk_field_keys())
            .chain(display.iter().map(|c| c.field_key.as_str()));

        let mut keys: Vec<&str> = Vec::new();
        for key in candidates {
            let omitted = self
                .omitted_columns
                .iter()
                .any(|o| o.eq_ignore_ascii_case(key));
            let seen = keys.iter().any(|k| k.eq_ignore_ascii_case(key));
            if !omitted && !seen {
                keys.push(key);
            }
        }
        Ok(keys.join(","))
    }

    /// User sorts followed by the view's sorts.
    pub fn sort_string(&self) -> Result<String> {
        self.require_query_info("sortString")?;
        let view_sorts: &[QuerySort] = self.view().map(|v| v.sorts.as_slice()).unwrap_or(&[]);
        Ok(sort_string(self.sorts.iter().chain(view_sorts)))
    }

    /// Filters for the next row request.
    ///
    /// A key lookup (`key_value`) on a query with exactly one primary key
    /// yields the key filter plus the detail filters. Any other key layout
    /// yields no key filter and is reported through
    /// [`key_filter_warning`](Self::key_filter_warning). Without a key
    /// lookup the result is base, then user, then view filters.
    pub fn filters(&self) -> Result<Vec<Filter>> {
        let info = self.require_query_info("filters")?;

        if let Some(key_value) = &self.key_value {
            let pks = info.pk_field_keys();
            if let [pk] = pks.as_slice() {
                let mut filters = vec![Filter::equal(*pk, key_value.clone())];
                filters.extend(detail_filters(info));
                return Ok(filters);
            }
            if let Some(warning) = self.key_filter_warning() {
                tracing::warn!("{}", warning);
            }
            return Ok(Vec::new());
        }

        let view_filters: &[Filter] = self.view().map(|v| v.filters.as_slice()).unwrap_or(&[]);
        Ok(self
            .base_filters
            .iter()
            .chain(&self.filter_array)
            .chain(view_filters)
            .cloned()
            .collect())
    }

    /// Reports a key lookup that cannot produce a key filter.
    ///
    /// `None` when there is no key lookup, no metadata yet, or exactly one
    /// primary key.
    pub fn key_filter_warning(&self) -> Option<KeyFilterWarning> {
        self.key_value.as_ref()?;
        let pks = self.query_info()?.pk_field_keys();
        match pks.len() {
            0 => Some(KeyFilterWarning::NoPrimaryKey {
                id: self.id.clone(),
            }),
            1 => None,
            _ => Some(KeyFilterWarning::MultiplePrimaryKeys {
                id: self.id.clone(),
                keys: pks.into_iter().map(str::to_string).collect(),
            }),
        }
    }
}

fn detail_filters(info: &QueryInfo) -> Vec<Filter> {
    match info.column(REPLACED_COLUMN) {
        Some(column) => vec![Filter::new(
            column.field_key.clone(),
            FilterType::IsNonBlank,
            None,
        )],
        None => Vec::new(),
    }
}
