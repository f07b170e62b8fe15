//! Grid state bound to URL query parameters.
//!
//! Keys live under the model's URL prefix (`query` by default):
//! `query.p` (1-indexed page), `query.pageSize`, `query.sort`, `query.view`
//! and one `query.Column~suffix` entry per user filter.

use std::collections::BTreeMap;

use super::QueryModel;
use crate::error::{QueryModelError, Result};
use crate::filter::Filter;
use crate::schema_query::ViewName;
use crate::sort::{parse_sort_string, sort_string, QuerySort};

/// User-visible grid state decoded from URL parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlState {
    pub offset: u64,
    pub max_rows: i64,
    pub sorts: Vec<QuerySort>,
    pub filters: Vec<Filter>,
    pub view_name: Option<ViewName>,
}

impl QueryModel {
    /// Encodes the user-visible grid state. Defaults are left out.
    pub fn url_query_params(&self) -> BTreeMap<String, String> {
        let prefix = &self.url_prefix;
        let mut params = BTreeMap::new();

        if self.current_page() > 1 {
            params.insert(format!("{prefix}.p"), self.current_page().to_string());
        }
        if self.max_rows != self.default_max_rows {
            params.insert(format!("{prefix}.pageSize"), self.max_rows.to_string());
        }
        if !self.sorts.is_empty() {
            params.insert(format!("{prefix}.sort"), sort_string(&self.sorts));
        }
        if let Some(view) = self.view_name().filter(|v| **v != ViewName::Default) {
            params.insert(format!("{prefix}.view"), view.to_string());
        }
        for filter in &self.filter_array {
            params.insert(
                filter.url_param_name(prefix),
                filter.url_param_value().to_string(),
            );
        }
        params
    }

    /// Decodes URL parameters under this model's prefix.
    ///
    /// Missing keys decode to defaults, so the result describes a complete
    /// grid state. Parameters under other prefixes are ignored.
    pub fn url_state(&self, params: &BTreeMap<String, String>) -> Result<UrlState> {
        let prefix = &self.url_prefix;
        let get = |suffix: &str| params.get(&format!("{prefix}.{suffix}"));

        let max_rows = match get("pageSize") {
            Some(raw) => parse_param(&format!("{prefix}.pageSize"), raw)?,
            None => self.default_max_rows,
        };

        let page: u64 = match get("p") {
            Some(raw) => parse_param(&format!("{prefix}.p"), raw)?,
            None => 1,
        };
        if page == 0 {
            return Err(QueryModelError::InvalidUrlParam {
                param: format!("{prefix}.p"),
                value: "0".to_string(),
            });
        }
        let offset = match u64::try_from(max_rows).ok().filter(|size| *size > 0) {
            Some(size) => (page - 1).checked_mul(size).ok_or_else(|| {
                QueryModelError::InvalidUrlParam {
                    param: format!("{prefix}.p"),
                    value: page.to_string(),
                }
            })?,
            None => 0,
        };

        let sorts = get("sort")
            .map(|raw| parse_sort_string(raw))
            .unwrap_or_default();
        let view_name = get("view")
            .map(|raw| ViewName::parse(raw))
            .filter(|v| *v != ViewName::Default);
        let filters = params
            .iter()
            .filter_map(|(name, value)| Filter::parse_url_param(prefix, name, value))
            .collect();

        Ok(UrlState {
            offset,
            max_rows,
            sorts,
            filters,
            view_name,
        })
    }
}

fn parse_param<T: std::str::FromStr>(param: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| QueryModelError::InvalidUrlParam {
            param: param.to_string(),
            value: raw.to_string(),
        })
}
