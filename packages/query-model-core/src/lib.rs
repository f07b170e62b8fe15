//! Client-side query model.
//!
//! Provides schema/query identity, filters and sorts, column and view
//! metadata, the shared loading state machine, and the immutable
//! [`QueryModel`] with its derived paging, column, sort, and filter state.

pub mod config;
pub mod error;
pub mod filter;
pub mod load_state;
pub mod model;
pub mod query_info;
pub mod schema_query;
pub mod sort;

pub use config::QueryConfig;
pub use error::{QueryModelError, Result};
pub use filter::{Filter, FilterType};
pub use load_state::{LoadStatus, LoadingState};
pub use model::{QueryModel, Row, RowsResponse};
pub use query_info::{QueryColumn, QueryInfo, ViewInfo};
pub use schema_query::{SchemaQuery, ViewName};
pub use sort::{QuerySort, SortDirection};
