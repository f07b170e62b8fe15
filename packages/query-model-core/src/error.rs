//! Query model error types.

use thiserror::Error;

/// Errors raised synchronously by the query model.
///
/// These are caller mistakes (missing identity, reading derived state before
/// it exists). Load failures never surface here; they are recorded on the
/// model as error fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryModelError {
    /// Model construction without a schema/query identity
    #[error("A schemaQuery is required to construct a QueryModel")]
    MissingSchemaQuery,

    /// Derived column/sort/filter state read before metadata was loaded
    #[error("Cannot compute {operation} for model '{id}': queryInfo is not loaded")]
    QueryInfoNotLoaded { id: String, operation: &'static str },

    /// Row projection read before any rows were loaded
    #[error("Cannot compute gridData for model '{id}': rows are not loaded")]
    RowsNotLoaded { id: String },

    /// A row key listed in the ordering has no row value
    #[error("Row '{key}' is listed in orderedRows but missing from rows for model '{id}'")]
    MissingRow { id: String, key: String },

    /// Malformed URL parameter value
    #[error("Invalid value '{value}' for URL parameter '{param}'")]
    InvalidUrlParam { param: String, value: String },
}

/// Result type for query model operations.
pub type Result<T> = std::result::Result<T, QueryModelError>;
