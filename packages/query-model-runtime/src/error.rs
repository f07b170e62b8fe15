//! Runtime error types.

use query_model_core::QueryModelError;
use thiserror::Error;

/// Failure reported by a loader or the remote query API.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// The server answered with an error status
    #[error("Request failed with status {status}")]
    Request {
        status: u16,
        message: Option<String>,
    },

    /// The request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The request shape could not be derived from the model
    #[error("Invalid model state: {0}")]
    Model(#[from] QueryModelError),

    /// No loader is able to serve the request
    #[error("Loader unavailable")]
    Unavailable,
}

impl LoaderError {
    /// Human-readable message carried by the failure, if any.
    pub fn message(&self) -> Option<String> {
        match self {
            LoaderError::Request { message, .. } => {
                message.clone().filter(|m| !m.trim().is_empty())
            }
            LoaderError::Transport(message) if !message.trim().is_empty() => {
                Some(message.clone())
            }
            LoaderError::Transport(_) => None,
            LoaderError::Decode(e) => Some(e.to_string()),
            LoaderError::Model(e) => Some(e.to_string()),
            LoaderError::Unavailable => None,
        }
    }
}

/// Caller mistakes rejected by the model controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// No model registered under the id
    #[error("Model '{0}' not found")]
    ModelNotFound(String),

    /// A model is already registered under the id
    #[error("Model '{0}' already exists")]
    DuplicateModel(String),

    /// Model construction or derivation failed
    #[error(transparent)]
    Model(#[from] QueryModelError),
}

/// Result type for loader operations.
pub type LoaderResult<T> = std::result::Result<T, LoaderError>;

/// Result type for controller operations.
pub type Result<T> = std::result::Result<T, ControllerError>;
