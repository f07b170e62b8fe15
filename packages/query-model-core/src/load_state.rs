//! Loading state shared by query info, rows, and selections.

use serde::{Deserialize, Serialize};

/// Lifecycle of one asynchronous concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LoadingState {
    /// Nothing requested yet
    #[default]
    Initialized,
    /// A request is in flight
    Loading,
    /// Terminal: the last request settled, successfully or not
    Loaded,
}

/// Loading state plus the error of the last settled request.
///
/// A failed request is still `Loaded`: failure is terminal so that nothing
/// waits on a request that will never complete.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoadStatus {
    pub state: LoadingState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoadStatus {
    pub fn initialized() -> Self {
        Self::default()
    }

    /// Marks a request in flight; a previous error is cleared.
    pub fn loading() -> Self {
        Self {
            state: LoadingState::Loading,
            error: None,
        }
    }

    pub fn loaded() -> Self {
        Self {
            state: LoadingState::Loaded,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            state: LoadingState::Loaded,
            error: Some(message.into()),
        }
    }

    /// True once the last request settled.
    pub fn is_settled(&self) -> bool {
        self.state == LoadingState::Loaded
    }

    pub fn is_loading(&self) -> bool {
        self.state == LoadingState::Loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}
