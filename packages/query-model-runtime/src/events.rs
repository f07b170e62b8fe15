//! Change notifications published by the model controller.

use query_model_core::model::KeyFilterWarning;

/// Notification about one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    /// A new snapshot was committed for the model
    Changed { id: String },
    /// The model was removed; in-flight results for it are dropped
    Removed { id: String },
    /// A request was issued in a degraded form
    Warning { id: String, warning: KeyFilterWarning },
}

impl ModelEvent {
    /// Id of the model the event is about.
    pub fn id(&self) -> &str {
        match self {
            ModelEvent::Changed { id } | ModelEvent::Removed { id } | ModelEvent::Warning { id, .. } => id,
        }
    }
}
