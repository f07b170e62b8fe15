//! Async controller for query models.
//!
//! [`QueryModels`] owns a keyed collection of immutable
//! [`QueryModel`](query_model_core::QueryModel) snapshots and drives them
//! through a [`QueryModelLoader`]. [`DefaultQueryModelLoader`] adapts any
//! [`QueryApi`] transport to the loader contract.

pub mod actions;
pub mod api;
pub mod controller;
pub mod default_loader;
pub mod error;
pub mod events;
pub mod loader;
pub mod settings;

pub use actions::{reduce, ModelAction, Reload, Transition};
pub use api::{QueryApi, QueryDetailsRequest, SelectRowsRequest, SelectRowsResponse, SelectionKey};
pub use controller::QueryModels;
pub use default_loader::DefaultQueryModelLoader;
pub use error::{ControllerError, LoaderError, LoaderResult, Result};
pub use events::ModelEvent;
pub use loader::QueryModelLoader;
pub use settings::{ControllerSettings, SettingsError};
