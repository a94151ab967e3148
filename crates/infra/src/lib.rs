//! Infrastructure and application layer: event stores, read models, the
//! command dispatcher and the services the API calls.

pub mod backend;
pub mod catalog;
pub mod checkout;
pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod monitor;
pub mod parties;
pub mod projections;
pub mod read_model;
pub mod reports;
pub mod stock;

#[cfg(test)]
mod integration_tests;
#[cfg(test)]
pub(crate) mod testing;

pub use backend::{Backend, BackendError, Dispatcher};
pub use command_dispatcher::DispatchError;
pub use config::AppConfig;
