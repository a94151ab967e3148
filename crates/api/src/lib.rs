//! HTTP API: router, authentication middleware and the JSON envelope.

pub mod app;
pub mod context;
pub mod middleware;
