//! HTTP API: server wiring, request context, routing and JSON mapping.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
