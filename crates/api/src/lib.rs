//! HTTP API: routing, request/response mapping, and the service facade.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
