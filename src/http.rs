//! HTTP transport and the shared metadata request pattern.

pub mod client;
pub mod requestor;
