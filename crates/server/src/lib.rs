//! Context graph server
//!
//! HTTP presentation layer over [`graph_lib::GraphService`].

pub mod api;
pub mod config;

pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
