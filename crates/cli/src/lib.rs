//! The `sessiond` daemon: config layering, logging, and the HTTP/WebSocket
//! surface over [`sessiond::SessionManager`].

pub mod app;
pub mod cli;
pub mod config;
pub mod http;
pub mod logging;
