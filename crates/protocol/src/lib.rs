//! Wire types shared by the sessiond crates.
//!
//! This crate contains the serde-serializable shapes that cross a process or
//! network boundary: events forwarded to notification sinks, session summaries
//! returned to HTTP callers, and the JSON-lines messages exchanged with a
//! driver process.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization
//! * Stable: Changes only when a wire format changes
//!
//! Lifecycle orchestration is built on top of these types in `sessiond-core`.

pub mod auth;
pub mod driver;
pub mod event;
pub mod session;

pub use auth::*;
pub use driver::*;
pub use event::*;
pub use session::*;
