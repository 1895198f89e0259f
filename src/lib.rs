//! StatusWatch - site monitoring engine
//!
//! Periodically probes a configured set of HTTP endpoints, records each
//! outcome into an append-only SQLite history, ages out old records, and
//! derives per-site and per-day uptime/latency statistics on demand. The
//! [`Engine`] is the surface a presentation layer talks to.

pub mod config;
pub mod db;
pub mod engine;
pub mod probe;
pub mod scheduler;
pub mod stats;

pub use engine::{Engine, StartupError};
