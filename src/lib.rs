//! locker - password guard for programs
//!
//! This library exposes the guard engine: the protection registry, the guard
//! state machine with its listener and suspension drivers, fuzzy process
//! search, and the platform capabilities they run on.

pub mod config;
pub mod constants;
pub mod guard;
pub mod logging;
pub mod models;
pub mod platform;
pub mod search;
