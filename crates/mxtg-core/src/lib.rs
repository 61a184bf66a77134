//! Core formatting logic for the Matrix <-> Telegram bridge.
//!
//! This crate is intentionally framework-agnostic. Identity lookup, the
//! message index and remote fetches live behind ports (traits) implemented in
//! adapter crates.

pub mod config;
pub mod directory;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod ports;
pub mod transform;

pub use errors::{Error, Result};
