//! SkyMate: travel preference resolution and flight ranking.
//!
//! Turns free-form utterances into canonical, mutually-exclusive preference
//! facts, resolves them against UI selections and legacy fuzzy memory,
//! compiles them into search parameters and filter predicates, and tags
//! flight offers as cheapest, fastest, and best.
//!
//! See `DESIGN.md` for the architecture.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod db;
pub mod engine;
pub mod flights;
pub mod logging;
pub mod memory;
pub mod preferences;
pub mod tools;
