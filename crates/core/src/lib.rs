//! Domain types and rules for the dispatch platform.
//!
//! This crate is deliberately free of I/O: the task state machine, geographic
//! math, and skill normalization live here as pure functions so they can be
//! tested without a database or a live transport.

pub mod contractor;
pub mod error;
pub mod geo;
pub mod task;
pub mod types;
