//! AWS-oriented adapters and handlers for the object reporter.
//!
//! This crate owns runtime integration details (Lambda handlers, table
//! adapters, configuration and telemetry). Contracts, rendering and the
//! deployment template live in `object_reporter_core`.

pub mod adapters;
pub mod config;
pub mod error;
pub mod handlers;
pub mod telemetry;
