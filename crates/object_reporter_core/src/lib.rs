//! Shared object reporter domain primitives.
//!
//! This crate owns the event and HTTP contracts, report rendering, the edge
//! router model and the deployment template. It intentionally excludes AWS
//! SDK and Lambda runtime concerns; those live in `object_reporter_lambda`.

pub mod contract;
pub mod object_key;
pub mod report;
pub mod routing;
pub mod stack;
