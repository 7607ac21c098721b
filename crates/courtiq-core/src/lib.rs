// Library root: re-exports all modules so the CLI and integration tests can
// access the crate's public API.

pub mod config;
pub mod data;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod scoring;
