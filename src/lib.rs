pub mod api;
pub mod compare;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod summary;
pub mod types;

// Ports and their adapters
pub mod app;
pub mod infra;
