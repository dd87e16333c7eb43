pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod table;
pub mod workbook;

// Pure record transformations
pub mod pipeline;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;
