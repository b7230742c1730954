pub mod config;
pub mod constants;
pub mod error;
pub mod locations;
pub mod logging;
pub mod pipeline;
pub mod types;

// Port traits and the adapters behind them
pub mod app;
pub mod infra;
