#![forbid(unsafe_code)]

pub mod api;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod models;
pub mod notifier;
pub mod orchestrator;
pub mod persistence;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
