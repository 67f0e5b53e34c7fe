pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod history;
pub mod logging;
