//! Core ores library (config, backend client, auth, data loading, page).

pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod data;
pub mod hints;
pub mod logging;
pub mod page;
pub mod render;
pub mod stats;
