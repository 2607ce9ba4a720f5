pub mod client;
pub mod commands;
pub mod companion;
pub mod config;
pub mod context;
pub mod events;
pub mod logging;
pub mod models;
pub mod plan;
pub mod runtime;
pub mod sim;
pub mod supervisor;

