// Re-export modules for external use
pub mod client;
pub mod combat;
pub mod config;
pub mod handlers;
pub mod models;
pub mod registry;
pub mod stats;
