pub mod aggregator;
pub mod api;
pub mod cache;
pub mod config;
pub mod database;
pub mod decimal;
pub mod error;
pub mod orchestrator;
pub mod providers;
pub mod registry;
pub mod scheduler;
pub mod services;
