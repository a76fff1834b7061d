pub mod builds;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod github;
pub mod prom_metrics;
pub mod release;
pub mod resource;
pub mod server;
