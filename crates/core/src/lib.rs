// MQ Loadgen Core - Partitioning, Rate Control & Ports
// NO broker client dependency: adapters implement the ports in their own crates

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;

pub use config::LoadConfig;
pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
