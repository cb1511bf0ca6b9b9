//! CLI command implementations.

mod config;
mod serve;
mod solve;

pub use config::run_config;
pub use serve::run_serve;
pub use solve::run_solve;
