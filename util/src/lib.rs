pub mod config;
pub mod execution_config;
pub mod logging;
