//! Command handlers: bridge CLI args -> core operations -> output formatting.

pub mod apply;
pub mod config_cmd;
pub mod plan;
