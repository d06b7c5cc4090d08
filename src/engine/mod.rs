pub mod config;
pub mod orchestrator;
