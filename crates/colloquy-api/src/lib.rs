pub mod bootstrap;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod routes;
pub mod state;
pub mod streaming;
