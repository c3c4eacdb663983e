pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod engine;
pub mod errors;
pub mod events;
pub mod http;
pub mod models;
pub mod pipeline;
pub mod probes;
pub mod targets;
pub mod utils;

pub use engine::Engine;
pub use errors::EngineError;
