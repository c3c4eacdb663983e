pub mod commands;
pub mod job;
pub mod progress;
pub mod serve;

pub use commands::{Cli, Commands};
