pub mod connection;
pub mod findings;
pub mod jobs;
pub mod recorder;
pub mod schema;

pub use connection::Database;
pub use recorder::{Recorder, ResultSink};
