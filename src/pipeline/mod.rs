pub mod category;
pub mod config;
pub mod controller;
pub mod metrics;
pub mod pause;
pub mod pool;
pub mod runner;
pub mod state;

pub use category::JobCategory;
pub use config::{JobConfig, JobPlan, ValidatedJob};
pub use controller::{JobController, JobHandle};
pub use pause::PauseGate;
pub use state::{JobOutcome, JobSnapshot, JobStatus};
