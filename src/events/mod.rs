pub mod bus;
pub mod types;

pub use bus::{EventBus, EventSink, JobEmitter, Subscription};
pub use types::{EventPayload, JobEvent, LogLevel};
