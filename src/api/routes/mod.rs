pub mod dictionaries;
pub mod events;
pub mod health;
pub mod history;
pub mod jobs;

use crate::errors::EngineError;
use crate::pipeline::JobCategory;

pub(crate) fn parse_category(raw: &str) -> Result<JobCategory, EngineError> {
    raw.parse()
}
