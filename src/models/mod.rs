pub mod record;
pub mod work;

pub use record::{AliveMethod, PocMode, ResultRecord, SecretHit, Transport};
pub use work::{CrawlItem, CredentialItem, CredentialTarget, PathItem, PortItem};
