pub mod record;
pub mod target;

pub use record::{parse_key, record_key, HandoffRecord};
pub use target::{hub_wake_url, Target, HUB_PROCESS, HUB_SCHEME};
