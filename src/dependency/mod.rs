pub mod change_set;
pub mod triggers;

pub use change_set::ChangeSet;
pub use triggers::{install_triggers, register_cache_field, register_from_config, CacheFieldBuilder};
