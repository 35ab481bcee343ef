/// Name of the identifier field every document carries
pub const ID_FIELD: &str = "_id";

/// Maximum length of a field name, in bytes
pub const MAX_FIELD_NAME_LEN: usize = 255;

/// Maximum number of drain rounds in one `QueueDeferrer::flush`
/// Prevents unbounded cascades between rules that feed each other
pub const MAX_FLUSH_ROUNDS: usize = 100;

/// Glue used by the default fields joiner
pub const DEFAULT_JOIN_GLUE: &str = ", ";

pub mod declaration;

pub use declaration::{CacheFieldConfig, DerivationRegistry, DeriveConfig, JoinOptions};
