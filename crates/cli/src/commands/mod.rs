//! CLI command implementations, one module per subcommand.

mod index;
mod query;
mod rebuild;
mod stats;
mod watch;

pub use index::cmd_index;
pub use query::cmd_query;
pub use rebuild::cmd_rebuild;
pub use stats::cmd_stats;
pub use watch::cmd_watch;
