pub mod clustering;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod registry;
pub mod resolution;
pub mod session;
pub mod store;

pub use error::{CleanerError, MergeStep};
pub use session::{run_session, SessionOutcome, SessionReport};

pub const TARGET_DB: &str = "db_query";
pub const TARGET_SESSION: &str = "session";

/// Threshold used when `--distance` is not given.
pub const DEFAULT_EDIT_DISTANCE: usize = 1;
