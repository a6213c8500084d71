//! CLI command implementations

pub mod migrate;
pub mod prompt;
pub mod status;
pub mod transform;

pub use migrate::migrate;
pub use status::{release_command, status};
pub use transform::transform;
