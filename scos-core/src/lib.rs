//! SCOS Core Library
//!
//! Migration pipeline that rebuilds release components on the SCOS base
//! image family and composes a derived release from the results.

pub mod adapters;
pub mod config;
pub mod error;
pub mod manifest;
pub mod observability;
pub mod paths;
pub mod pipeline;
pub mod state;
pub mod types;

// Re-export commonly used items
pub use adapters::{AutoConfirm, Collaborators, Confirm};
pub use config::{Config, RunContext};
pub use error::{Result, ScosError};
pub use manifest::{load_manifest, parse_manifest, Manifest};
pub use observability::init as init_observability;
pub use pipeline::merger::FinalMapping;
pub use pipeline::release::ReleaseCommand;
pub use pipeline::summary::RunSummary;
pub use pipeline::{Pipeline, RunProgress, RunReport, RunStage};
pub use state::StateManager;
pub use types::{ComponentRecord, ComponentStatus, FailureReason, ImageReference};
