//! Core domain types.

pub mod image;
pub mod record;

pub use image::{ImageReference, ReferenceError};
pub use record::{ComponentRecord, ComponentStatus, FailureReason};
