//! Hearth Common - Shared types for the device diagnostics core
//!
//! Evidence-based diagnostics only: every type here describes something
//! that was actually observed for a device, never something inferred
//! without supporting events.

pub mod config;
pub mod error;
pub mod types;

pub use config::*;
pub use error::*;
pub use types::*;
