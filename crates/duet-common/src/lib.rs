//! # Duet Common
//!
//! Types shared by every duet crate: the launch error taxonomy and the
//! service role identifiers.

pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::{LaunchError, LaunchResult, ResultExt};
pub use types::ServiceRole;
