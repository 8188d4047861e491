//! # Duet Process
//!
//! Low-level operations the supervisor builds on:
//! - Free port discovery on the loopback interface
//! - Executable validation and best-effort permission repair
//! - Process spawning with a constructed environment
//! - Process existence checks
//! - Graceful and forceful termination

pub mod check;
pub mod execute;
pub mod ports;
pub mod terminate;
pub mod validation;

// Re-export main types
pub use check::*;
pub use execute::*;
pub use ports::*;
pub use terminate::*;
pub use validation::*;
