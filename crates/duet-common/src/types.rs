//! Core domain types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two services a supervisor manages.
///
/// # Example
/// ```
/// use duet_common::ServiceRole;
///
/// assert_eq!(ServiceRole::Backend.as_str(), "backend");
/// assert_eq!(ServiceRole::Frontend.to_string(), "frontend");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceRole {
    /// The inference service (model-serving HTTP API).
    Backend,
    /// The web application the user interacts with.
    Frontend,
}

impl ServiceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceRole::Backend => "backend",
            ServiceRole::Frontend => "frontend",
        }
    }
}

impl fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
