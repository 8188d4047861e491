//! Role selection at process entry.
//!
//! The same executable runs either as the supervisor or, when relaunched with
//! [`SENTINEL`], as the delegated frontend runner. The decision is made from
//! the argument list alone, before logging or any other initialisation.

use std::ffi::{OsStr, OsString};

/// Argument that selects the delegated frontend runner.
pub const SENTINEL: &str = "--duet-frontend-runner";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Supervisor,
    /// Run the frontend. `args` are the remaining arguments, sentinel removed.
    DelegatedRunner { args: Vec<OsString> },
}

impl Role {
    /// Decide the role from a full argument list (program name first).
    pub fn detect<I>(args: I) -> Self
    where
        I: IntoIterator<Item = OsString>,
    {
        let args: Vec<OsString> = args.into_iter().skip(1).collect();

        if !args.iter().any(|a| a.as_os_str() == OsStr::new(SENTINEL)) {
            return Role::Supervisor;
        }

        Role::DelegatedRunner {
            args: args
                .into_iter()
                .filter(|a| a.as_os_str() != OsStr::new(SENTINEL))
                .collect(),
        }
    }
}
