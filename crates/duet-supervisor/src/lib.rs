//! # Duet Supervisor
//!
//! Runs an inference backend and a web frontend as a pair:
//!
//! 1. find a free port for the backend, start it, wait until it answers
//! 2. find a free port for the frontend, relaunch this executable as the
//!    frontend runner with the backend's URL in its environment, wait again
//! 3. open a browser, then block until the frontend exits or an interrupt
//! 4. stop the frontend, then the backend
//!
//! ```rust,no_run
//! use duet_supervisor::{
//!     LauncherConfig, ProcessLauncher, ServiceSpec, StateLayout, Supervisor, SupervisorOptions,
//! };
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let app_dir = Path::new("/opt/duet");
//! let config = LauncherConfig::default();
//! let layout = StateLayout::new(config.data_root(app_dir));
//! layout.ensure()?;
//!
//! let mut supervisor = Supervisor::new(
//!     ProcessLauncher,
//!     ServiceSpec::backend(&config.backend, &layout, app_dir),
//!     ServiceSpec::frontend(&config.frontend, &layout, &app_dir.join("duet"), None),
//!     SupervisorOptions::from_config(&config),
//!     CancellationToken::new(),
//! );
//! let outcome = supervisor.run().await?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod config;
pub mod delegate;
pub mod env;
pub mod handle;
pub mod launcher;
pub mod role;
pub mod service;
pub mod supervisor;

// Re-export main types
pub use config::LauncherConfig;
pub use delegate::{run_delegated, CommandEntry, FrontendEntry, FrontendEnv};
pub use handle::ServiceHandle;
pub use launcher::{Launch, ProcessLauncher};
pub use role::{Role, SENTINEL};
pub use service::{EntryPoint, ServiceSpec, StateLayout};
pub use supervisor::{RunOutcome, Supervisor, SupervisorOptions, SupervisorState};
