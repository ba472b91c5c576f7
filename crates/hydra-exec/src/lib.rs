//! Worker-side attempt execution.
//!
//! A [`RouterExecutor`] plugged into [`hydra_client::InMemoryControlPlane`] turns the
//! in-process plane into a real local worker: COMMAND jobs run through the shell,
//! FUNCTION jobs run against an [`FnRegistry`].

mod error;
pub use error::{ExecError, ExecResult};

mod limits;
pub use limits::{ProcessLimits, attach_limits};

mod runner;
pub use runner::Runner;

mod registry;
pub use registry::FnRegistry;

mod router;
pub use router::RouterExecutor;

#[cfg(feature = "shell")]
mod shell;
#[cfg(feature = "shell")]
pub use shell::ShellExecutor;

#[cfg(feature = "shell")]
mod util;

pub mod prelude {
    #[cfg(feature = "shell")]
    pub use crate::ShellExecutor;
    pub use crate::error::{ExecError, ExecResult};
    pub use crate::{FnRegistry, RouterExecutor, Runner};
}
