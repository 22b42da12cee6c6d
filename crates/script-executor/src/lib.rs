//! Host-side execution for BYOH
//!
//! Runs bootstrap documents and install scripts on the local machine:
//! - [`ScriptExecutor`] abstracts command execution and file writes
//! - [`BootstrapConfig`] parses the cloud-init subset used for node bootstrap
//! - [`template`] expands host metadata and bundle paths into documents
//!
//! # Example
//!
//! ```no_run
//! use script_executor::{BootstrapConfig, LocalExecutor, template};
//!
//! # async fn example(document: &str) -> Result<(), script_executor::ExecError> {
//! let rendered = template::render_bootstrap(document, "host-1")?;
//! let config = BootstrapConfig::parse(&rendered)?;
//! config.apply(&LocalExecutor::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod cloudinit;
pub mod error;
pub mod executor;
pub mod template;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use cloudinit::{BootstrapConfig, RunCmd, WriteFile};
pub use error::ExecError;
pub use executor::{CommandOutput, LocalExecutor, ScriptExecutor, shell, split_command};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{RecordingExecutor, WrittenFile};
