//! Domain layer: pure deployment logic, types and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod classify;
pub mod compose_file;
pub mod config;
pub mod deploy;
pub mod error;
pub mod remote;
pub mod ssh;
pub mod status;
pub mod upload;

pub use config::{DeployMode, DeploymentRequest, ExtraFile, PruneType};
pub use error::{ConnectionError, DeployError, RemoteCommandError};
pub use remote::{CommandOutput, OutputLine, StreamKind};
