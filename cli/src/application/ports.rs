//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::domain::compose_file::ComposeFile;
use crate::domain::config::ExtraFile;
use crate::domain::remote::{CommandOutput, OutputLine};
use crate::domain::upload::{ExpandedExtra, UploadItem};

// ── Remote Execution Ports ────────────────────────────────────────────────────

/// Runs shell commands on the deployment target.
///
/// Every call opens and fully closes its own session; nothing is reused
/// between calls.
#[allow(async_fn_in_trait)]
pub trait RemoteShell {
    /// Run `command` to completion and capture both streams.
    ///
    /// A non-zero exit is *not* an error here: inspect
    /// [`CommandOutput::exit_error`]. Only transport failures return `Err`.
    async fn run_buffered(&self, command: &str) -> Result<CommandOutput>;

    /// Run `command`, delivering stdout and stderr lines to `on_line` in
    /// arrival order while the command runs.
    ///
    /// # Errors
    ///
    /// Returns an error wrapping [`crate::domain::RemoteCommandError`] on a
    /// non-zero exit, or a transport error.
    async fn run_streamed(
        &self,
        command: &str,
        on_line: &mut dyn FnMut(OutputLine),
    ) -> Result<()>;
}

/// Pushes local files to the deployment target.
#[allow(async_fn_in_trait)]
pub trait FileTransfer {
    /// Copy one local file to an absolute remote path, creating the parent
    /// directory first.
    async fn upload(&self, local: &Path, remote: &str) -> Result<()>;
}

// ── Local Filesystem Ports ────────────────────────────────────────────────────

/// Reads the local deploy file for validation.
pub trait DeployFileLoader {
    /// Read, expand `${VAR}` references in, and parse a compose file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    fn load(&self, path: &Path) -> Result<ComposeFile>;
}

/// Resolves extra-file sources and materialises generated files.
pub trait LocalFiles {
    /// Resolve each entry's literal path, directory or glob.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is invalid or matches nothing.
    fn expand(&self, entries: &[ExtraFile]) -> Result<Vec<ExpandedExtra>>;

    /// Local path to read `item` from. Generated items are written to a
    /// temporary file that lives as long as `self`.
    ///
    /// # Errors
    ///
    /// Returns an error if a generated file cannot be written.
    fn materialise(&self, item: &UploadItem, env_vars: Option<&str>) -> Result<PathBuf>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer.
pub trait ProgressReporter {
    /// Emit a top-level step heading.
    fn step(&self, message: &str);
    /// Emit an indented detail under the current step.
    fn substep(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a neutral informational message.
    fn info(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
    /// Emit an error message. Never suppressed.
    fn error(&self, message: &str);
    /// Emit a message shown only in verbose mode.
    fn verbose(&self, message: &str);
    /// Echo a remote command line, shown only in verbose mode.
    fn command(&self, command: &str);
    /// Echo one line of remote output, indented.
    fn line(&self, text: &str);
}
