//! JSON output helpers for `--json`.

use anyhow::{Context, Result};

use crate::domain::config::DeploymentRequest;
use crate::domain::error::{DeployError, RemoteCommandError};

/// Machine-readable code for any error reaching `main`.
///
/// A remote command that exited non-zero outside a classified step is
/// `REMOTE_COMMAND`; anything untyped is `INTERNAL`.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> &'static str {
    if let Some(e) = err.downcast_ref::<DeployError>() {
        e.code()
    } else if err.downcast_ref::<RemoteCommandError>().is_some() {
        "REMOTE_COMMAND"
    } else {
        "INTERNAL"
    }
}

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Format the summary printed after a successful deployment.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_deployed(request: &DeploymentRequest, host: &str, uploaded: &[String]) -> Result<String> {
    let obj = serde_json::json!({
        "deployed": true,
        "host": host,
        "mode": request.mode.to_string(),
        "project_path": request.project_path,
        "stack": request.stack_name.as_deref(),
        "uploaded": uploaded,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}
