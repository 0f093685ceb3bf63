//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

// ── Deployment taxonomy ───────────────────────────────────────────────────────

/// Top-level error categories surfaced to the operator.
///
/// Every fatal path in a deployment ends in exactly one of these variants so
/// `main` can pick an exit message and a stable JSON error code.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Malformed or missing input, raised before any network I/O.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Dial, authentication or host verification failure.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Session or pipe failure while a step was in progress.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Structural problems in the deploy file, raised before remote mutation.
    #[error("Deploy file validation failed:\n{}", bullet_list(.0))]
    Validation(Vec<String>),

    /// Post-apply health check failed and no rollback was attempted.
    #[error("Deployment failed: {reason}")]
    DeploymentFailure { reason: String },

    /// Post-apply health check failed; the previous state was restored.
    #[error("Deployment failed, rollback completed successfully: {reason}")]
    RolledBack { reason: String },

    /// Restore or re-deploy failed. Remote state may be inconsistent.
    #[error("Deployment failed, rollback attempted but unsuccessful: {0}")]
    RollbackFailure(String),
}

impl DeployError {
    /// Stable machine-readable code used by `--json` error output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION",
            Self::Connection(ConnectionError::Auth(_)) => "AUTH",
            Self::Connection(ConnectionError::HostVerification(_)) => "HOST_VERIFICATION",
            Self::Connection(ConnectionError::Network(_)) => "NETWORK",
            Self::Transport(_) => "TRANSPORT",
            Self::Validation(_) => "VALIDATION",
            Self::DeploymentFailure { .. } => "DEPLOYMENT_FAILED",
            Self::RolledBack { .. } => "ROLLED_BACK",
            Self::RollbackFailure(_) => "ROLLBACK_FAILED",
        }
    }
}

// ── Connection errors ─────────────────────────────────────────────────────────

/// Errors raised while establishing the SSH connection. Never retried.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("SSH authentication failed: {0}")]
    Auth(String),

    #[error("SSH host key verification failed: {0}")]
    HostVerification(String),

    #[error("Unable to reach SSH host: {0}")]
    Network(String),
}

// ── Remote command errors ─────────────────────────────────────────────────────

/// A remote command ran to completion but exited non-zero.
///
/// Carries the captured stderr so fatal paths can show the operator what the
/// remote side said before the process exits.
#[derive(Debug, Error)]
#[error("remote command exited with status {code}{}", stderr_suffix(.stderr))]
pub struct RemoteCommandError {
    pub code: i32,
    pub stderr: String,
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\nDetails: {trimmed}")
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("  → {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}
