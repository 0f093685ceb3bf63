//! Project snapshots for compose rollbacks: backup, restore, cleanup.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! Only POSIX `find`/`cp`/`ls` are required on the target.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::application::ports::{ProgressReporter, RemoteShell};
use crate::application::services::remote::{one_line, run_checked};
use crate::domain::config::{DeployMode, DeploymentRequest};
use crate::domain::error::DeployError;
use crate::domain::remote::{remote_join, shell_quote};

/// Prefix shared by every snapshot directory.
pub const BACKUP_PREFIX: &str = ".backup_";

/// Snapshot directory name for `now`. Sorts chronologically.
#[must_use]
pub fn backup_dir_name(now: DateTime<Utc>) -> String {
    format!("{BACKUP_PREFIX}{}", now.format("%Y%m%d_%H%M%S_%3f"))
}

/// Whether this request takes snapshots at all.
#[must_use]
pub fn applies_to(request: &DeploymentRequest) -> bool {
    request.mode == DeployMode::Compose && request.rollback_enabled
}

/// Snapshot the remote project directory before a compose deployment.
///
/// Returns the snapshot path, or `None` when skipped: wrong mode, rollback
/// off, or no deploy file on the remote yet (first deployment).
///
/// # Errors
///
/// Returns an error if the snapshot directory cannot be created or filled.
pub async fn backup(
    shell: &impl RemoteShell,
    reporter: &impl ProgressReporter,
    request: &DeploymentRequest,
    now: DateTime<Utc>,
) -> Result<Option<String>> {
    if !applies_to(request) {
        return Ok(None);
    }
    reporter.step("Creating backup of deployment files...");

    let deploy_file = request.remote_deploy_file();
    let probe = format!("test -f {}", shell_quote(&deploy_file));
    reporter.command(&probe);
    if !shell.run_buffered(&probe).await?.success() {
        reporter.warn(&format!("Deploy file not found, skipping backup: {deploy_file}"));
        return Ok(None);
    }
    reporter.verbose("Deploy file found, proceeding with backup");

    let project = request.project_path.as_str();
    let backup_dir = remote_join(project, &backup_dir_name(now));
    let copy = format!(
        "mkdir -p {dir} && cd {project} && find . -mindepth 1 -maxdepth 1 ! -name {pattern} -exec cp -Rp {{}} {dir}/ \\;",
        dir = shell_quote(&backup_dir),
        project = shell_quote(project),
        pattern = shell_quote(&format!("{BACKUP_PREFIX}*")),
    );
    run_checked(shell, reporter, &copy)
        .await
        .context("failed to back up project directory")?;

    reporter.success(&format!("Project directory backed up at: {backup_dir}"));
    Ok(Some(backup_dir))
}

/// Copy the newest snapshot back over the project directory.
///
/// Returns the snapshot path that was restored.
///
/// # Errors
///
/// Returns [`DeployError::RollbackFailure`] when no snapshot exists or the
/// copy fails.
pub async fn restore(
    shell: &impl RemoteShell,
    reporter: &impl ProgressReporter,
    project_path: &str,
) -> Result<String> {
    reporter.step("Restoring latest backup...");

    let pattern = format!("{}/{BACKUP_PREFIX}*", shell_quote(project_path));
    let find = format!("ls -1d {pattern} 2>/dev/null | sort | tail -n 1");
    reporter.command(&find);
    let latest = shell.run_buffered(&find).await?;
    let backup_dir = latest.stdout_trimmed().to_string();
    if backup_dir.is_empty() {
        let msg = format!("no backup found in {project_path}");
        reporter.error(&msg);
        return Err(DeployError::RollbackFailure(msg).into());
    }
    reporter.substep(&format!("Restoring from backup: {backup_dir}"));

    let copy = format!(
        "cp -Rp {}/. {}/",
        shell_quote(&backup_dir),
        shell_quote(project_path)
    );
    reporter.command(&copy);
    let output = shell.run_buffered(&copy).await?;
    if let Some(err) = output.exit_error() {
        let msg = format!("failed to restore backup: {}", one_line(&err.stderr));
        reporter.error(&msg);
        return Err(DeployError::RollbackFailure(msg).into());
    }

    reporter.success("Backup restored successfully");
    Ok(backup_dir)
}

/// Remove every snapshot directory. Failure only warns.
pub async fn cleanup(
    shell: &impl RemoteShell,
    reporter: &impl ProgressReporter,
    project_path: &str,
) {
    reporter.step("Post-deployment cleanup...");
    let cmd = format!(
        "find {} -maxdepth 1 -type d -name {} -exec rm -rf {{}} +",
        shell_quote(project_path),
        shell_quote(&format!("{BACKUP_PREFIX}*"))
    );
    match run_checked(shell, reporter, &cmd).await {
        Ok(_) => reporter.success("Backup directories cleaned up"),
        Err(e) => reporter.warn(&format!("Failed to clean up backup directories: {e}")),
    }
}
