//! Project directory setup, upload planning, transfer and verification.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::{Context, Result, bail};

use crate::application::ports::{FileTransfer, LocalFiles, ProgressReporter, RemoteShell};
use crate::application::services::remote::run_checked;
use crate::domain::config::DeploymentRequest;
use crate::domain::remote::{remote_basename, shell_quote};
use crate::domain::upload::{UploadItem, plan_uploads};

/// Resolve extra files locally and build the upload plan.
///
/// Runs before connecting so planning errors never touch the remote host.
///
/// # Errors
///
/// Returns an error for unmatched sources or flattening conflicts.
pub fn prepare(
    files: &impl LocalFiles,
    reporter: &impl ProgressReporter,
    request: &DeploymentRequest,
) -> Result<Vec<UploadItem>> {
    let expanded = files.expand(&request.extra_files)?;
    let plan = plan_uploads(request, &expanded)?;

    reporter.step("Planned uploads...");
    for item in &plan {
        reporter.substep(&format!(
            "• {} -> {} {}",
            item.source, item.destination, item.note
        ));
    }
    reporter.success(&format!("{} files prepared for upload", plan.len()));
    Ok(plan)
}

/// Create the remote project directory (mode 750) when missing.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub async fn ensure_project_path(
    shell: &impl RemoteShell,
    reporter: &impl ProgressReporter,
    project_path: &str,
) -> Result<()> {
    reporter.step("Checking project path...");
    let path = shell_quote(project_path);
    let cmd = format!(
        "if [ -d {path} ]; then echo EXISTS; else mkdir -p {path} && chmod 750 {path} && echo CREATED; fi"
    );
    let output = run_checked(shell, reporter, &cmd)
        .await
        .context("unable to ensure project path")?;
    match output.stdout_trimmed() {
        "EXISTS" => reporter.success("Project directory already exists"),
        "CREATED" => reporter.success("Project directory created and verified"),
        other => bail!("unexpected response while creating project path: {other}"),
    }
    Ok(())
}

/// Transfer every planned file, writing the generated `.env` on the way.
///
/// # Errors
///
/// Returns an error naming the first file that failed.
pub async fn upload_all(
    transfer: &impl FileTransfer,
    files: &impl LocalFiles,
    reporter: &impl ProgressReporter,
    request: &DeploymentRequest,
    plan: &[UploadItem],
) -> Result<()> {
    reporter.step("Uploading files...");
    for item in plan {
        if item.is_generated() {
            reporter.verbose("Creating temporary .env file with inline variables");
        }
        let local = files.materialise(item, request.env_vars.as_deref())?;
        reporter.verbose(&format!("Uploading '{}' to '{}'", item.source, item.destination));
        transfer
            .upload(&local, &item.destination)
            .await
            .with_context(|| format!("failed to upload '{}'", item.source))?;
        reporter.success(&format!("{} uploaded", remote_basename(&item.source)));
    }
    Ok(())
}

/// Confirm every destination exists on the remote host.
///
/// # Errors
///
/// Returns an error naming the first missing file.
pub async fn verify(
    shell: &impl RemoteShell,
    reporter: &impl ProgressReporter,
    plan: &[UploadItem],
) -> Result<()> {
    reporter.step("Verifying uploaded files...");
    for item in plan {
        let cmd = format!(
            "if stat {} >/dev/null 2>&1; then echo OK; else echo MISSING; fi",
            shell_quote(&item.destination)
        );
        let output = run_checked(shell, reporter, &cmd)
            .await
            .with_context(|| format!("unable to verify remote file '{}'", item.destination))?;
        match output.stdout_trimmed() {
            "OK" => reporter.success(&item.destination),
            "MISSING" => bail!("file missing after upload: {}", item.destination),
            other => bail!("unexpected verification response for {}: {other}", item.destination),
        }
    }
    Ok(())
}
