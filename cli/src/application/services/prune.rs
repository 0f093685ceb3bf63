//! Post-deployment `docker … prune`.

use anyhow::{Context, Result};

use crate::application::ports::{ProgressReporter, RemoteShell};
use crate::application::services::remote::run_checked;
use crate::domain::config::PruneType;

/// Condense prune output into report lines.
///
/// `Deleted …`/`Unused …` start a group whose following lines are shown as
/// members; the reclaimed-space total is reworded.
#[must_use]
pub fn summarise(stdout: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut in_group = false;
    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("Deleted ") || line.starts_with("Unused ") {
            in_group = true;
            lines.push(format!("• {line}"));
        } else if let Some(space) = line.strip_prefix("Total reclaimed space:") {
            in_group = false;
            lines.push(format!("• Reclaimed space: {}", space.trim()));
        } else if line.starts_with("No ") {
            in_group = false;
            lines.push(format!("• {line}"));
        } else if in_group {
            lines.push(format!("   → {line}"));
        } else {
            lines.push(format!("• {line}"));
        }
    }
    lines
}

/// Run the configured prune. No-op for [`PruneType::None`].
///
/// # Errors
///
/// Returns an error carrying the remote stderr if the prune fails.
pub async fn prune(
    shell: &impl RemoteShell,
    reporter: &impl ProgressReporter,
    prune_type: PruneType,
) -> Result<()> {
    let Some(cmd) = prune_type.command() else {
        return Ok(());
    };
    reporter.step("Docker prune...");
    reporter.substep(&format!("• Prune type: {prune_type}"));
    let output = run_checked(shell, reporter, cmd)
        .await
        .context("docker prune command failed")?;
    for line in summarise(&output.stdout) {
        reporter.substep(&line);
    }
    reporter.success("Docker prune completed successfully");
    Ok(())
}
