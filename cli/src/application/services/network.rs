//! Ensure the configured Docker network exists with the expected driver.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::{Context, Result, bail};

use crate::application::ports::{ProgressReporter, RemoteShell};
use crate::application::services::remote::run_checked;
use crate::domain::config::{DeployMode, DeploymentRequest};
use crate::domain::remote::shell_quote;

/// `docker network create` for `name`.
///
/// Overlay networks in stack mode get swarm scope, and optionally
/// `--attachable`.
#[must_use]
pub fn create_command(mode: DeployMode, name: &str, driver: &str, attachable: bool) -> String {
    let mut cmd = format!("docker network create --driver {}", shell_quote(driver));
    if driver == "overlay" && mode == DeployMode::Stack {
        cmd.push_str(" --scope swarm");
        if attachable {
            cmd.push_str(" --attachable");
        }
    }
    cmd.push(' ');
    cmd.push_str(&shell_quote(name));
    cmd
}

/// Make sure the request's network exists. No-op when no network is set.
///
/// An existing network with a different driver only warns.
///
/// # Errors
///
/// Returns an error if the network cannot be inspected or created.
pub async fn ensure_network(
    shell: &impl RemoteShell,
    reporter: &impl ProgressReporter,
    request: &DeploymentRequest,
) -> Result<()> {
    let Some(name) = request.network.name.as_deref().filter(|n| !n.is_empty()) else {
        return Ok(());
    };
    let driver = request
        .network
        .driver
        .as_deref()
        .filter(|d| !d.is_empty())
        .unwrap_or(request.mode.default_network_driver());

    reporter.step("Docker network checks...");
    reporter.verbose(&format!("Checking if Docker network '{name}' exists"));
    let probe = format!(
        "docker network inspect {} >/dev/null 2>&1 && echo EXISTS || echo MISSING",
        shell_quote(name)
    );
    let output = run_checked(shell, reporter, &probe)
        .await
        .context("failed to check Docker network existence")?;

    match output.stdout_trimmed() {
        "EXISTS" => {
            reporter.success(&format!("Network '{name}' already exists"));
            let inspect = format!(
                "docker network inspect --format '{{{{ .Driver }}}}' {}",
                shell_quote(name)
            );
            let actual = run_checked(shell, reporter, &inspect)
                .await
                .with_context(|| format!("could not verify driver for network '{name}'"))?;
            let actual = actual.stdout_trimmed();
            if actual == driver {
                reporter.success(&format!("Driver matches expected: '{driver}'"));
            } else {
                reporter.warn(&format!(
                    "Driver mismatch: found '{actual}', expected '{driver}'"
                ));
                reporter.info("Consider removing and recreating the network");
            }
        }
        "MISSING" => {
            reporter.info(&format!("Network '{name}' does not exist"));
            reporter.substep(&format!("Creating network '{name}' (driver: '{driver}')"));
            let create = create_command(request.mode, name, driver, request.network.attachable);
            let created = run_checked(shell, reporter, &create)
                .await
                .with_context(|| format!("failed to create Docker network '{name}'"))?;
            match created.stdout_trimmed() {
                "" => reporter.success(&format!("Network '{name}' created successfully")),
                id => reporter.success(&format!("Network '{name}' created successfully (ID: {id})")),
            }
        }
        other => bail!("unexpected output from network inspect: {other}"),
    }
    Ok(())
}
