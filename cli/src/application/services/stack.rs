//! Stack engine: validate locally, deploy, verify replicas, roll back
//! mismatched services.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::path::Path;

use anyhow::{Context, Result};

use crate::application::ports::{DeployFileLoader, ProgressReporter, RemoteShell};
use crate::application::services::remote::{run_checked, run_classified};
use crate::domain::compose_file::ensure_valid;
use crate::domain::config::{DeploymentRequest, ENV_FILE_NAME};
use crate::domain::error::DeployError;
use crate::domain::remote::{remote_join, shell_quote};
use crate::domain::status::{SERVICE_LS_FORMAT, ServiceStatus, parse_service_ls, unconverged};

/// Load and structurally validate the local stack file.
///
/// Runs before anything touches the remote host.
///
/// # Errors
///
/// Returns [`DeployError::Validation`] listing every issue, or the loader's
/// error when the file cannot be read or parsed.
pub fn validate_stack_file(
    loader: &impl DeployFileLoader,
    reporter: &impl ProgressReporter,
    path: &Path,
) -> Result<()> {
    reporter.step("Validating Docker Stack file...");
    reporter.verbose(&format!("Stack file: {}", path.display()));
    let file = loader.load(path)?;
    if let Err(e) = ensure_valid(&file) {
        reporter.error(&e.to_string());
        return Err(e.into());
    }
    reporter.success("Stack file validation passed");
    Ok(())
}

/// `docker stack deploy`, sourcing the uploaded `.env` first when present.
#[must_use]
pub fn deploy_command(request: &DeploymentRequest) -> String {
    let mut cmd = String::new();
    if request.has_env_vars() {
        let env_file = shell_quote(&remote_join(&request.project_path, ENV_FILE_NAME));
        cmd.push_str(&format!(
            "if [ -f {env_file} ]; then set -a; . {env_file}; set +a; fi; "
        ));
    }
    cmd.push_str(&format!(
        "docker stack deploy -c {} {}",
        shell_quote(&request.remote_deploy_file()),
        shell_quote(request.stack_name())
    ));
    if request.registry.is_complete() {
        cmd.push_str(" --with-registry-auth");
    }
    cmd.push_str(" --detach=false");
    cmd
}

/// Deploy the stack and verify that every service reaches its desired
/// replica count.
///
/// # Errors
///
/// - [`DeployError::DeploymentFailure`] when services are unhealthy and
///   nothing was rolled back, or when the deploy command failed even though
///   services look healthy.
/// - [`DeployError::RolledBack`] when at least one service was rolled back.
pub async fn deploy_stack(
    shell: &impl RemoteShell,
    reporter: &impl ProgressReporter,
    request: &DeploymentRequest,
) -> Result<()> {
    let stack = request.stack_name();
    reporter.step("Deploying Docker stack...");
    if request.has_env_vars() {
        reporter.substep("Loading environment variables");
    }
    reporter.substep(&format!("Deploying stack '{stack}'"));

    let deployed = run_classified(shell, reporter, &deploy_command(request)).await;
    if deployed.is_ok() {
        reporter.substep(&format!("All services in stack '{stack}' have converged"));
    }

    reporter.step("Validating stack status...");
    let services = service_status(shell, reporter, stack).await?;
    let failed = unconverged(&services);

    match (&deployed, failed.is_empty()) {
        (Ok(()), true) => {
            reporter.success(&format!("All services in stack '{stack}' are healthy"));
            Ok(())
        }
        (Err(e), true) => {
            reporter.error(&e.to_string());
            reporter.success(&format!(
                "All services in stack '{stack}' are healthy (despite deployment error)"
            ));
            Err(DeployError::DeploymentFailure {
                reason: format!("stack '{stack}' is healthy despite deployment error: {e}"),
            }
            .into())
        }
        (_, false) => {
            if let Err(e) = &deployed {
                reporter.error(&e.to_string());
            }
            report_unhealthy(reporter, stack, &failed);
            let reason = format!("{} service(s) in stack '{stack}' failed to start", failed.len());
            if request.rollback_enabled && rollback(shell, reporter, &failed).await {
                return Err(DeployError::RolledBack { reason }.into());
            }
            Err(DeployError::DeploymentFailure { reason }.into())
        }
    }
}

async fn service_status(
    shell: &impl RemoteShell,
    reporter: &impl ProgressReporter,
    stack: &str,
) -> Result<Vec<ServiceStatus>> {
    let cmd = format!(
        "docker service ls --filter {} --format {}",
        shell_quote(&format!("label=com.docker.stack.namespace={stack}")),
        shell_quote(SERVICE_LS_FORMAT)
    );
    let output = run_checked(shell, reporter, &cmd)
        .await
        .context("error verifying services")?;
    let services = parse_service_ls(&output.stdout);
    if services.is_empty() {
        reporter.warn(&format!("No services found for stack '{stack}'"));
    }
    Ok(services)
}

fn report_unhealthy(reporter: &impl ProgressReporter, stack: &str, failed: &[&ServiceStatus]) {
    let plural = if failed.len() == 1 { "" } else { "s" };
    reporter.substep(&format!(
        "Health check failed for {} service{plural}",
        failed.len()
    ));
    for svc in failed {
        reporter.line(&format!(
            "→ {}: REPLICAS {}, IMAGE {}",
            svc.name,
            svc.replicas(),
            svc.image
        ));
    }
    reporter.error(&format!("Stack validation failed for '{stack}'"));
}

/// Roll back each mismatched service. Returns whether any rollback worked.
async fn rollback(
    shell: &impl RemoteShell,
    reporter: &impl ProgressReporter,
    failed: &[&ServiceStatus],
) -> bool {
    reporter.step("Starting rollback...");
    let mut rolled_back = false;
    for svc in failed {
        reporter.substep(&format!("Rolling back {}", svc.name));
        let cmd = format!("docker service update --rollback {}", shell_quote(&svc.name));
        match run_classified(shell, reporter, &cmd).await {
            Ok(()) => {
                reporter.success(&format!("Rolled back: {}", svc.name));
                rolled_back = true;
            }
            Err(e) => reporter.warn(&format!("Rollback failed for {}: {e}", svc.name)),
        }
    }
    rolled_back
}
