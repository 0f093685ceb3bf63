//! Compose engine: validate, pull, down, up, verify, and one rollback.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::time::Duration;

use anyhow::Result;

use crate::application::ports::{ProgressReporter, RemoteShell};
use crate::application::services::backup;
use crate::application::services::remote::{one_line, run_classified};
use crate::domain::config::DeploymentRequest;
use crate::domain::deploy::{ComposeStep, FailureAction, RollbackGuard, on_failure};
use crate::domain::error::DeployError;
use crate::domain::remote::shell_quote;
use crate::domain::status::{ComposeHealth, compose_health};

/// Pause between `up` and the status check so crash-looping containers have
/// time to show it.
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Inputs for one compose deployment.
pub struct ComposeOptions<'a> {
    pub request: &'a DeploymentRequest,
    /// `docker compose` or `docker-compose`, as detected on the target.
    pub compose_cli: &'a str,
    pub settle_delay: Duration,
}

/// Deploy with compose and verify every container came up.
///
/// On a failed `up` or verify with rollback enabled, the latest backup is
/// restored and the pipeline re-runs once from pull (or down), skipping
/// validation.
///
/// # Errors
///
/// - [`DeployError::Validation`] when `config` rejects the file.
/// - [`DeployError::DeploymentFailure`] when pull/down fail on the first
///   attempt, or verify fails with rollback disabled.
/// - [`DeployError::RolledBack`] when the rollback redeploy succeeded.
/// - [`DeployError::RollbackFailure`] when restore or the redeploy failed.
pub async fn deploy_compose(
    shell: &impl RemoteShell,
    reporter: &impl ProgressReporter,
    opts: ComposeOptions<'_>,
) -> Result<()> {
    let ComposeOptions {
        request,
        compose_cli,
        settle_delay,
    } = opts;
    let base = format!(
        "{compose_cli} -f {}",
        shell_quote(&request.remote_deploy_file())
    );
    let pull = request.compose.pull;
    let mut guard = RollbackGuard::default();
    let mut first_failure: Option<String> = None;
    let mut step = ComposeStep::Validate;

    loop {
        step = match step {
            ComposeStep::Validate => {
                validate(shell, reporter, &base).await?;
                reporter.step("Deploying with Docker Compose...");
                step.next(pull)
            }
            ComposeStep::Pull => {
                reporter.verbose("Pulling latest images...");
                if let Err(e) = run_classified(shell, reporter, &format!("{base} pull")).await {
                    return Err(halt(&guard, format!("pull failed: {e}")).into());
                }
                step.next(pull)
            }
            ComposeStep::Down => {
                reporter.verbose("Stopping existing services...");
                if let Err(e) = run_classified(shell, reporter, &format!("{base} down")).await {
                    return Err(halt(&guard, format!("failed to stop services: {e}")).into());
                }
                step.next(pull)
            }
            ComposeStep::Up => match start_services(shell, reporter, &base, request).await {
                Ok(()) => {
                    reporter.substep("Docker Compose deployment completed");
                    step.next(pull)
                }
                Err(e) => ComposeStep::Failed(e.to_string()),
            },
            ComposeStep::Verify => match verify(shell, reporter, &base, settle_delay).await {
                Ok(()) => ComposeStep::Done,
                Err(reason) => ComposeStep::Failed(reason),
            },
            ComposeStep::Failed(reason) => {
                reporter.error(&reason);
                match on_failure(request.rollback_enabled, &mut guard) {
                    FailureAction::Rollback => {
                        first_failure = Some(reason.clone());
                        ComposeStep::Restore(reason)
                    }
                    FailureAction::Abort => {
                        return Err(DeployError::DeploymentFailure { reason }.into());
                    }
                    FailureAction::AbortAfterRollback => {
                        return Err(DeployError::RollbackFailure(reason).into());
                    }
                }
            }
            ComposeStep::Restore(_) => {
                backup::restore(shell, reporter, &request.project_path).await?;
                reporter.step("Re-deploying after rollback...");
                step.next(pull)
            }
            ComposeStep::Done => break,
        };
    }

    match first_failure {
        Some(reason) if guard.fired() => Err(DeployError::RolledBack { reason }.into()),
        _ => {
            reporter.success("All containers are running as expected");
            Ok(())
        }
    }
}

/// A pull or down failure ends the run; once the redeploy has started it is
/// a failed rollback.
fn halt(guard: &RollbackGuard, reason: String) -> DeployError {
    if guard.fired() {
        DeployError::RollbackFailure(reason)
    } else {
        DeployError::DeploymentFailure { reason }
    }
}

async fn validate(
    shell: &impl RemoteShell,
    reporter: &impl ProgressReporter,
    base: &str,
) -> Result<()> {
    reporter.step("Validating Docker Compose file...");
    let cmd = format!("{base} config");
    reporter.command(&cmd);
    let output = shell.run_buffered(&cmd).await?;
    if let Some(err) = output.exit_error() {
        reporter.error("Compose file validation failed");
        return Err(DeployError::Validation(vec![one_line(&err.stderr)]).into());
    }
    reporter.success("Compose file is valid");
    Ok(())
}

/// One project-wide `up`, or one per target service.
async fn start_services(
    shell: &impl RemoteShell,
    reporter: &impl ProgressReporter,
    base: &str,
    request: &DeploymentRequest,
) -> Result<()> {
    let mut flags = String::from("-d");
    if request.compose.build {
        flags.push_str(" --build");
    }
    if request.compose.no_deps {
        flags.push_str(" --no-deps");
    }

    if request.compose.target_services.is_empty() {
        reporter.verbose("Starting all services...");
        return run_classified(shell, reporter, &format!("{base} up {flags}")).await;
    }
    for service in &request.compose.target_services {
        reporter.verbose(&format!("Starting service {service}..."));
        let cmd = format!("{base} up {flags} {}", shell_quote(service));
        run_classified(shell, reporter, &cmd).await?;
    }
    Ok(())
}

/// Returns the failure reason when any container is unhealthy.
async fn verify(
    shell: &impl RemoteShell,
    reporter: &impl ProgressReporter,
    base: &str,
    settle_delay: Duration,
) -> std::result::Result<(), String> {
    reporter.step("Validating Docker Compose status...");
    tokio::time::sleep(settle_delay).await;

    let cmd = format!("{base} ps -a");
    reporter.command(&cmd);
    let output = shell
        .run_buffered(&cmd)
        .await
        .map_err(|e| format!("failed to inspect services: {e}"))?;
    if let Some(err) = output.exit_error() {
        return Err(format!("failed to inspect services: {err}"));
    }

    match compose_health(&output.stdout) {
        ComposeHealth::Healthy { containers } => {
            reporter.verbose(&format!("{containers} container(s) running"));
            Ok(())
        }
        ComposeHealth::Empty => {
            reporter.warn("No container lines found in `ps` output");
            Err("no containers found to verify".to_string())
        }
        ComposeHealth::Failed(failed) => {
            let plural = if failed.len() == 1 { "" } else { "s" };
            reporter.substep(&format!(
                "Container check failed for {} container{plural}",
                failed.len()
            ));
            for container in &failed {
                reporter.line(&format!("→ {}", container.line));
            }
            Err("one or more containers failed to start".to_string())
        }
    }
}
