//! Target host prerequisites: docker, swarm mode, compose CLI.

use anyhow::{Context, Result, bail};

use crate::application::ports::{ProgressReporter, RemoteShell};
use crate::application::services::remote::run_checked;
use crate::domain::config::DeployMode;
use crate::domain::error::DeployError;

const DOCKER_PROBE: &str = "if command -v docker >/dev/null 2>&1; then echo OK; else echo MISSING; fi";
const SWARM_PROBE: &str =
    "if docker info 2>/dev/null | grep -q 'Swarm: active'; then echo OK; else echo MISSING; fi";
const COMPOSE_PROBE: &str = "if docker compose version >/dev/null 2>&1; then echo 'docker compose'; \
elif command -v docker-compose >/dev/null 2>&1; then echo docker-compose; else echo MISSING; fi";

/// Compose CLI spelling used when the mode does not need detection.
pub const DEFAULT_COMPOSE_CLI: &str = "docker compose";

/// Check what the deployment mode needs on the target.
///
/// Returns the compose CLI to use. Stack mode always returns
/// [`DEFAULT_COMPOSE_CLI`], which it never invokes.
///
/// # Errors
///
/// Returns [`DeployError::Configuration`] naming the missing prerequisite,
/// or a transport error.
pub async fn check(
    shell: &impl RemoteShell,
    reporter: &impl ProgressReporter,
    mode: DeployMode,
) -> Result<String> {
    match mode {
        DeployMode::Stack => reporter.step("Docker Stack checks..."),
        DeployMode::Compose => reporter.step("Docker Compose checks..."),
    }

    reporter.verbose("Checking: Docker binary availability");
    match probe(shell, reporter, DOCKER_PROBE).await?.as_str() {
        "OK" => reporter.success("Docker is installed and accessible"),
        "MISSING" => return Err(missing("Docker is not installed or not available in PATH")),
        other => bail!("unexpected response while checking for Docker: {other}"),
    }

    if mode == DeployMode::Stack {
        reporter.verbose("Checking: Docker Swarm mode status");
        match probe(shell, reporter, SWARM_PROBE).await?.as_str() {
            "OK" => reporter.success("Swarm mode is active"),
            "MISSING" => return Err(missing("Swarm mode is not active (required for stack mode)")),
            other => bail!("unexpected response when checking Swarm mode: {other}"),
        }
        return Ok(DEFAULT_COMPOSE_CLI.to_string());
    }

    reporter.verbose("Checking: Docker Compose availability");
    let cli = probe(shell, reporter, COMPOSE_PROBE).await?;
    match cli.as_str() {
        "docker compose" | "docker-compose" => {
            reporter.success(&format!("Docker Compose is available ({cli})"));
            Ok(cli)
        }
        "MISSING" => Err(missing("Docker Compose is not installed or accessible")),
        other => bail!("unexpected response when checking Compose: {other}"),
    }
}

async fn probe(
    shell: &impl RemoteShell,
    reporter: &impl ProgressReporter,
    script: &str,
) -> Result<String> {
    let output = run_checked(shell, reporter, script)
        .await
        .context("unable to verify Docker requirements")?;
    Ok(output.stdout_trimmed().to_string())
}

fn missing(what: &str) -> anyhow::Error {
    DeployError::Configuration(what.to_string()).into()
}
