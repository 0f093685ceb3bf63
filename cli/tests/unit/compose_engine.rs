//! Compose engine: validation gate, step order and the single rollback.

#![allow(clippy::expect_used)]

use std::time::Duration;

use rigger_cli::application::services::compose::{ComposeOptions, deploy_compose};
use rigger_cli::domain::DeployError;
use rigger_cli::domain::config::{ComposeOptions as ComposeSwitches, DeploymentRequest};

use crate::helpers::{RecordingReporter, ScriptedShell, fail, ok};

const PS_HEALTHY: &str = "NAME IMAGE COMMAND SERVICE CREATED STATUS PORTS\n\
app-web-1 nginx:1 \"nginx\" web 3s Up 2 seconds 80/tcp\n";

const PS_EXITED: &str = "NAME IMAGE COMMAND SERVICE CREATED STATUS PORTS\n\
app-web-1 nginx:1 \"nginx\" web 3s Exited (1) 1 second ago\n";

fn request(rollback: bool, pull: bool) -> DeploymentRequest {
    DeploymentRequest {
        project_path: "/srv/app".into(),
        deploy_file: "docker-compose.yml".into(),
        rollback_enabled: rollback,
        compose: ComposeSwitches {
            pull,
            ..ComposeSwitches::default()
        },
        ..DeploymentRequest::default()
    }
}

async fn deploy(shell: &ScriptedShell, req: &DeploymentRequest) -> anyhow::Result<()> {
    let reporter = RecordingReporter::default();
    deploy_compose(
        shell,
        &reporter,
        ComposeOptions {
            request: req,
            compose_cli: "docker compose",
            settle_delay: Duration::ZERO,
        },
    )
    .await
}

fn code(result: &anyhow::Result<()>) -> &'static str {
    result
        .as_ref()
        .err()
        .and_then(|e| e.downcast_ref::<DeployError>())
        .map_or("OK", DeployError::code)
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_compose_runs_validate_pull_down_up_verify_in_order() {
    let shell = ScriptedShell::new().on(" ps -a", ok(PS_HEALTHY));
    let result = deploy(&shell, &request(true, true)).await;
    assert!(result.is_ok(), "{result:?}");

    let base = "docker compose -f /srv/app/docker-compose.yml";
    assert_eq!(
        shell.commands(),
        vec![
            format!("{base} config"),
            format!("{base} pull"),
            format!("{base} down"),
            format!("{base} up -d"),
            format!("{base} ps -a"),
        ]
    );
}

#[tokio::test]
async fn test_compose_without_pull_skips_pull() {
    let shell = ScriptedShell::new().on(" ps -a", ok(PS_HEALTHY));
    deploy(&shell, &request(false, false))
        .await
        .expect("deploy succeeds");
    assert_eq!(shell.count(" pull"), 0);
    assert_eq!(shell.count(" down"), 1);
    assert_eq!(shell.count(" up -d"), 1);
}

#[tokio::test]
async fn test_compose_starts_each_target_service() {
    let shell = ScriptedShell::new().on(" ps -a", ok(PS_HEALTHY));
    let mut req = request(false, false);
    req.compose.build = true;
    req.compose.target_services = vec!["web".into(), "worker".into()];
    deploy(&shell, &req).await.expect("deploy succeeds");

    let ups: Vec<_> = shell
        .commands()
        .into_iter()
        .filter(|c| c.contains(" up "))
        .collect();
    assert_eq!(ups.len(), 2);
    assert!(ups[0].ends_with("up -d --build web"));
    assert!(ups[1].ends_with("up -d --build worker"));
}

// ── Validation gate ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_invalid_compose_file_stops_before_any_mutation() {
    let shell = ScriptedShell::new().on(" config", fail(15, "services.web.image must be a string"));
    let result = deploy(&shell, &request(true, true)).await;

    assert_eq!(code(&result), "VALIDATION");
    assert_eq!(shell.count(" down"), 0);
    assert_eq!(shell.count(" up "), 0);
    assert_eq!(shell.count("ls -1d"), 0);
}

// ── Failure and rollback ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_unhealthy_without_rollback_is_deployment_failure() {
    let shell = ScriptedShell::new().on(" ps -a", ok(PS_EXITED));
    let result = deploy(&shell, &request(false, false)).await;

    assert_eq!(code(&result), "DEPLOYMENT_FAILED");
    assert_eq!(shell.count("ls -1d"), 0);
    assert_eq!(shell.count(" up -d"), 1);
}

#[tokio::test]
async fn test_rollback_restores_and_redeploys_once() {
    let shell = ScriptedShell::new()
        .on(" ps -a", ok(PS_EXITED))
        .on(" ps -a", ok(PS_HEALTHY))
        .on("ls -1d", ok("/srv/app/.backup_20260101_000000_000\n"));
    let result = deploy(&shell, &request(true, true)).await;

    assert_eq!(code(&result), "ROLLED_BACK");
    assert_eq!(shell.count(" config"), 1, "validation is not repeated");
    assert_eq!(shell.count(" pull"), 2);
    assert_eq!(shell.count(" down"), 2);
    assert_eq!(shell.count(" up -d"), 2);
    assert_eq!(
        shell.count("cp -Rp /srv/app/.backup_20260101_000000_000/. /srv/app/"),
        1
    );
}

#[tokio::test]
async fn test_failed_redeploy_is_rollback_failure() {
    let shell = ScriptedShell::new()
        .on(" ps -a", ok(PS_EXITED))
        .on("ls -1d", ok("/srv/app/.backup_20260101_000000_000\n"));
    let result = deploy(&shell, &request(true, false)).await;

    assert_eq!(code(&result), "ROLLBACK_FAILED");
    assert_eq!(shell.count(" up -d"), 2, "rollback fires at most once");
}

#[tokio::test]
async fn test_failed_down_during_redeploy_is_rollback_failure() {
    let shell = ScriptedShell::new()
        .on(" ps -a", ok(PS_EXITED))
        .on(" down", ok(""))
        .on(" down", fail(1, "network app_default has active endpoints"))
        .on("ls -1d", ok("/srv/app/.backup_20260101_000000_000\n"));
    let result = deploy(&shell, &request(true, false)).await;

    assert_eq!(code(&result), "ROLLBACK_FAILED");
    assert_eq!(shell.count(" down"), 2);
    assert_eq!(shell.count(" up -d"), 1, "redeploy stops at down");
}

#[tokio::test]
async fn test_failed_pull_during_redeploy_is_rollback_failure() {
    let shell = ScriptedShell::new()
        .on(" ps -a", ok(PS_EXITED))
        .on(" pull", ok(""))
        .on(" pull", fail(1, "manifest unknown"))
        .on("ls -1d", ok("/srv/app/.backup_20260101_000000_000\n"));
    let result = deploy(&shell, &request(true, true)).await;

    assert_eq!(code(&result), "ROLLBACK_FAILED");
    assert!(result.expect_err("rollback failed").to_string().contains("pull failed"));
    assert_eq!(shell.count(" pull"), 2);
    assert_eq!(shell.count(" down"), 1);
}

#[tokio::test]
async fn test_failed_pull_on_first_attempt_is_deployment_failure() {
    let shell = ScriptedShell::new().on(" pull", fail(1, "manifest unknown"));
    let result = deploy(&shell, &request(true, true)).await;

    assert_eq!(code(&result), "DEPLOYMENT_FAILED");
    assert_eq!(shell.count(" down"), 0);
    assert_eq!(shell.count("ls -1d"), 0);
}

#[tokio::test]
async fn test_failed_up_triggers_rollback() {
    let shell = ScriptedShell::new()
        .on(" up -d", fail(1, "port is already allocated"))
        .on(" up -d", ok(""))
        .on(" ps -a", ok(PS_HEALTHY))
        .on("ls -1d", ok("/srv/app/.backup_1\n"));
    let result = deploy(&shell, &request(true, false)).await;

    assert_eq!(code(&result), "ROLLED_BACK");
    let err = result.expect_err("rolled back");
    assert!(err.to_string().contains("port is already allocated"));
}

#[tokio::test]
async fn test_missing_backup_is_rollback_failure() {
    let shell = ScriptedShell::new().on(" ps -a", ok(PS_EXITED));
    let result = deploy(&shell, &request(true, false)).await;

    assert_eq!(code(&result), "ROLLBACK_FAILED");
    assert_eq!(shell.count(" up -d"), 1);
}

#[tokio::test]
async fn test_failed_down_is_deployment_failure_without_rollback() {
    let shell = ScriptedShell::new().on(" down", fail(1, "permission denied"));
    let result = deploy(&shell, &request(true, false)).await;

    assert_eq!(code(&result), "DEPLOYMENT_FAILED");
    assert_eq!(shell.count("ls -1d"), 0);
}
