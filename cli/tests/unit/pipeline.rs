//! End-to-end pipeline ordering with every remote step scripted.

#![allow(clippy::expect_used)]

use rigger_cli::application::services::deploy::{Deployment, preflight, run};
use rigger_cli::domain::DeployError;
use rigger_cli::domain::config::{DeployMode, DeploymentRequest, ExtraFile, PruneType};
use rigger_cli::domain::upload::{ExpandedExtra, SourceMatch};

use crate::helpers::{
    CannedFiles, InlineLoader, RecordingReporter, RecordingTransfer, ScriptedShell, fail, ok,
};

const PS_HEALTHY: &str = "NAME IMAGE COMMAND SERVICE CREATED STATUS PORTS\n\
app-web-1 nginx:1 \"nginx\" web 3s Up 2 seconds 80/tcp\n";

const PS_EXITED: &str = "NAME IMAGE COMMAND SERVICE CREATED STATUS PORTS\n\
app-web-1 nginx:1 \"nginx\" web 3s Exited (1) 1 second ago\n";

const VALID_STACK: &str = "services:\n  web:\n    image: nginx:1\n";
const BUILD_STACK: &str = "services:\n  web:\n    build: .\n";

fn compose_request() -> DeploymentRequest {
    DeploymentRequest {
        project_path: "/srv/app".into(),
        deploy_file: "docker-compose.yml".into(),
        rollback_enabled: true,
        env_vars: Some("TAG=1".into()),
        prune: PruneType::Images,
        ..DeploymentRequest::default()
    }
}

fn healthy_target() -> ScriptedShell {
    ScriptedShell::new()
        .on("chmod 750", ok("EXISTS\n"))
        .on("stat ", ok("OK\n"))
        .on("command -v docker >", ok("OK\n"))
        .on("docker compose version", ok("docker compose\n"))
        .on(" ps -a", ok(PS_HEALTHY))
}

fn prepared(request: DeploymentRequest) -> Deployment {
    let reporter = RecordingReporter::default();
    let mut deployment = preflight(&InlineLoader(VALID_STACK), &CannedFiles::default(), &reporter, request)
        .expect("preflight passes");
    deployment.settle_delay = std::time::Duration::ZERO;
    deployment
}

// ── Preflight ────────────────────────────────────────────────────────────────

#[test]
fn test_flatten_conflict_is_reported_before_connecting() {
    let files = CannedFiles {
        expanded: vec![ExpandedExtra {
            entry: ExtraFile {
                src: "conf/*/app.conf".into(),
                dst: None,
                flatten: true,
            },
            matches: vec![
                SourceMatch::File("conf/a/app.conf".into()),
                SourceMatch::File("conf/b/app.conf".into()),
            ],
        }],
    };
    let reporter = RecordingReporter::default();
    let err = preflight(&InlineLoader(VALID_STACK), &files, &reporter, compose_request())
        .expect_err("conflict");
    assert!(err.to_string().contains("Flattening conflict"), "got: {err}");
}

#[test]
fn test_invalid_stack_file_fails_preflight() {
    let request = DeploymentRequest {
        mode: DeployMode::Stack,
        stack_name: Some("app".into()),
        deploy_file: "stack.yml".into(),
        ..compose_request()
    };
    let reporter = RecordingReporter::default();
    let err = preflight(&InlineLoader(BUILD_STACK), &CannedFiles::default(), &reporter, request)
        .expect_err("build is rejected");
    let code = err.downcast_ref::<DeployError>().map(DeployError::code);
    assert_eq!(code, Some("VALIDATION"));
}

#[test]
fn test_preflight_plans_deploy_file_and_env() {
    let deployment = prepared(compose_request());
    let destinations: Vec<_> = deployment
        .uploads
        .iter()
        .map(|u| u.destination.as_str())
        .collect();
    assert_eq!(destinations, vec!["/srv/app/.env", "/srv/app/docker-compose.yml"]);
}

// ── Remote pipeline ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_remote_steps_run_in_order() {
    let deployment = prepared(compose_request());
    let shell = healthy_target();
    let transfer = RecordingTransfer::default();
    let reporter = RecordingReporter::default();

    run(&shell, &transfer, &CannedFiles::default(), &reporter, &deployment)
        .await
        .expect("deployment succeeds");

    let order = [
        "chmod 750",
        "test -f /srv/app/docker-compose.yml",
        "stat ",
        "command -v docker >",
        "docker compose version",
        " up -d",
        "docker image prune -f",
        "rm -rf",
    ];
    let positions: Vec<_> = order
        .iter()
        .map(|needle| shell.position(needle).unwrap_or_else(|| panic!("missing {needle}")))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", shell.commands());
    assert_eq!(transfer.uploads.borrow().len(), 2);
}

#[tokio::test]
async fn test_first_deployment_skips_backup() {
    let deployment = prepared(compose_request());
    let shell = healthy_target().on("test -f", fail(1, ""));
    let reporter = RecordingReporter::default();

    run(&shell, &RecordingTransfer::default(), &CannedFiles::default(), &reporter, &deployment)
        .await
        .expect("deployment succeeds");

    assert_eq!(shell.count("-mindepth 1"), 0);
    assert!(reporter.contains("skipping backup"));
}

#[tokio::test]
async fn test_failed_deployment_does_not_prune() {
    let deployment = prepared(DeploymentRequest {
        rollback_enabled: false,
        ..compose_request()
    });
    let shell = healthy_target().on(" up -d", fail(1, "no such image"));
    let reporter = RecordingReporter::default();

    let err = run(&shell, &RecordingTransfer::default(), &CannedFiles::default(), &reporter, &deployment)
        .await
        .expect_err("up fails");

    assert_eq!(
        err.downcast_ref::<DeployError>().map(DeployError::code),
        Some("DEPLOYMENT_FAILED")
    );
    assert_eq!(shell.count("prune"), 0);
}

#[tokio::test]
async fn test_completed_rollback_removes_snapshots() {
    let deployment = prepared(compose_request());
    let shell = healthy_target()
        .set(" ps -a", ok(PS_EXITED))
        .on(" ps -a", ok(PS_HEALTHY))
        .on("ls -1d", ok("/srv/app/.backup_20260101_000000_000\n"));
    let reporter = RecordingReporter::default();

    let err = run(&shell, &RecordingTransfer::default(), &CannedFiles::default(), &reporter, &deployment)
        .await
        .expect_err("rolled back");

    assert_eq!(
        err.downcast_ref::<DeployError>().map(DeployError::code),
        Some("ROLLED_BACK")
    );
    assert_eq!(shell.count("rm -rf"), 1);
    assert_eq!(shell.count("prune"), 0);
}

#[tokio::test]
async fn test_failed_rollback_keeps_snapshots() {
    let deployment = prepared(compose_request());
    let shell = healthy_target()
        .set(" ps -a", ok(PS_EXITED))
        .on("ls -1d", ok("/srv/app/.backup_20260101_000000_000\n"));
    let reporter = RecordingReporter::default();

    let err = run(&shell, &RecordingTransfer::default(), &CannedFiles::default(), &reporter, &deployment)
        .await
        .expect_err("rollback fails");

    assert_eq!(
        err.downcast_ref::<DeployError>().map(DeployError::code),
        Some("ROLLBACK_FAILED")
    );
    assert_eq!(shell.count("cp -Rp /srv/app/.backup_20260101_000000_000/. /srv/app/"), 1);
    assert_eq!(shell.count("rm -rf"), 0);
}

#[tokio::test]
async fn test_missing_compose_is_a_configuration_error() {
    let deployment = prepared(compose_request());
    let shell = healthy_target().set("docker compose version", ok("MISSING\n"));
    let reporter = RecordingReporter::default();

    let err = run(&shell, &RecordingTransfer::default(), &CannedFiles::default(), &reporter, &deployment)
        .await
        .expect_err("compose missing");

    assert_eq!(
        err.downcast_ref::<DeployError>().map(DeployError::code),
        Some("CONFIGURATION")
    );
    assert_eq!(shell.count(" up -d"), 0);
}

#[tokio::test]
async fn test_missing_upload_aborts_before_deploying() {
    let deployment = prepared(compose_request());
    let shell = healthy_target().set("stat ", ok("MISSING\n"));
    let reporter = RecordingReporter::default();

    let err = run(&shell, &RecordingTransfer::default(), &CannedFiles::default(), &reporter, &deployment)
        .await
        .expect_err("verification fails");

    assert!(err.to_string().contains("file missing after upload"), "got: {err}");
    assert_eq!(shell.count("docker compose -f"), 0);
}
