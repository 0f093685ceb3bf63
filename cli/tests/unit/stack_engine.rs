//! Stack engine: convergence check and per-service rollback.

use rigger_cli::application::services::stack::deploy_stack;
use rigger_cli::domain::DeployError;
use rigger_cli::domain::config::{DeployMode, DeploymentRequest};

use crate::helpers::{RecordingReporter, ScriptedShell, fail, ok};

const CONVERGED: &str = "app_web\t2/2\tnginx:1\napp_db\t1/1\tpostgres:16\n";
const WEB_SHORT: &str = "app_web\t1/2\tnginx:1\napp_db\t1/1\tpostgres:16\n";

fn request(rollback: bool) -> DeploymentRequest {
    DeploymentRequest {
        mode: DeployMode::Stack,
        project_path: "/srv/app".into(),
        deploy_file: "stack.yml".into(),
        stack_name: Some("app".into()),
        rollback_enabled: rollback,
        ..DeploymentRequest::default()
    }
}

fn code(result: &anyhow::Result<()>) -> &'static str {
    result
        .as_ref()
        .err()
        .and_then(|e| e.downcast_ref::<DeployError>())
        .map_or("OK", DeployError::code)
}

#[tokio::test]
async fn test_converged_stack_succeeds() {
    let shell = ScriptedShell::new().on("docker service ls", ok(CONVERGED));
    let reporter = RecordingReporter::default();
    let result = deploy_stack(&shell, &reporter, &request(true)).await;

    assert!(result.is_ok(), "{result:?}");
    assert!(reporter.contains("All services in stack 'app' are healthy"));
    assert_eq!(shell.count("--rollback"), 0);
}

#[tokio::test]
async fn test_short_replicas_without_rollback_is_fatal() {
    let shell = ScriptedShell::new().on("docker service ls", ok(WEB_SHORT));
    let reporter = RecordingReporter::default();
    let result = deploy_stack(&shell, &reporter, &request(false)).await;

    assert_eq!(code(&result), "DEPLOYMENT_FAILED");
    assert_eq!(shell.count("--rollback"), 0);
    assert!(reporter.contains("app_web: REPLICAS 1/2, IMAGE nginx:1"));
}

#[tokio::test]
async fn test_only_mismatched_services_are_rolled_back() {
    let shell = ScriptedShell::new().on("docker service ls", ok(WEB_SHORT));
    let reporter = RecordingReporter::default();
    let result = deploy_stack(&shell, &reporter, &request(true)).await;

    assert_eq!(code(&result), "ROLLED_BACK");
    let rollbacks: Vec<_> = shell
        .commands()
        .into_iter()
        .filter(|c| c.contains("--rollback"))
        .collect();
    assert_eq!(rollbacks, vec!["docker service update --rollback app_web"]);
}

#[tokio::test]
async fn test_failed_service_rollback_stays_deployment_failure() {
    let shell = ScriptedShell::new()
        .on("docker service ls", ok(WEB_SHORT))
        .on("--rollback", fail(1, "service has no previous spec"));
    let reporter = RecordingReporter::default();
    let result = deploy_stack(&shell, &reporter, &request(true)).await;

    assert_eq!(code(&result), "DEPLOYMENT_FAILED");
    assert!(reporter.contains("Rollback failed for app_web"));
}

#[tokio::test]
async fn test_deploy_error_with_healthy_services_is_still_reported() {
    let shell = ScriptedShell::new()
        .on("docker stack deploy", fail(1, "image digest could not be resolved"))
        .on("docker service ls", ok(CONVERGED));
    let reporter = RecordingReporter::default();
    let result = deploy_stack(&shell, &reporter, &request(true)).await;

    assert_eq!(code(&result), "DEPLOYMENT_FAILED");
    assert_eq!(shell.count("--rollback"), 0);
    let err = result.err().map(|e| e.to_string()).unwrap_or_default();
    assert!(err.contains("healthy despite deployment error"), "got: {err}");
}

#[tokio::test]
async fn test_service_listing_is_scoped_to_the_stack() {
    let shell = ScriptedShell::new().on("docker service ls", ok(CONVERGED));
    let reporter = RecordingReporter::default();
    deploy_stack(&shell, &reporter, &request(false))
        .await
        .unwrap_or_else(|e| panic!("{e:#}"));

    let listing = shell
        .commands()
        .into_iter()
        .find(|c| c.starts_with("docker service ls"))
        .unwrap_or_default();
    assert!(listing.contains("label=com.docker.stack.namespace=app"));
}
