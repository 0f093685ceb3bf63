//! Top-level deployment pipeline.
//!
//! [`preflight`] does everything that can fail without a connection.
//! [`run`] then drives the remote side in a fixed order: project path,
//! backup, upload, verify, requirements, network, registry, engine, prune,
//! cleanup.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;

use crate::application::ports::{
    DeployFileLoader, FileTransfer, LocalFiles, ProgressReporter, RemoteShell,
};
use crate::application::services::compose::{self, ComposeOptions, SETTLE_DELAY};
use crate::application::services::{
    backup, network, prune, registry, requirements, stack, upload,
};
use crate::domain::config::{DeployMode, DeploymentRequest};
use crate::domain::error::DeployError;
use crate::domain::upload::UploadItem;

/// A request that passed every local check, with its upload plan.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub request: DeploymentRequest,
    pub uploads: Vec<UploadItem>,
    /// Pause before the compose status check.
    pub settle_delay: Duration,
}

/// Validate the request, the stack file (stack mode) and the upload plan.
///
/// # Errors
///
/// Returns the first configuration, validation or planning error.
pub fn preflight(
    loader: &impl DeployFileLoader,
    files: &impl LocalFiles,
    reporter: &impl ProgressReporter,
    request: DeploymentRequest,
) -> Result<Deployment> {
    request.validate()?;
    if request.mode == DeployMode::Stack {
        stack::validate_stack_file(loader, reporter, Path::new(&request.deploy_file))?;
    }
    let uploads = upload::prepare(files, reporter, &request)?;
    Ok(Deployment {
        request,
        uploads,
        settle_delay: SETTLE_DELAY,
    })
}

/// Run the remote half of a deployment.
///
/// Backups are removed after a successful compose deployment and after a
/// completed rollback; a failed rollback leaves them for inspection. Prune
/// only runs after success.
///
/// # Errors
///
/// Returns the first fatal error. Engine failures are [`DeployError`]s.
pub async fn run(
    shell: &impl RemoteShell,
    transfer: &impl FileTransfer,
    files: &impl LocalFiles,
    reporter: &impl ProgressReporter,
    deployment: &Deployment,
) -> Result<()> {
    let request = &deployment.request;

    upload::ensure_project_path(shell, reporter, &request.project_path).await?;
    backup::backup(shell, reporter, request, Utc::now()).await?;
    upload::upload_all(transfer, files, reporter, request, &deployment.uploads).await?;
    upload::verify(shell, reporter, &deployment.uploads).await?;
    let compose_cli = requirements::check(shell, reporter, request.mode).await?;
    network::ensure_network(shell, reporter, request).await?;
    registry::login(shell, reporter, &request.registry).await?;

    let outcome = match request.mode {
        DeployMode::Compose => {
            let opts = ComposeOptions {
                request,
                compose_cli: &compose_cli,
                settle_delay: deployment.settle_delay,
            };
            compose::deploy_compose(shell, reporter, opts).await
        }
        DeployMode::Stack => stack::deploy_stack(shell, reporter, request).await,
    };

    if outcome.is_ok() {
        prune::prune(shell, reporter, request.prune).await?;
    }
    // A failed rollback leaves its snapshots in place for inspection.
    if backup::applies_to(request) && keeps_no_backup(&outcome) {
        backup::cleanup(shell, reporter, &request.project_path).await;
    }
    outcome
}

fn keeps_no_backup(outcome: &Result<()>) -> bool {
    match outcome {
        Ok(()) => true,
        Err(e) => matches!(
            e.downcast_ref::<DeployError>(),
            Some(DeployError::RolledBack { .. })
        ),
    }
}
