//! `rigger deploy`: the full pipeline against one host.

use anyhow::Result;

use crate::application::services::deploy;
use crate::cli::DeployArgs;
use crate::infra::fs::{FsDeployFileLoader, LocalFileSystem};
use crate::output::{OutputContext, TerminalReporter, json as json_out};

/// Run `rigger deploy`.
///
/// Everything that can be checked locally is checked before connecting.
/// The connection is closed whatever the outcome.
///
/// # Errors
///
/// Returns the first fatal error, typed as a
/// [`crate::domain::DeployError`] where one applies.
pub async fn run(ctx: &OutputContext, args: &DeployArgs) -> Result<()> {
    let reporter = TerminalReporter::new(ctx, args.deployment.verbose);
    let request = args.deployment.to_request()?;
    let params = args.connection.to_params()?;
    let host = params.host.clone();

    ctx.summary(
        &format!("Deploying to {host}"),
        &[
            ("mode", request.mode.to_string().as_str()),
            ("project", request.project_path.as_str()),
            ("deploy file", request.deploy_file.as_str()),
            ("stack", request.stack_name.as_deref().unwrap_or_default()),
            ("rollback", if request.rollback_enabled { "enabled" } else { "" }),
        ],
    );

    let files = LocalFileSystem::default();
    let deployment = deploy::preflight(&FsDeployFileLoader, &files, &reporter, request)?;

    let conn = super::connect(ctx, params).await?;
    let outcome = deploy::run(&conn, &conn, &files, &reporter, &deployment).await;
    conn.close();
    outcome?;

    if ctx.json {
        let uploaded: Vec<String> = deployment
            .uploads
            .iter()
            .map(|u| u.destination.clone())
            .collect();
        println!("{}", json_out::format_deployed(&deployment.request, &host, &uploaded)?);
    } else {
        println!();
        ctx.success("Deployment complete");
    }
    Ok(())
}
