//! `rigger validate`: local checks and the upload plan, no connection.

use std::path::Path;

use anyhow::Result;

use crate::application::ports::DeployFileLoader;
use crate::application::services::deploy;
use crate::cli::DeploymentArgs;
use crate::domain::config::DeployMode;
use crate::infra::fs::{FsDeployFileLoader, LocalFileSystem};
use crate::output::{OutputContext, TerminalReporter};

/// Run `rigger validate`.
///
/// Stack files get full structural validation. Compose files are only
/// parsed here; `docker compose config` on the target has the final word.
///
/// # Errors
///
/// Returns the first configuration, validation or planning error.
pub fn run(ctx: &OutputContext, args: &DeploymentArgs) -> Result<()> {
    let reporter = TerminalReporter::new(ctx, args.verbose);
    let request = args.to_request()?;
    let files = LocalFileSystem::default();
    let deployment = deploy::preflight(&FsDeployFileLoader, &files, &reporter, request)?;
    if deployment.request.mode == DeployMode::Compose {
        FsDeployFileLoader.load(Path::new(&deployment.request.deploy_file))?;
    }

    if ctx.json {
        let uploads: Vec<_> = deployment
            .uploads
            .iter()
            .map(|u| {
                serde_json::json!({
                    "source": u.source,
                    "destination": u.destination,
                    "note": u.note.to_string(),
                })
            })
            .collect();
        let obj = serde_json::json!({ "valid": true, "uploads": uploads });
        ctx.print_json(&obj)?;
    } else {
        println!();
        ctx.success("Configuration is valid");
    }
    Ok(())
}
