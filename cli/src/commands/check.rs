//! `rigger check`: connectivity and prerequisite check.

use anyhow::Result;

use crate::application::services::requirements;
use crate::cli::CheckArgs;
use crate::output::{OutputContext, TerminalReporter};

/// Run `rigger check`.
///
/// # Errors
///
/// Returns an error if the host cannot be reached or lacks a prerequisite.
pub async fn run(ctx: &OutputContext, args: &CheckArgs) -> Result<()> {
    let mode = args.mode()?;
    let params = args.connection.to_params()?;
    let host = params.host.clone();
    let reporter = TerminalReporter::new(ctx, args.verbose);

    let conn = super::connect(ctx, params).await?;
    let outcome = requirements::check(&conn, &reporter, mode).await;
    conn.close();
    let compose_cli = outcome?;

    if ctx.json {
        let obj = serde_json::json!({
            "host": host,
            "mode": mode.to_string(),
            "compose_cli": compose_cli,
            "ready": true,
        });
        ctx.print_json(&obj)?;
    } else {
        ctx.success(&format!("{host} is ready for {mode} deployments"));
    }
    Ok(())
}
