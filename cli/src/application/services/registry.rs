//! Registry login on the target host.

use anyhow::{Context, Result};

use crate::application::ports::{ProgressReporter, RemoteShell};
use crate::domain::config::RegistryCredentials;
use crate::domain::remote::shell_quote;

/// Remote login command. The password goes through stdin, never argv.
#[must_use]
pub fn login_command(creds: &RegistryCredentials, password: &str) -> String {
    format!(
        "printf '%s\\n' {} | docker login {} -u {} --password-stdin >/dev/null",
        shell_quote(password),
        shell_quote(&creds.host),
        shell_quote(&creds.user)
    )
}

/// Log in to the registry when all credentials are present.
///
/// The echoed command shows the password masked.
///
/// # Errors
///
/// Returns an error carrying the remote stderr if `docker login` fails.
pub async fn login(
    shell: &impl RemoteShell,
    reporter: &impl ProgressReporter,
    creds: &RegistryCredentials,
) -> Result<()> {
    if !creds.is_complete() {
        return Ok(());
    }
    reporter.step("Docker registry login...");
    reporter.verbose(&format!("Attempting login to registry: {}", creds.host));
    reporter.command(&login_command(creds, &"*".repeat(creds.password.len())));

    let output = shell.run_buffered(&login_command(creds, &creds.password)).await?;
    output
        .into_result()
        .with_context(|| format!("registry login to {} failed", creds.host))?;

    reporter.success(&format!("Logged in to: {}", creds.host));
    Ok(())
}
