//! Command implementations

pub mod check;
pub mod deploy;
pub mod validate;
pub mod version;

use anyhow::Result;

use crate::domain::ssh::HostTrust;
use crate::infra::ssh::{ConnectParams, SshConnection};
use crate::output::{OutputContext, progress};

/// Open the SSH connection, with a spinner on interactive terminals.
///
/// Warns loudly when host key verification is disabled.
///
/// # Errors
///
/// Returns the classified connection error.
pub async fn connect(ctx: &OutputContext, params: ConnectParams) -> Result<SshConnection> {
    if params.trust == HostTrust::Disabled {
        ctx.alert("Host key verification is DISABLED: any host key will be accepted");
        ctx.alert("Set SSH_KNOWN_HOSTS or SSH_FINGERPRINT to verify the server");
    }
    let target = format!("{}@{}:{}", params.user, params.host, params.port);
    let trust = params.trust.describe();

    let spinner = ctx
        .show_progress()
        .then(|| progress::spinner(&format!("Connecting to {target}...")));
    let result = SshConnection::open(params).await;
    match (&spinner, &result) {
        (Some(pb), Ok(_)) => {
            progress::finish_ok(pb, &format!("Connected to {target} (host key: {trust})"));
        }
        (Some(pb), Err(_)) => progress::finish_failed(pb),
        (None, Ok(_)) => ctx.success(&format!("Connected to {target} (host key: {trust})")),
        (None, Err(_)) => {}
    }
    result
}
