//! Single-file push using the sink side of the `scp` protocol.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ssh2::Session;

use crate::application::ports::{FileTransfer, RemoteShell};
use crate::domain::error::DeployError;
use crate::domain::remote::{remote_basename, remote_dirname, shell_quote};
use crate::infra::ssh::connect::SshConnection;

const DEFAULT_MODE: u32 = 0o644;

/// The `C` record announcing one file: mode, size and name.
#[must_use]
pub fn scp_header(mode: u32, size: u64, name: &str) -> String {
    format!("C{:04o} {size} {name}\n", mode & 0o7777)
}

/// Write header, body and the terminating NUL.
///
/// # Errors
///
/// Returns any write error from `out`.
pub fn write_payload(out: &mut impl Write, mode: u32, name: &str, body: &[u8]) -> std::io::Result<()> {
    out.write_all(scp_header(mode, body.len() as u64, name).as_bytes())?;
    out.write_all(body)?;
    out.write_all(&[0])?;
    out.flush()
}

#[cfg(unix)]
fn file_mode(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
fn file_mode(_meta: &std::fs::Metadata) -> u32 {
    DEFAULT_MODE
}

fn send(session: &Session, local: &Path, remote: &str) -> Result<(), DeployError> {
    let io_err = |what: &str, e: std::io::Error| {
        DeployError::Transport(format!("{what} '{}': {e}", local.display()))
    };
    let body = std::fs::read(local).map_err(|e| io_err("cannot read", e))?;
    let mode = std::fs::metadata(local)
        .map(|m| file_mode(&m))
        .unwrap_or(DEFAULT_MODE);

    let ssh_err = |what: &str, e: ssh2::Error| {
        DeployError::Transport(format!("{what} while uploading '{}': {e}", local.display()))
    };
    let mut channel = session
        .channel_session()
        .map_err(|e| ssh_err("failed to open channel", e))?;
    channel
        .exec(&format!("scp -t {}", shell_quote(remote_dirname(remote))))
        .map_err(|e| ssh_err("failed to start scp", e))?;
    write_payload(&mut channel, mode, remote_basename(remote), &body)
        .map_err(|e| io_err("failed to send", e))?;
    channel.send_eof().map_err(|e| ssh_err("failed to send EOF", e))?;
    channel.wait_eof().map_err(|e| ssh_err("failed waiting for EOF", e))?;
    channel.wait_close().map_err(|e| ssh_err("failed to close channel", e))?;

    match channel.exit_status() {
        Ok(0) => Ok(()),
        Ok(code) => Err(DeployError::Transport(format!(
            "scp exited with status {code} while uploading '{}'",
            local.display()
        ))),
        Err(e) => Err(ssh_err("failed to read scp status", e)),
    }
}

impl FileTransfer for SshConnection {
    async fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        let dir = remote_dirname(remote);
        self.run_buffered(&format!("mkdir -p {}", shell_quote(dir)))
            .await?
            .into_result()
            .with_context(|| format!("failed to create remote directory {dir}"))?;

        let session = self.session()?;
        let local: PathBuf = local.to_path_buf();
        let remote = remote.to_string();
        tokio::task::spawn_blocking(move || send(&session, &local, &remote))
            .await
            .context("upload task panicked")??;
        Ok(())
    }
}
