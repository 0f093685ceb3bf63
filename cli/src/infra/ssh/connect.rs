//! Establishing the single SSH connection a deployment runs over.

use std::fmt;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use ssh2::{CheckResult, KnownHostFileKind, Session};

use crate::domain::error::{ConnectionError, DeployError};
use crate::domain::ssh::{HostTrust, resolve_passphrase, verify_fingerprint};

/// Everything needed to reach and authenticate against one host.
#[derive(Clone)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Private key material (PEM or OpenSSH format), not a path.
    pub private_key: String,
    pub passphrase: Option<String>,
    pub trust: HostTrust,
    pub timeout: Duration,
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("private_key", &"***")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "***"))
            .field("trust", &self.trust.describe())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// An authenticated, host-verified SSH connection.
///
/// Each command or transfer opens its own channel on the shared session.
/// The connection is closed exactly once, by [`SshConnection::close`] or on
/// drop, whichever comes first.
pub struct SshConnection {
    session: Session,
    closed: AtomicBool,
}

impl SshConnection {
    /// Dial, verify the host key and authenticate.
    ///
    /// The blocking libssh2 work runs on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns a [`DeployError::Connection`] classified as auth, host
    /// verification or network failure.
    pub async fn open(params: ConnectParams) -> Result<Self> {
        let session = tokio::task::spawn_blocking(move || establish(&params))
            .await
            .context("SSH connect task panicked")??;
        Ok(Self {
            session,
            closed: AtomicBool::new(false),
        })
    }

    /// The live session, or a transport error once closed.
    pub(crate) fn session(&self) -> Result<Session, DeployError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DeployError::Transport("SSH connection already closed".into()));
        }
        Ok(self.session.clone())
    }

    /// Disconnect. Later calls are no-ops.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.session.disconnect(None, "deployment finished", None);
        }
    }
}

impl Drop for SshConnection {
    fn drop(&mut self) {
        self.close();
    }
}

fn establish(params: &ConnectParams) -> Result<Session, DeployError> {
    let passphrase = resolve_passphrase(&params.private_key, params.passphrase.as_deref())?;

    let tcp = dial(&params.host, params.port, params.timeout)?;
    let mut session =
        Session::new().map_err(|e| network(format!("failed to create SSH session: {e}")))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(timeout_millis(params.timeout));
    session
        .handshake()
        .map_err(|e| network(format!("SSH handshake with {} failed: {e}", params.host)))?;

    verify_host(&session, params)?;

    session
        .userauth_pubkey_memory(&params.user, None, &params.private_key, passphrase)
        .map_err(|e| auth(format!("public key rejected for user '{}': {e}", params.user)))?;
    if !session.authenticated() {
        return Err(auth(format!("server did not accept user '{}'", params.user)));
    }

    // Only connection establishment is bounded.
    session.set_timeout(0);
    Ok(session)
}

fn dial(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, DeployError> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| network(format!("cannot resolve {host}:{port}: {e}")))?
        .collect();
    let mut last_err = None;
    for addr in &addrs {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(tcp) => return Ok(tcp),
            Err(e) => last_err = Some(e),
        }
    }
    Err(match last_err {
        Some(e) => network(format!("cannot connect to {host}:{port}: {e}")),
        None => network(format!("no addresses found for {host}:{port}")),
    })
}

fn verify_host(session: &Session, params: &ConnectParams) -> Result<(), DeployError> {
    let (key, _) = session
        .host_key()
        .ok_or_else(|| host_verification("server presented no host key".into()))?;

    match &params.trust {
        HostTrust::KnownHosts(data) => {
            let mut known = session
                .known_hosts()
                .map_err(|e| host_verification(format!("cannot initialise known_hosts: {e}")))?;
            known
                .read_str(data, KnownHostFileKind::OpenSSH)
                .map_err(|e| host_verification(format!("invalid known_hosts data: {e}")))?;
            match known.check_port(&params.host, params.port, key) {
                CheckResult::Match => Ok(()),
                CheckResult::NotFound => Err(host_verification(format!(
                    "no known_hosts entry for {}:{}",
                    params.host, params.port
                ))),
                CheckResult::Mismatch => Err(host_verification(format!(
                    "host key for {} does not match known_hosts",
                    params.host
                ))),
                CheckResult::Failure => Err(host_verification(
                    "known_hosts check failed".to_string(),
                )),
            }
        }
        HostTrust::Fingerprint(expected) => Ok(verify_fingerprint(key, expected)?),
        HostTrust::Disabled => Ok(()),
    }
}

fn timeout_millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

fn network(msg: String) -> DeployError {
    ConnectionError::Network(msg).into()
}

fn auth(msg: String) -> DeployError {
    ConnectionError::Auth(msg).into()
}

fn host_verification(msg: String) -> DeployError {
    ConnectionError::HostVerification(msg).into()
}
