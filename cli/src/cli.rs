//! CLI argument parsing with clap derive
//!
//! Every deployment input can come from a flag or from the environment
//! variable named alongside it.

use anyhow::Result;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};

use crate::commands;
use crate::domain::config::{
    ComposeOptions, DEFAULT_DEPLOY_FILE, DEFAULT_SSH_PORT, DeployMode, DeploymentRequest,
    NetworkSettings, PruneType, RegistryCredentials, parse_extra_files,
};
use crate::domain::error::DeployError;
use crate::domain::ssh::{DEFAULT_CONNECT_TIMEOUT, HostTrust, parse_timeout};
use crate::infra::fs::read_key_file;
use crate::infra::ssh::ConnectParams;
use crate::output::OutputContext;

/// Agentless Compose and Stack deployments over SSH
#[derive(Parser)]
#[command(
    name = "rigger",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Upload files and deploy to the remote host
    Deploy(DeployArgs),

    /// Connect and check the remote host has what the mode needs
    Check(CheckArgs),

    /// Validate inputs and show the upload plan without connecting
    Validate(DeploymentArgs),

    /// Show version
    Version,
}

/// How to reach the target host.
#[derive(Args, Clone)]
pub struct ConnectionArgs {
    /// Remote host name or address
    #[arg(long, env = "SSH_HOST")]
    pub ssh_host: String,

    /// Remote SSH port
    #[arg(long, env = "SSH_PORT", default_value_t = DEFAULT_SSH_PORT)]
    pub ssh_port: u16,

    /// Remote user
    #[arg(long, env = "SSH_USER")]
    pub ssh_user: String,

    /// Private key material
    #[arg(long, env = "SSH_KEY", hide_env_values = true, conflicts_with = "ssh_key_file")]
    pub ssh_key: Option<String>,

    /// Read the private key from this file instead
    #[arg(long, env = "SSH_KEY_FILE")]
    pub ssh_key_file: Option<String>,

    /// Passphrase for an encrypted private key
    #[arg(long, env = "SSH_KEY_PASSPHRASE", hide_env_values = true)]
    pub ssh_key_passphrase: Option<String>,

    /// known_hosts content used to verify the host key
    #[arg(long, env = "SSH_KNOWN_HOSTS", hide_env_values = true)]
    pub ssh_known_hosts: Option<String>,

    /// Expected host key fingerprint (SHA256:...)
    #[arg(long, env = "SSH_FINGERPRINT")]
    pub ssh_fingerprint: Option<String>,

    /// Connection timeout, e.g. 10s, 500ms, 1m30s
    #[arg(long, env = "SSH_TIMEOUT", default_value = DEFAULT_CONNECT_TIMEOUT)]
    pub ssh_timeout: String,
}

impl ConnectionArgs {
    /// Resolve key material, trust mode and timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Configuration`] for a missing key or malformed
    /// timeout. Nothing here touches the network.
    pub fn to_params(&self) -> Result<ConnectParams> {
        let timeout = parse_timeout(&self.ssh_timeout)?;
        let private_key = match (&self.ssh_key, &self.ssh_key_file) {
            (Some(key), _) if !key.trim().is_empty() => key.clone(),
            (_, Some(path)) if !path.trim().is_empty() => read_key_file(path)?,
            _ => {
                return Err(DeployError::Configuration(
                    "an SSH key is required (--ssh-key or --ssh-key-file)".into(),
                )
                .into());
            }
        };
        Ok(ConnectParams {
            host: self.ssh_host.clone(),
            port: self.ssh_port,
            user: self.ssh_user.clone(),
            private_key,
            passphrase: self
                .ssh_key_passphrase
                .clone()
                .filter(|p| !p.is_empty()),
            trust: HostTrust::select(
                self.ssh_known_hosts.as_deref(),
                self.ssh_fingerprint.as_deref(),
            ),
            timeout,
        })
    }
}

/// What to deploy and how.
#[derive(Args, Clone)]
pub struct DeploymentArgs {
    /// Deployment mode: compose or stack
    #[arg(long, env = "MODE", default_value = "compose")]
    pub mode: String,

    /// Absolute project directory on the remote host
    #[arg(long, env = "PROJECT_PATH")]
    pub project_path: String,

    /// Local compose or stack file
    #[arg(long, env = "DEPLOY_FILE", default_value = DEFAULT_DEPLOY_FILE)]
    pub deploy_file: String,

    /// Extra files, one `[flatten ]src[:dst]` entry per line
    #[arg(long, env = "EXTRA_FILES", value_delimiter = '\n')]
    pub extra_files: Vec<String>,

    /// Stack name (stack mode)
    #[arg(long, env = "STACK_NAME")]
    pub stack_name: Option<String>,

    /// Pull images before deploying (compose mode)
    #[arg(long, env = "COMPOSE_PULL", action = ArgAction::Set, value_parser = BoolishValueParser::new(),
          default_value = "true", num_args = 0..=1, default_missing_value = "true")]
    pub compose_pull: bool,

    /// Build images before starting (compose mode)
    #[arg(long, env = "COMPOSE_BUILD", action = ArgAction::Set, value_parser = BoolishValueParser::new(),
          default_value = "false", num_args = 0..=1, default_missing_value = "true")]
    pub compose_build: bool,

    /// Do not start linked services (compose mode)
    #[arg(long, env = "COMPOSE_NO_DEPS", action = ArgAction::Set, value_parser = BoolishValueParser::new(),
          default_value = "false", num_args = 0..=1, default_missing_value = "true")]
    pub compose_no_deps: bool,

    /// Only start these services, one per line (compose mode)
    #[arg(long, env = "COMPOSE_TARGET_SERVICES", value_delimiter = '\n')]
    pub compose_target_services: Vec<String>,

    /// Docker network to ensure before deploying
    #[arg(long, env = "DOCKER_NETWORK")]
    pub docker_network: Option<String>,

    /// Network driver (default: overlay in stack mode, bridge otherwise)
    #[arg(long, env = "DOCKER_NETWORK_DRIVER")]
    pub docker_network_driver: Option<String>,

    /// Create the overlay network as attachable
    #[arg(long, env = "DOCKER_NETWORK_ATTACHABLE", action = ArgAction::Set, value_parser = BoolishValueParser::new(),
          default_value = "false", num_args = 0..=1, default_missing_value = "true")]
    pub docker_network_attachable: bool,

    /// Prune after deploying: none, system, volumes, networks, images, containers
    #[arg(long, env = "DOCKER_PRUNE", default_value = "none")]
    pub docker_prune: String,

    /// Registry to log in to before deploying
    #[arg(long, env = "REGISTRY_HOST")]
    pub registry_host: Option<String>,

    /// Registry user
    #[arg(long, env = "REGISTRY_USER")]
    pub registry_user: Option<String>,

    /// Registry password or token
    #[arg(long, env = "REGISTRY_PASS", hide_env_values = true)]
    pub registry_pass: Option<String>,

    /// Roll back when the deployment fails its health check
    #[arg(long, env = "ENABLE_ROLLBACK", action = ArgAction::Set, value_parser = BoolishValueParser::new(),
          default_value = "false", num_args = 0..=1, default_missing_value = "true")]
    pub enable_rollback: bool,

    /// Dotenv content uploaded as `<project>/.env`
    #[arg(long, env = "ENV_VARS", hide_env_values = true)]
    pub env_vars: Option<String>,

    /// Show remote commands and extra detail
    #[arg(short, long, env = "VERBOSE", action = ArgAction::Set, value_parser = BoolishValueParser::new(),
          default_value = "false", num_args = 0..=1, default_missing_value = "true")]
    pub verbose: bool,
}

impl DeploymentArgs {
    /// Build the domain request. Parsing only; see
    /// [`DeploymentRequest::validate`] for cross-field checks.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Configuration`] for an unknown mode or prune
    /// type, or a malformed extra-file entry.
    pub fn to_request(&self) -> Result<DeploymentRequest, DeployError> {
        let non_blank = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        Ok(DeploymentRequest {
            mode: self.mode.parse()?,
            project_path: self.project_path.trim().to_string(),
            deploy_file: self.deploy_file.trim().to_string(),
            extra_files: parse_extra_files(&self.extra_files)?,
            env_vars: non_blank(&self.env_vars),
            rollback_enabled: self.enable_rollback,
            compose: ComposeOptions {
                pull: self.compose_pull,
                build: self.compose_build,
                no_deps: self.compose_no_deps,
                target_services: self
                    .compose_target_services
                    .iter()
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            },
            stack_name: non_blank(&self.stack_name).map(|s| s.trim().to_string()),
            registry: RegistryCredentials {
                host: non_blank(&self.registry_host).unwrap_or_default(),
                user: non_blank(&self.registry_user).unwrap_or_default(),
                password: self.registry_pass.clone().unwrap_or_default(),
            },
            network: NetworkSettings {
                name: non_blank(&self.docker_network),
                driver: non_blank(&self.docker_network_driver),
                attachable: self.docker_network_attachable,
            },
            prune: self.docker_prune.parse::<PruneType>()?,
        })
    }
}

#[derive(Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub deployment: DeploymentArgs,
}

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Deployment mode to check for: compose or stack
    #[arg(long, env = "MODE", default_value = "compose")]
    pub mode: String,

    /// Show remote commands
    #[arg(short, long, env = "VERBOSE", action = ArgAction::Set, value_parser = BoolishValueParser::new(),
          default_value = "false", num_args = 0..=1, default_missing_value = "true")]
    pub verbose: bool,
}

impl CheckArgs {
    /// # Errors
    ///
    /// Returns [`DeployError::Configuration`] for an unknown mode.
    pub fn mode(&self) -> Result<DeployMode, DeployError> {
        self.mode.parse()
    }
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli {
            no_color,
            quiet,
            json,
            command,
        } = self;
        let ctx = OutputContext::new(no_color, quiet, json);
        match command {
            Command::Version => commands::version::run(json),
            Command::Deploy(args) => commands::deploy::run(&ctx, &args).await,
            Command::Check(args) => commands::check::run(&ctx, &args).await,
            Command::Validate(args) => commands::validate::run(&ctx, &args),
        }
    }
}
