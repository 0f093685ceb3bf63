//! Deployment request types and their validation.
//!
//! Pure functions only. Values arrive here already read from flags and the
//! environment by `crate::cli`; this module decides whether they make sense.

use std::fmt;
use std::str::FromStr;

use crate::domain::error::DeployError;

// ── Constants ────────────────────────────────────────────────────────────────

pub const DEFAULT_DEPLOY_FILE: &str = "docker-compose.yml";
pub const DEFAULT_SSH_PORT: u16 = 22;
pub const ENV_FILE_NAME: &str = ".env";

// ── Mode ─────────────────────────────────────────────────────────────────────

/// Which engine drives the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeployMode {
    /// Single host, `docker compose`.
    #[default]
    Compose,
    /// Swarm cluster, `docker stack deploy`.
    Stack,
}

impl DeployMode {
    /// Network driver used when none is configured.
    #[must_use]
    pub fn default_network_driver(self) -> &'static str {
        match self {
            Self::Compose => "bridge",
            Self::Stack => "overlay",
        }
    }
}

impl FromStr for DeployMode {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compose" => Ok(Self::Compose),
            "stack" => Ok(Self::Stack),
            other => Err(DeployError::Configuration(format!(
                "unsupported mode '{other}' (expected 'compose' or 'stack')"
            ))),
        }
    }
}

impl fmt::Display for DeployMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Compose => "compose",
            Self::Stack => "stack",
        })
    }
}

// ── Prune ────────────────────────────────────────────────────────────────────

/// Post-deploy cleanup scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PruneType {
    #[default]
    None,
    System,
    Volumes,
    Networks,
    Images,
    Containers,
}

impl PruneType {
    /// Remote command for this prune scope, or `None` when pruning is off.
    #[must_use]
    pub fn command(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::System => Some("docker system prune -f"),
            Self::Volumes => Some("docker volume prune -f"),
            Self::Networks => Some("docker network prune -f"),
            Self::Images => Some("docker image prune -f"),
            Self::Containers => Some("docker container prune -f"),
        }
    }
}

impl FromStr for PruneType {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "system" => Ok(Self::System),
            "volumes" => Ok(Self::Volumes),
            "networks" => Ok(Self::Networks),
            "images" => Ok(Self::Images),
            "containers" => Ok(Self::Containers),
            other => Err(DeployError::Configuration(format!(
                "unsupported prune type '{other}' (expected none, system, volumes, networks, images or containers)"
            ))),
        }
    }
}

impl fmt::Display for PruneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::System => "system",
            Self::Volumes => "volumes",
            Self::Networks => "networks",
            Self::Images => "images",
            Self::Containers => "containers",
        })
    }
}

// ── Extra files ──────────────────────────────────────────────────────────────

/// One `EXTRA_FILES` entry: `[flatten ]src[:dst]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraFile {
    /// Local file, directory or glob pattern.
    pub src: String,
    /// Destination relative to the project path. A trailing `/` means "into
    /// this directory".
    pub dst: Option<String>,
    /// Drop the source directory structure and keep only basenames.
    pub flatten: bool,
}

impl FromStr for ExtraFile {
    type Err = DeployError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (flatten, spec) = match line.strip_prefix("flatten ") {
            Some(rest) => (true, rest.trim()),
            None => (false, line),
        };
        let (src, dst) = match spec.split_once(':') {
            Some((src, dst)) => (src.trim(), Some(dst.trim())),
            None => (spec, None),
        };
        if src.is_empty() {
            return Err(DeployError::Configuration(format!(
                "extra file entry '{line}' has no source"
            )));
        }
        Ok(Self {
            src: src.to_string(),
            dst: dst.filter(|d| !d.is_empty()).map(str::to_string),
            flatten,
        })
    }
}

/// Parse a newline-separated `EXTRA_FILES` list, skipping blank lines.
///
/// # Errors
///
/// Returns [`DeployError::Configuration`] for an entry with no source.
pub fn parse_extra_files<I, S>(lines: I) -> Result<Vec<ExtraFile>, DeployError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter(|l| !l.as_ref().trim().is_empty())
        .map(|l| l.as_ref().parse())
        .collect()
}

// ── Request ──────────────────────────────────────────────────────────────────

/// Compose-only switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeOptions {
    pub pull: bool,
    pub build: bool,
    pub no_deps: bool,
    pub target_services: Vec<String>,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            pull: true,
            build: false,
            no_deps: false,
            target_services: Vec::new(),
        }
    }
}

/// Registry credentials. Only used when all three parts are present.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub host: String,
    pub user: String,
    pub password: String,
}

impl RegistryCredentials {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.host.is_empty() && !self.user.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Docker network the deployment should attach to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkSettings {
    pub name: Option<String>,
    pub driver: Option<String>,
    pub attachable: bool,
}

/// Everything the pipeline needs to know about one deployment, minus the
/// connection parameters.
#[derive(Debug, Clone, Default)]
pub struct DeploymentRequest {
    pub mode: DeployMode,
    /// Absolute remote project directory.
    pub project_path: String,
    /// Local path of the compose or stack file.
    pub deploy_file: String,
    pub extra_files: Vec<ExtraFile>,
    /// Raw dotenv content written to `<project>/.env` when non-empty.
    pub env_vars: Option<String>,
    pub rollback_enabled: bool,
    pub compose: ComposeOptions,
    pub stack_name: Option<String>,
    pub registry: RegistryCredentials,
    pub network: NetworkSettings,
    pub prune: PruneType,
}

impl DeploymentRequest {
    /// Basename of the deploy file, as it lands in the project directory.
    #[must_use]
    pub fn deploy_file_name(&self) -> &str {
        self.deploy_file
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.deploy_file)
    }

    /// Remote path of the uploaded deploy file.
    #[must_use]
    pub fn remote_deploy_file(&self) -> String {
        crate::domain::remote::remote_join(&self.project_path, self.deploy_file_name())
    }

    #[must_use]
    pub fn has_env_vars(&self) -> bool {
        self.env_vars.as_deref().is_some_and(|v| !v.trim().is_empty())
    }

    /// Stack name, which [`Self::validate`] guarantees in stack mode.
    #[must_use]
    pub fn stack_name(&self) -> &str {
        self.stack_name.as_deref().unwrap_or_default()
    }

    /// Check cross-field requirements before any network I/O.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Configuration`] naming the first problem.
    pub fn validate(&self) -> Result<(), DeployError> {
        let missing = |what: &str| DeployError::Configuration(format!("{what} is required"));
        if self.project_path.trim().is_empty() {
            return Err(missing("project path"));
        }
        if !self.project_path.starts_with('/') {
            return Err(DeployError::Configuration(format!(
                "project path '{}' must be absolute",
                self.project_path
            )));
        }
        if self.deploy_file.trim().is_empty() {
            return Err(missing("deploy file"));
        }
        if self.mode == DeployMode::Stack
            && self.stack_name.as_deref().is_none_or(|s| s.trim().is_empty())
        {
            return Err(missing("stack name (stack mode)"));
        }
        let partial_registry = [&self.registry.host, &self.registry.user, &self.registry.password]
            .iter()
            .any(|v| !v.is_empty());
        if partial_registry && !self.registry.is_complete() {
            return Err(DeployError::Configuration(
                "registry host, user and password must be set together".to_string(),
            ));
        }
        Ok(())
    }
}
