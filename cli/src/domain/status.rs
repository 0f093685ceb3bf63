//! Health parsing for `docker compose ps` and `docker service ls` output.

/// One container row from `docker compose ps`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStatus {
    /// The raw row, kept for operator output.
    pub line: String,
    pub name: String,
    /// Lower-cased status text (columns five onward).
    pub status: String,
}

impl ContainerStatus {
    /// Exited, dead or restart-looping containers count as failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        ["exit", "dead", "restarting"]
            .iter()
            .any(|needle| self.status.contains(needle))
    }
}

/// Outcome of a compose health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeHealth {
    Healthy { containers: usize },
    /// The project has no containers at all.
    Empty,
    Failed(Vec<ContainerStatus>),
}

/// Parse tabular `ps` output. The first line is the header.
///
/// Rows with fewer than five whitespace-separated fields are ignored.
#[must_use]
pub fn parse_compose_ps(output: &str) -> Vec<ContainerStatus> {
    output
        .trim()
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 5 {
                return None;
            }
            Some(ContainerStatus {
                line: line.to_string(),
                name: fields[0].to_string(),
                status: fields[4..].join(" ").to_lowercase(),
            })
        })
        .collect()
}

#[must_use]
pub fn compose_health(output: &str) -> ComposeHealth {
    if output.trim().lines().count() <= 1 {
        return ComposeHealth::Empty;
    }
    let containers = parse_compose_ps(output);
    let failed: Vec<ContainerStatus> = containers.iter().filter(|c| c.is_failed()).cloned().collect();
    if failed.is_empty() {
        ComposeHealth::Healthy {
            containers: containers.len(),
        }
    } else {
        ComposeHealth::Failed(failed)
    }
}

// ── Stack services ───────────────────────────────────────────────────────────

/// Format string handed to `docker service ls --format`.
pub const SERVICE_LS_FORMAT: &str = "{{.Name}}\\t{{.Replicas}}\\t{{.Image}}";

/// One service row from `docker service ls`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    pub name: String,
    pub running: u32,
    pub desired: u32,
    pub image: String,
}

impl ServiceStatus {
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.running == self.desired
    }

    #[must_use]
    pub fn replicas(&self) -> String {
        format!("{}/{}", self.running, self.desired)
    }
}

/// Parse `NAME<TAB>REPLICAS<TAB>IMAGE` rows.
///
/// Replica columns such as `1/1 (max 1 per node)` use their first token.
/// Rows without a `running/desired` pair are skipped.
#[must_use]
pub fn parse_service_ls(output: &str) -> Vec<ServiceStatus> {
    output
        .lines()
        .filter_map(|line| {
            let mut cols = line.split('\t').map(str::trim);
            let name = cols.next().filter(|n| !n.is_empty())?;
            let replicas = cols.next()?.split_whitespace().next()?;
            let image = cols.next().unwrap_or_default();
            let (running, desired) = replicas.split_once('/')?;
            Some(ServiceStatus {
                name: name.to_string(),
                running: running.parse().ok()?,
                desired: desired.parse().ok()?,
                image: image.to_string(),
            })
        })
        .collect()
}

/// Services whose running count differs from the desired count.
#[must_use]
pub fn unconverged(services: &[ServiceStatus]) -> Vec<&ServiceStatus> {
    services.iter().filter(|s| !s.is_converged()).collect()
}
