//! Compose/stack file model and local structural validation.
//!
//! Loose YAML shapes (a field that may be a string or a list, a list or a
//! map, a bool or a map) decode into tagged enums. A shape the file format
//! does not allow lands in an `Other` variant and is reported as an issue by
//! [`validate`] instead of failing the parse.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::domain::error::DeployError;

// ── Shaped fields ────────────────────────────────────────────────────────────

/// `command:` or `entrypoint:`, as a shell string or an exec list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    String(String),
    List(Vec<Value>),
    Other(Value),
}

/// `environment:` or `labels:`, as `KEY=VALUE` strings or a mapping.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListOrMap {
    List(Vec<Value>),
    Map(Mapping),
    Other(Value),
}

/// A field that must be a list. Any other shape is kept for reporting.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListField<T> {
    List(Vec<T>),
    Other(Value),
}

impl<T> Default for ListField<T> {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl<T> ListField<T> {
    /// The entries, or nothing when the field had the wrong shape.
    #[must_use]
    pub fn items(&self) -> &[T] {
        match self {
            Self::List(items) => items,
            Self::Other(_) => &[],
        }
    }

    /// An explicit `null` reads as an empty list.
    #[must_use]
    pub fn is_misshapen(&self) -> bool {
        matches!(self, Self::Other(v) if !v.is_null())
    }
}

/// `deploy.replicas:`, which must be an integer.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Replicas {
    Count(i64),
    Other(Value),
}

/// One `ports:` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PortSpec {
    Short(String),
    Long(Mapping),
    Other(Value),
}

/// One service `volumes:` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VolumeMount {
    Short(String),
    Long(Mapping),
    Other(Value),
}

/// One entry of a list-form service `networks:`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NetworkAttachment {
    Name(String),
    Long(Mapping),
    Other(Value),
}

/// Service `networks:` as a list of attachments or a name-keyed mapping.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServiceNetworks {
    List(Vec<NetworkAttachment>),
    Map(BTreeMap<String, Value>),
    Other(Value),
}

/// `external:` on a top-level resource.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum External {
    Flag(bool),
    Spec(Mapping),
    Other(Value),
}

/// Service-level `configs:` / `secrets:` reference.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ResourceRef {
    Name(String),
    Long {
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        target: Option<String>,
    },
    Other(Value),
}

// ── Model ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComposeFile {
    #[serde(default)]
    pub version: Option<Value>,
    #[serde(default)]
    pub services: Option<BTreeMap<String, Option<ServiceDefinition>>>,
    #[serde(default)]
    pub networks: Option<BTreeMap<String, Option<ResourceDefinition>>>,
    #[serde(default)]
    pub volumes: Option<BTreeMap<String, Option<ResourceDefinition>>>,
    #[serde(default)]
    pub configs: Option<BTreeMap<String, Option<ResourceDefinition>>>,
    #[serde(default)]
    pub secrets: Option<BTreeMap<String, Option<ResourceDefinition>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceDefinition {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub build: Option<Value>,
    #[serde(default)]
    pub environment: Option<ListOrMap>,
    #[serde(default)]
    pub labels: Option<ListOrMap>,
    #[serde(default)]
    pub command: Option<StringOrList>,
    #[serde(default)]
    pub entrypoint: Option<StringOrList>,
    #[serde(default)]
    pub ports: ListField<PortSpec>,
    #[serde(default)]
    pub volumes: ListField<VolumeMount>,
    #[serde(default)]
    pub networks: Option<ServiceNetworks>,
    #[serde(default)]
    pub configs: ListField<ResourceRef>,
    #[serde(default)]
    pub secrets: ListField<ResourceRef>,
    #[serde(default)]
    pub deploy: Option<DeploySection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploySection {
    #[serde(default)]
    pub replicas: Option<Replicas>,
    #[serde(default)]
    pub placement: Option<Placement>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Placement {
    #[serde(default)]
    pub constraints: Vec<String>,
}

/// Top-level network, volume, config or secret.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceDefinition {
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub external: Option<External>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
}

/// One structural problem found by [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue(pub String);

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Parsing ──────────────────────────────────────────────────────────────────

static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\$\$|\$\{([A-Za-z_][A-Za-z0-9_]*)(?:(:?-)([^}]*))?\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("valid regex")
});

/// Expand `$VAR`, `${VAR}`, `${VAR:-default}` and `${VAR-default}`.
///
/// Unset variables become empty strings. `$$` is a literal `$`.
pub fn expand_env(content: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    VAR_PATTERN
        .replace_all(content, |caps: &Captures<'_>| {
            if &caps[0] == "$$" {
                return "$".to_string();
            }
            if let Some(name) = caps.get(4) {
                return lookup(name.as_str()).unwrap_or_default();
            }
            let value = caps.get(1).and_then(|n| lookup(n.as_str()));
            match (caps.get(2).map(|m| m.as_str()), value) {
                (Some(":-"), Some(v)) if v.is_empty() => caps[3].to_string(),
                (Some(_), None) => caps[3].to_string(),
                (_, Some(v)) => v,
                (None, None) => String::new(),
            }
        })
        .into_owned()
}

/// Parse YAML content after variable expansion.
///
/// # Errors
///
/// Returns [`DeployError::Validation`] when the content is not valid YAML or
/// does not have the overall shape of a compose file.
pub fn parse(
    content: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ComposeFile, DeployError> {
    let expanded = expand_env(content, lookup);
    if expanded.trim().is_empty() {
        return Ok(ComposeFile::default());
    }
    serde_yaml::from_str(&expanded)
        .map_err(|e| DeployError::Validation(vec![format!("failed to parse YAML: {e}")]))
}

// ── Validation ───────────────────────────────────────────────────────────────

/// Whether a short-syntax volume source is a host path rather than a named
/// volume.
#[must_use]
pub fn is_bind_mount(source: &str) -> bool {
    ["./", "/", "../", "~"].iter().any(|p| source.starts_with(p))
}

/// Check everything `docker stack deploy` would reject or silently ignore.
#[must_use]
pub fn validate(file: &ComposeFile) -> Vec<ValidationIssue> {
    let services = file.services.as_ref().filter(|s| !s.is_empty());
    let Some(services) = services else {
        return vec![ValidationIssue("no services defined".to_string())];
    };

    let mut issues = Vec::new();
    let mut push = |msg: String| issues.push(ValidationIssue(msg));
    let empty = ServiceDefinition::default();

    for (name, svc) in services {
        let svc = svc.as_ref().unwrap_or(&empty);
        if svc.image.as_deref().is_none_or(str::is_empty) {
            push(format!("service '{name}' is missing 'image'"));
        }
        if svc.build.is_some() {
            push(format!(
                "service '{name}' uses 'build', which is not supported in docker stack deploy"
            ));
        }
        if let Some(deploy) = &svc.deploy {
            match &deploy.replicas {
                Some(Replicas::Count(n)) if *n < 1 => push(format!(
                    "service '{name}' has invalid 'deploy.replicas': must be >= 1"
                )),
                Some(Replicas::Other(_)) => push(format!(
                    "service '{name}' has invalid 'deploy.replicas': must be an integer"
                )),
                _ => {}
            }
            let constraints = deploy.placement.iter().flat_map(|p| &p.constraints);
            for constraint in constraints {
                if !constraint.contains("==") && !constraint.contains("!=") {
                    push(format!(
                        "service '{name}' has invalid constraint '{constraint}': must contain '==' or '!='"
                    ));
                }
            }
        }
        let shapes = [
            ("ports", svc.ports.is_misshapen()),
            ("volumes", svc.volumes.is_misshapen()),
            ("configs", svc.configs.is_misshapen()),
            ("secrets", svc.secrets.is_misshapen()),
        ];
        for (field, _) in shapes.iter().filter(|(_, bad)| *bad) {
            push(format!("service '{name}' {field} must be a list"));
        }
        for (i, port) in svc.ports.items().iter().enumerate() {
            match port {
                PortSpec::Short(p) if !p.contains(':') => push(format!(
                    "service '{name}' port '{p}' must contain at least one ':'"
                )),
                PortSpec::Short(_) => {}
                PortSpec::Long(map) if map.contains_key("target") => {}
                PortSpec::Long(_) | PortSpec::Other(_) => push(format!(
                    "service '{name}' ports[{i}] must be a string like 'HOST:CONTAINER'"
                )),
            }
        }
        check_string_or_list(name, "command", svc.command.as_ref(), &mut push);
        check_string_or_list(name, "entrypoint", svc.entrypoint.as_ref(), &mut push);
        check_list_or_map(name, "environment", svc.environment.as_ref(), &mut push);
        check_list_or_map(name, "labels", svc.labels.as_ref(), &mut push);
        check_volumes(name, svc, file.volumes.as_ref(), &mut push);
        check_networks(name, svc, file.networks.as_ref(), &mut push);
        check_refs(name, "config", svc.configs.items(), file.configs.as_ref(), &mut push);
        check_refs(name, "secret", svc.secrets.items(), file.secrets.as_ref(), &mut push);
    }

    let top_level = [
        ("volume", &file.volumes),
        ("network", &file.networks),
        ("config", &file.configs),
        ("secret", &file.secrets),
    ];
    for (kind, defs) in top_level {
        for (name, def) in defs.iter().flatten() {
            if let Some(External::Other(_)) = def.as_ref().and_then(|d| d.external.as_ref()) {
                push(format!("{kind} '{name}' has invalid 'external' value"));
            }
        }
    }

    issues
}

/// Load-and-validate result as a single error.
///
/// # Errors
///
/// Returns [`DeployError::Validation`] listing every issue.
pub fn ensure_valid(file: &ComposeFile) -> Result<(), DeployError> {
    let issues = validate(file);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(DeployError::Validation(
            issues.into_iter().map(|i| i.0).collect(),
        ))
    }
}

fn check_string_or_list(
    service: &str,
    field: &str,
    value: Option<&StringOrList>,
    push: &mut impl FnMut(String),
) {
    match value {
        None | Some(StringOrList::String(_)) => {}
        Some(StringOrList::List(parts)) => {
            for (i, part) in parts.iter().enumerate() {
                if !part.is_string() {
                    push(format!("service '{service}' {field}[{i}] must be a string"));
                }
            }
        }
        Some(StringOrList::Other(_)) => push(format!(
            "service '{service}' {field} must be a string or list of strings"
        )),
    }
}

fn check_list_or_map(
    service: &str,
    field: &str,
    value: Option<&ListOrMap>,
    push: &mut impl FnMut(String),
) {
    match value {
        None | Some(ListOrMap::Map(_)) => {}
        Some(ListOrMap::List(items)) => {
            for (i, item) in items.iter().enumerate() {
                if !item.is_string() {
                    push(format!(
                        "service '{service}' {field}[{i}] must be a 'KEY=VALUE' string"
                    ));
                }
            }
        }
        Some(ListOrMap::Other(_)) => push(format!(
            "service '{service}' {field} must be a list or a mapping"
        )),
    }
}

fn check_volumes(
    service: &str,
    svc: &ServiceDefinition,
    defined: Option<&BTreeMap<String, Option<ResourceDefinition>>>,
    push: &mut impl FnMut(String),
) {
    let is_defined = |v: &str| defined.is_some_and(|d| d.contains_key(v));
    for (i, mount) in svc.volumes.items().iter().enumerate() {
        match mount {
            VolumeMount::Short(spec) => {
                let Some((source, _)) = spec.split_once(':') else {
                    // anonymous volume
                    continue;
                };
                if !is_bind_mount(source) && !is_defined(source) {
                    push(format!("service '{service}' uses undefined volume '{source}'"));
                }
            }
            VolumeMount::Long(map) => {
                let kind = map.get("type").and_then(Value::as_str).unwrap_or("volume");
                if kind == "tmpfs" || kind == "npipe" {
                    continue;
                }
                match map.get("source").and_then(Value::as_str) {
                    Some(source) if !source.is_empty() => {
                        if kind == "volume" && !is_bind_mount(source) && !is_defined(source) {
                            push(format!(
                                "service '{service}' uses undefined volume '{source}'"
                            ));
                        }
                    }
                    _ => push(format!(
                        "service '{service}' volumes[{i}] is missing or invalid 'source'"
                    )),
                }
            }
            VolumeMount::Other(_) => push(format!(
                "service '{service}' volumes[{i}] must be a string or a mapping"
            )),
        }
    }
}

fn check_networks(
    service: &str,
    svc: &ServiceDefinition,
    defined: Option<&BTreeMap<String, Option<ResourceDefinition>>>,
    push: &mut impl FnMut(String),
) {
    let check_name = |net: &str, push: &mut dyn FnMut(String)| {
        if net != "default" && !defined.is_some_and(|d| d.contains_key(net)) {
            push(format!("service '{service}' uses undefined network '{net}'"));
        }
    };
    match &svc.networks {
        None => {}
        Some(ServiceNetworks::List(list)) => {
            for (i, attachment) in list.iter().enumerate() {
                match attachment {
                    NetworkAttachment::Name(net) => check_name(net, &mut *push),
                    NetworkAttachment::Long(map) => {
                        match map.get("name").and_then(Value::as_str) {
                            Some(net) if !net.is_empty() => check_name(net, &mut *push),
                            _ => push(format!(
                                "service '{service}' networks[{i}] is missing or invalid 'name'"
                            )),
                        }
                    }
                    NetworkAttachment::Other(_) => push(format!(
                        "service '{service}' networks[{i}] must be a string or a mapping"
                    )),
                }
            }
        }
        Some(ServiceNetworks::Map(map)) => {
            for net in map.keys() {
                check_name(net, &mut *push);
            }
        }
        Some(ServiceNetworks::Other(_)) => push(format!(
            "service '{service}' networks must be a list or a mapping"
        )),
    }
}

fn check_refs(
    service: &str,
    kind: &str,
    refs: &[ResourceRef],
    defined: Option<&BTreeMap<String, Option<ResourceDefinition>>>,
    push: &mut impl FnMut(String),
) {
    for (i, reference) in refs.iter().enumerate() {
        let source = match reference {
            ResourceRef::Name(name) => Some(name.as_str()),
            ResourceRef::Long { source, .. } => source.as_deref(),
            ResourceRef::Other(_) => {
                push(format!(
                    "service '{service}' {kind}s[{i}] must be a string or a mapping"
                ));
                continue;
            }
        };
        match source.filter(|s| !s.is_empty()) {
            None => push(format!(
                "service '{service}' references a {kind} with no 'source'"
            )),
            Some(src) if !defined.is_some_and(|d| d.contains_key(src)) => push(format!(
                "service '{service}' references undefined {kind} '{src}'"
            )),
            Some(_) => {}
        }
    }
}
