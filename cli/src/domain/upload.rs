//! Upload planning: where each local file lands on the remote host.
//!
//! Pure function of the request plus an already-expanded view of the local
//! filesystem (see `crate::infra::fs::expand_extra_files`). Nothing is
//! transferred here, so every planning error surfaces before connecting.

use std::collections::HashMap;
use std::fmt;

use crate::domain::config::{DeploymentRequest, ENV_FILE_NAME, ExtraFile};
use crate::domain::error::DeployError;
use crate::domain::remote::remote_join;

/// A local path matched by an extra-file source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMatch {
    File(String),
    /// A directory and the files found under it, relative to the directory,
    /// `/`-separated.
    Dir { path: String, files: Vec<String> },
}

/// An extra-file entry with its glob already resolved.
#[derive(Debug, Clone)]
pub struct ExpandedExtra {
    pub entry: ExtraFile,
    pub matches: Vec<SourceMatch>,
}

/// How a destination was derived. Shown next to each planned upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadNote {
    DeployFile,
    Flattened,
    FlattenedCustom,
    Custom,
    CustomDir,
    Preserved,
    PreservedDir,
    Generated,
}

impl fmt::Display for UploadNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DeployFile => "(deploy file)",
            Self::Flattened => "(flattened)",
            Self::FlattenedCustom => "(flattened-custom)",
            Self::Custom => "(custom)",
            Self::CustomDir => "(custom-dir)",
            Self::Preserved => "(preserved)",
            Self::PreservedDir => "(preserved-dir)",
            Self::Generated => "(generated)",
        })
    }
}

/// One file to transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadItem {
    /// Local path, `/`-separated. For the generated env file this is `.env`.
    pub source: String,
    /// Absolute remote path.
    pub destination: String,
    pub note: UploadNote,
}

impl UploadItem {
    #[must_use]
    pub fn is_generated(&self) -> bool {
        self.note == UploadNote::Generated
    }
}

/// Build the sorted upload plan.
///
/// # Errors
///
/// Returns [`DeployError::Configuration`] when two flattened sources share a
/// basename, or when a source cannot be placed under the project path.
pub fn plan_uploads(
    request: &DeploymentRequest,
    extras: &[ExpandedExtra],
) -> Result<Vec<UploadItem>, DeployError> {
    let project = request.project_path.as_str();
    let mut planned = vec![UploadItem {
        source: to_slash(&request.deploy_file),
        destination: request.remote_deploy_file(),
        note: UploadNote::DeployFile,
    }];
    let mut flattened: HashMap<String, String> = HashMap::new();

    for extra in extras {
        let entry = &extra.entry;
        let dst = entry.dst.as_deref();
        for found in &extra.matches {
            match found {
                SourceMatch::File(path) => {
                    let local = to_slash(path);
                    let base = basename(&local).to_string();
                    let (destination, note) = if entry.flatten {
                        claim_flattened(&mut flattened, &base, &local)?;
                        flattened_destination(project, dst, &base)
                    } else if let Some(dst) = dst {
                        let destination = if dst.ends_with('/') {
                            remote_join(&remote_join(project, dst), &base)
                        } else {
                            remote_join(project, dst)
                        };
                        (destination, UploadNote::Custom)
                    } else {
                        (remote_join(project, &preserved_relative(&local)?), UploadNote::Preserved)
                    };
                    planned.push(UploadItem {
                        source: local,
                        destination,
                        note,
                    });
                }
                SourceMatch::Dir { path, files } => {
                    let root = to_slash(path);
                    for rel in files {
                        let joined = format!("{}/{rel}", root.trim_end_matches('/'));
                        let local = joined.strip_prefix("./").unwrap_or(&joined).to_string();
                        let base = basename(&local).to_string();
                        let (destination, note) = if entry.flatten {
                            claim_flattened(&mut flattened, &base, &local)?;
                            flattened_destination(project, dst, &base)
                        } else if let Some(dst) = dst {
                            (
                                remote_join(&remote_join(project, dst), rel),
                                UploadNote::CustomDir,
                            )
                        } else {
                            (
                                remote_join(project, &preserved_relative(&local)?),
                                UploadNote::PreservedDir,
                            )
                        };
                        planned.push(UploadItem {
                            source: local,
                            destination,
                            note,
                        });
                    }
                }
            }
        }
    }

    if request.has_env_vars() {
        planned.push(UploadItem {
            source: ENV_FILE_NAME.to_string(),
            destination: remote_join(project, ENV_FILE_NAME),
            note: UploadNote::Generated,
        });
    }

    planned.sort_by(|a, b| a.source.cmp(&b.source));
    Ok(planned)
}

fn claim_flattened(
    seen: &mut HashMap<String, String>,
    base: &str,
    local: &str,
) -> Result<(), DeployError> {
    if let Some(existing) = seen.get(base) {
        return Err(DeployError::Configuration(format!(
            "Flattening conflict: both '{existing}' and '{local}' target '{base}'"
        )));
    }
    seen.insert(base.to_string(), local.to_string());
    Ok(())
}

fn flattened_destination(project: &str, dst: Option<&str>, base: &str) -> (String, UploadNote) {
    match dst {
        Some(dst) if dst.ends_with('/') => (
            remote_join(&remote_join(project, dst), base),
            UploadNote::FlattenedCustom,
        ),
        Some(dst) => (remote_join(project, dst), UploadNote::FlattenedCustom),
        None => (remote_join(project, base), UploadNote::Flattened),
    }
}

/// Path relative to the working directory, kept as-is under the project.
fn preserved_relative(local: &str) -> Result<String, DeployError> {
    let rel = local.trim_start_matches("./");
    if rel.starts_with('/') || rel.split('/').any(|seg| seg == "..") {
        return Err(DeployError::Configuration(format!(
            "cannot preserve the path of '{local}' under the project directory; give it a destination or flatten it"
        )));
    }
    Ok(rel.to_string())
}

fn to_slash(path: &str) -> String {
    path.replace('\\', "/")
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
