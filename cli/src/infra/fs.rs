//! Local filesystem: deploy file loading, extra-file expansion, generated
//! files and key files.

use std::cell::RefCell;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use ignore::gitignore::GitignoreBuilder;
use tempfile::{NamedTempFile, TempPath};

use crate::application::ports::{DeployFileLoader, LocalFiles};
use crate::domain::compose_file::{self, ComposeFile};
use crate::domain::config::ExtraFile;
use crate::domain::error::DeployError;
use crate::domain::upload::{ExpandedExtra, SourceMatch, UploadItem};

/// Reads compose files from disk, expanding variables from the process
/// environment.
pub struct FsDeployFileLoader;

impl DeployFileLoader for FsDeployFileLoader {
    fn load(&self, path: &Path) -> Result<ComposeFile> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DeployError::Configuration(format!("cannot read deploy file {}: {e}", path.display()))
        })?;
        Ok(compose_file::parse(&content, |name| std::env::var(name).ok())?)
    }
}

/// Production [`LocalFiles`]. Generated files are deleted when this value
/// is dropped.
#[derive(Default)]
pub struct LocalFileSystem {
    generated: RefCell<Vec<TempPath>>,
}

impl LocalFiles for LocalFileSystem {
    fn expand(&self, entries: &[ExtraFile]) -> Result<Vec<ExpandedExtra>> {
        expand_extra_files(entries)
    }

    fn materialise(&self, item: &UploadItem, env_vars: Option<&str>) -> Result<PathBuf> {
        if !item.is_generated() {
            return Ok(PathBuf::from(&item.source));
        }
        let mut file = NamedTempFile::new().context("failed to create .env file")?;
        let content = env_vars.unwrap_or_default();
        file.write_all(content.as_bytes())
            .context("failed to write .env file")?;
        if !content.ends_with('\n') {
            file.write_all(b"\n").context("failed to write .env file")?;
        }
        let path = file.into_temp_path();
        let local = path.to_path_buf();
        self.generated.borrow_mut().push(path);
        Ok(local)
    }
}

/// Resolve every entry to the files and directories it names.
///
/// # Errors
///
/// Returns [`DeployError::Configuration`] for an invalid pattern or a source
/// that matches nothing.
pub fn expand_extra_files(entries: &[ExtraFile]) -> Result<Vec<ExpandedExtra>> {
    entries
        .iter()
        .map(|entry| {
            let paths = if is_glob(&entry.src) {
                glob(&entry.src)?
            } else if Path::new(&entry.src).exists() {
                vec![entry.src.clone()]
            } else {
                Vec::new()
            };
            if paths.is_empty() {
                return Err(DeployError::Configuration(format!(
                    "No matches found for: {}",
                    entry.src
                ))
                .into());
            }
            let matches = paths
                .into_iter()
                .map(|p| source_match(&p))
                .collect::<Result<Vec<_>>>()?;
            Ok(ExpandedExtra {
                entry: entry.clone(),
                matches,
            })
        })
        .collect()
}

fn is_glob(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

fn source_match(path: &str) -> Result<SourceMatch> {
    let meta =
        std::fs::metadata(path).with_context(|| format!("cannot access '{path}'"))?;
    if !meta.is_dir() {
        return Ok(SourceMatch::File(path.to_string()));
    }
    let mut files = Vec::new();
    for entry in WalkBuilder::new(path).standard_filters(false).build() {
        let entry = entry.with_context(|| format!("failed to walk directory '{path}'"))?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(path) {
            files.push(slash(rel));
        }
    }
    files.sort();
    Ok(SourceMatch::Dir {
        path: path.to_string(),
        files,
    })
}

/// Shell-style glob, one path segment per wildcard segment. `*` never
/// crosses a `/`.
fn glob(pattern: &str) -> Result<Vec<String>> {
    let parts: Vec<&str> = pattern.split('/').collect();
    let first = parts.iter().position(|p| is_glob(p)).unwrap_or(parts.len());
    let root = match parts[..first].join("/") {
        r if r.is_empty() && pattern.starts_with('/') => "/".to_string(),
        r if r.is_empty() => ".".to_string(),
        r => r,
    };
    let depth = parts.len() - first;

    let invalid = || DeployError::Configuration(format!("Invalid glob pattern: {pattern}"));
    let mut builder = GitignoreBuilder::new(&root);
    builder
        .add_line(None, &format!("/{}", parts[first..].join("/")))
        .map_err(|_| invalid())?;
    let matcher = builder.build().map_err(|_| invalid())?;

    if !Path::new(&root).is_dir() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in WalkBuilder::new(&root)
        .standard_filters(false)
        .max_depth(Some(depth))
        .build()
    {
        let entry = entry.with_context(|| format!("failed to walk '{root}'"))?;
        if entry.depth() != depth {
            continue;
        }
        let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
        let Ok(rel) = entry.path().strip_prefix(&root) else {
            continue;
        };
        if matcher.matched(rel, is_dir).is_ignore() {
            found.push(slash(entry.path()));
        }
    }
    found.sort();
    Ok(found)
}

fn slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Expand a leading `~/` to the home directory.
#[must_use]
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Read private key material from a file.
///
/// # Errors
///
/// Returns [`DeployError::Configuration`] if the file cannot be read.
pub fn read_key_file(path: &str) -> Result<String> {
    let resolved = expand_home(path);
    std::fs::read_to_string(&resolved).map_err(|e| {
        DeployError::Configuration(format!(
            "cannot read SSH key file {}: {e}",
            resolved.display()
        ))
        .into()
    })
}
