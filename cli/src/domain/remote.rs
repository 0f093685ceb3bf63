//! Value types describing remote command results, plus shell quoting.
//!
//! Pure data only. The transport that produces these lives in `crate::infra`.

use crate::domain::error::RemoteCommandError;

/// Which remote stream a line arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// One line of streamed remote output, without its trailing newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: StreamKind,
    pub text: String,
}

impl OutputLine {
    #[must_use]
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            stream: StreamKind::Stdout,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            stream: StreamKind::Stderr,
            text: text.into(),
        }
    }
}

/// Captured result of a buffered remote command.
///
/// Stdout and stderr are always populated, whatever the exit status, so
/// callers can print diagnostics on failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// The error for a non-zero exit, or `None` when the command succeeded.
    #[must_use]
    pub fn exit_error(&self) -> Option<RemoteCommandError> {
        (!self.success()).then(|| RemoteCommandError {
            code: self.exit_code,
            stderr: self.stderr.clone(),
        })
    }

    /// Convert a non-zero exit into an `Err`, keeping the output otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteCommandError`] when the exit code is non-zero.
    pub fn into_result(self) -> Result<Self, RemoteCommandError> {
        match self.exit_error() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    /// Trimmed stdout, the usual shape for single-token probe answers.
    #[must_use]
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// Quote `value` for a POSIX shell using single quotes.
///
/// Embedded single quotes are closed, escaped and reopened (`'\''`).
#[must_use]
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_./:=@+,%".contains(&b))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Parent directory of a remote (always `/`-separated) path.
#[must_use]
pub fn remote_dirname(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/",
        Some(idx) => &trimmed[..idx],
        None => ".",
    }
}

/// Final component of a remote path.
#[must_use]
pub fn remote_basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Join remote path segments with `/`, collapsing duplicate separators and
/// `.` components.
#[must_use]
pub fn remote_join(base: &str, rest: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in base.split('/').chain(rest.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if base.starts_with('/') {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}
