//! Shared fakes: a scripted remote shell, a recording transfer, canned local
//! files and a recording reporter.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::Result;
use rigger_cli::application::ports::{
    DeployFileLoader, FileTransfer, LocalFiles, ProgressReporter, RemoteShell,
};
use rigger_cli::domain::compose_file::{self, ComposeFile};
use rigger_cli::domain::config::ExtraFile;
use rigger_cli::domain::remote::{CommandOutput, OutputLine};
use rigger_cli::domain::upload::{ExpandedExtra, UploadItem};

// ── Output constructors ──────────────────────────────────────────────────────

pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: 0,
    }
}

pub fn fail(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        stdout: String::new(),
        stderr: stderr.to_string(),
        exit_code: code,
    }
}

// ── Scripted shell ───────────────────────────────────────────────────────────

struct Rule {
    needle: String,
    replies: VecDeque<CommandOutput>,
}

/// Answers each command from the first rule whose needle it contains.
///
/// Replies for one needle are consumed in order; the last one repeats.
/// Unmatched commands succeed with empty output. Every command is recorded.
#[derive(Default)]
pub struct ScriptedShell {
    rules: RefCell<Vec<Rule>>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, needle: &str, reply: CommandOutput) -> Self {
        {
            let mut rules = self.rules.borrow_mut();
            match rules.iter_mut().find(|r| r.needle == needle) {
                Some(rule) => rule.replies.push_back(reply),
                None => rules.push(Rule {
                    needle: needle.to_string(),
                    replies: VecDeque::from([reply]),
                }),
            }
        }
        self
    }

    /// Replace every reply queued for `needle`.
    pub fn set(self, needle: &str, reply: CommandOutput) -> Self {
        self.rules.borrow_mut().retain(|r| r.needle != needle);
        self.on(needle, reply)
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.contains(needle)).count()
    }

    /// Index of the first recorded command containing `needle`.
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.calls.borrow().iter().position(|c| c.contains(needle))
    }

    fn reply(&self, command: &str) -> CommandOutput {
        self.calls.borrow_mut().push(command.to_string());
        let mut rules = self.rules.borrow_mut();
        let Some(rule) = rules.iter_mut().find(|r| command.contains(&r.needle)) else {
            return ok("");
        };
        if rule.replies.len() > 1 {
            rule.replies.pop_front().unwrap_or_else(|| ok(""))
        } else {
            rule.replies.front().cloned().unwrap_or_else(|| ok(""))
        }
    }
}

impl RemoteShell for ScriptedShell {
    async fn run_buffered(&self, command: &str) -> Result<CommandOutput> {
        Ok(self.reply(command))
    }

    async fn run_streamed(
        &self,
        command: &str,
        on_line: &mut dyn FnMut(OutputLine),
    ) -> Result<()> {
        let output = self.reply(command);
        for line in output.stdout.lines() {
            on_line(OutputLine::stdout(line));
        }
        for line in output.stderr.lines() {
            on_line(OutputLine::stderr(line));
        }
        output.into_result()?;
        Ok(())
    }
}

// ── Transfer ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingTransfer {
    pub uploads: RefCell<Vec<(PathBuf, String)>>,
}

impl FileTransfer for RecordingTransfer {
    async fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        self.uploads
            .borrow_mut()
            .push((local.to_path_buf(), remote.to_string()));
        Ok(())
    }
}

// ── Local files ──────────────────────────────────────────────────────────────

/// Returns a fixed expansion and passes every source path through.
#[derive(Default)]
pub struct CannedFiles {
    pub expanded: Vec<ExpandedExtra>,
}

impl LocalFiles for CannedFiles {
    fn expand(&self, _entries: &[ExtraFile]) -> Result<Vec<ExpandedExtra>> {
        Ok(self.expanded.clone())
    }

    fn materialise(&self, item: &UploadItem, _env_vars: Option<&str>) -> Result<PathBuf> {
        Ok(PathBuf::from(&item.source))
    }
}

/// Parses fixed YAML regardless of the path asked for.
pub struct InlineLoader(pub &'static str);

impl DeployFileLoader for InlineLoader {
    fn load(&self, _path: &Path) -> Result<ComposeFile> {
        Ok(compose_file::parse(self.0, |_| None)?)
    }
}

// ── Reporter ─────────────────────────────────────────────────────────────────

/// Records every message as `kind: text`.
#[derive(Default)]
pub struct RecordingReporter {
    pub events: RefCell<Vec<String>>,
}

impl RecordingReporter {
    fn push(&self, kind: &str, message: &str) {
        self.events.borrow_mut().push(format!("{kind}: {message}"));
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.events.borrow().iter().any(|e| e.contains(needle))
    }
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, message: &str) {
        self.push("step", message);
    }
    fn substep(&self, message: &str) {
        self.push("substep", message);
    }
    fn success(&self, message: &str) {
        self.push("success", message);
    }
    fn info(&self, message: &str) {
        self.push("info", message);
    }
    fn warn(&self, message: &str) {
        self.push("warn", message);
    }
    fn error(&self, message: &str) {
        self.push("error", message);
    }
    fn verbose(&self, message: &str) {
        self.push("verbose", message);
    }
    fn command(&self, command: &str) {
        self.push("command", command);
    }
    fn line(&self, text: &str) {
        self.push("line", text);
    }
}
