//! Terminal and JSON output

pub mod json;
pub mod progress;
pub mod reporter;
pub mod styles;

use anyhow::Result;
use console::Term;
use owo_colors::OwoColorize as _;
pub use reporter::TerminalReporter;
pub use styles::Styles;

/// Where and how a command talks to the operator.
///
/// In JSON mode every human-readable message except errors is dropped so
/// stdout carries exactly one JSON document.
pub struct OutputContext {
    pub styles: Styles,
    /// Whether stdout is a TTY.
    pub is_tty: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    pub json: bool,
}

impl OutputContext {
    /// Build from the global flags. `--json` implies quiet human output.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool, json: bool) -> Self {
        let is_tty = Term::stdout().is_term();
        let use_colors = !no_color && is_tty && std::env::var("NO_COLOR").is_err();

        let mut styles = Styles::default();
        if use_colors {
            styles.colorize();
        }

        Self {
            styles,
            is_tty,
            quiet: quiet || json,
            json,
        }
    }

    /// Spinners only make sense on an interactive, non-quiet terminal.
    #[must_use]
    pub fn show_progress(&self) -> bool {
        self.is_tty && !self.quiet
    }

    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "✓".style(self.styles.success));
        }
    }

    pub fn warn(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "⚠".style(self.styles.warning));
        }
    }

    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "ℹ".style(self.styles.info));
        }
    }

    /// Print to stderr. Never suppressed.
    pub fn error(&self, msg: &str) {
        eprintln!("  {} {msg}", "✗".style(self.styles.error));
    }

    /// A security-relevant warning. Goes to stderr and survives `--quiet`
    /// and `--json`.
    pub fn alert(&self, msg: &str) {
        eprintln!("  {} {}", "⚠".style(self.styles.warning), msg.style(self.styles.alert));
    }

    /// A heading followed by aligned `key  value` rows. Empty values are
    /// skipped.
    pub fn summary(&self, title: &str, rows: &[(&str, &str)]) {
        if self.quiet {
            return;
        }
        println!("{}", title.style(self.styles.header));
        let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        for (key, value) in rows.iter().filter(|(_, v)| !v.is_empty()) {
            println!("  {:<width$}  {value}", key.style(self.styles.dim));
        }
    }

    /// Print one pretty JSON document to stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn print_json(&self, value: &serde_json::Value) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}
