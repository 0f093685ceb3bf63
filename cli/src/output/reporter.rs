//! `TerminalReporter`: Presentation-layer implementation of `ProgressReporter`.
//!
//! Wraps `&OutputContext` and implements the `application::ports::ProgressReporter`
//! trait so application services can emit progress events without depending on
//! any presentation type directly.

use owo_colors::OwoColorize as _;

use crate::application::ports::ProgressReporter;
use crate::output::OutputContext;

/// Terminal progress reporter that wraps an `OutputContext`.
///
/// - `step()` prints `"→ {message}"` as a heading
/// - `substep()` and `line()` print indented detail
/// - `verbose()` and `command()` print only when constructed verbose
/// - `error()` goes to stderr and is never suppressed; everything else is
///   suppressed when `ctx.quiet`
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
    verbose: bool,
}

impl<'a> TerminalReporter<'a> {
    /// Create a new `TerminalReporter` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext, verbose: bool) -> Self {
        Self { ctx, verbose }
    }

    /// Whether a message of this kind would be printed.
    #[must_use]
    pub fn shows(&self, verbose_only: bool) -> bool {
        !self.ctx.quiet && (self.verbose || !verbose_only)
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        if self.shows(false) {
            println!();
            println!(
                "{} {}",
                "→".style(self.ctx.styles.header),
                message.style(self.ctx.styles.bold)
            );
        }
    }

    fn substep(&self, message: &str) {
        if self.shows(false) {
            println!("  {message}");
        }
    }

    fn success(&self, message: &str) {
        self.ctx.success(message);
    }

    fn info(&self, message: &str) {
        self.ctx.info(message);
    }

    fn warn(&self, message: &str) {
        self.ctx.warn(message);
    }

    fn error(&self, message: &str) {
        self.ctx.error(message);
    }

    fn verbose(&self, message: &str) {
        if self.shows(true) {
            println!("  {}", message.style(self.ctx.styles.dim));
        }
    }

    fn command(&self, command: &str) {
        if self.shows(true) {
            println!("  {} {}", "$".style(self.ctx.styles.dim), command.style(self.ctx.styles.command));
        }
    }

    fn line(&self, text: &str) {
        if self.shows(false) {
            println!("    {}", text.style(self.ctx.styles.dim));
        }
    }
}
