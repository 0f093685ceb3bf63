//! Shared helpers for running remote commands with progress output.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::Result;

use crate::application::ports::{ProgressReporter, RemoteShell};
use crate::domain::classify::{ClassifierKind, ProgressEvent};
use crate::domain::remote::{CommandOutput, OutputLine};

/// Run a buffered command and turn a non-zero exit into an error.
///
/// The command is echoed in verbose mode. Stdout is returned on success.
///
/// # Errors
///
/// Returns the transport error, or a [`crate::domain::RemoteCommandError`]
/// carrying the remote stderr.
pub async fn run_checked(
    shell: &impl RemoteShell,
    reporter: &impl ProgressReporter,
    command: &str,
) -> Result<CommandOutput> {
    reporter.command(command);
    let output = shell.run_buffered(command).await?;
    Ok(output.into_result()?)
}

/// Run a streamed command, classifying its output into progress events.
///
/// Both remote streams feed one classifier. The classifier is flushed after
/// the command ends, whether it succeeded or not.
///
/// # Errors
///
/// Returns the error from [`RemoteShell::run_streamed`].
pub async fn run_classified(
    shell: &impl RemoteShell,
    reporter: &impl ProgressReporter,
    command: &str,
) -> Result<()> {
    reporter.command(command);
    let mut classifier = ClassifierKind::for_command(command).build();
    let result = shell
        .run_streamed(command, &mut |line: OutputLine| {
            for event in classifier.feed(&line.text) {
                render(reporter, event);
            }
        })
        .await;
    for event in classifier.finish() {
        render(reporter, event);
    }
    result
}

/// Print one progress event.
pub fn render(reporter: &impl ProgressReporter, event: ProgressEvent) {
    match event {
        ProgressEvent::PullStarted => reporter.substep("Pulling images..."),
        ProgressEvent::StopStarted => reporter.substep("Stopping services..."),
        ProgressEvent::StartStarted => reporter.substep("Starting services..."),
        ProgressEvent::UpdateStarted => reporter.substep("Updating services..."),
        ProgressEvent::ServiceConverging { service } => {
            reporter.substep(&format!("Verifying service {service}..."));
        }
        ProgressEvent::ServiceConverged { service } => {
            reporter.success(&format!("Service '{service}' convergence complete"));
        }
        ProgressEvent::RollbackStarted { service } => match service {
            Some(name) => reporter.warn(&format!("Rolling back {name}")),
            None => reporter.warn("Rolling back"),
        },
        ProgressEvent::Ellipsis => reporter.line("..."),
        ProgressEvent::Line(text) => reporter.line(&text),
    }
}

/// Flatten multi-line stderr into one line for headline error messages.
#[must_use]
pub fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
