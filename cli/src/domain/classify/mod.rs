//! Streamed-output classifiers.
//!
//! A classifier turns raw remote output lines into [`ProgressEvent`]s. It
//! never fails: anything it does not recognise passes through as
//! [`ProgressEvent::Line`].

mod compose;
mod stack;

pub use compose::ComposeClassifier;
pub use stack::StackClassifier;

/// One thing worth telling the operator about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// First image pull activity.
    PullStarted,
    /// First container stop/remove activity.
    StopStarted,
    /// First container create/start activity.
    StartStarted,
    /// First `Updating service` line of a stack deploy.
    UpdateStarted,
    ServiceConverging { service: String },
    ServiceConverged { service: String },
    /// The orchestrator began rolling back `service`, when known.
    RollbackStarted { service: Option<String> },
    /// One or more blank lines.
    Ellipsis,
    /// Raw line, echoed indented.
    Line(String),
}

/// Stateful line-by-line reducer.
pub trait OutputClassifier {
    /// Classify one line. Trailing newline already stripped.
    fn feed(&mut self, line: &str) -> Vec<ProgressEvent>;

    /// Flush anything owed at end of stream.
    fn finish(&mut self) -> Vec<ProgressEvent> {
        Vec::new()
    }
}

/// Which classifier suits a remote command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierKind {
    Compose,
    Stack,
}

impl ClassifierKind {
    /// Compose commands (either CLI spelling) get the compose classifier;
    /// everything else is treated as swarm output.
    #[must_use]
    pub fn for_command(command: &str) -> Self {
        if command.contains("docker compose") || command.contains("docker-compose") {
            Self::Compose
        } else {
            Self::Stack
        }
    }

    #[must_use]
    pub fn build(self) -> Box<dyn OutputClassifier> {
        match self {
            Self::Compose => Box::new(ComposeClassifier::default()),
            Self::Stack => Box::new(StackClassifier::default()),
        }
    }
}

/// Collapses runs of blank lines into a single [`ProgressEvent::Ellipsis`].
#[derive(Debug, Default)]
pub(crate) struct BlankRun {
    in_run: bool,
}

impl BlankRun {
    /// Returns `Some(events)` when `line` is blank and fully handled.
    pub(crate) fn check(&mut self, line: &str) -> Option<Vec<ProgressEvent>> {
        if line.is_empty() {
            let events = if self.in_run {
                Vec::new()
            } else {
                vec![ProgressEvent::Ellipsis]
            };
            self.in_run = true;
            Some(events)
        } else {
            self.in_run = false;
            None
        }
    }
}
