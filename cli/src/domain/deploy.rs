//! Compose engine state machine and the one-shot rollback guard.

/// Fires exactly once per deployment.
#[derive(Debug, Default)]
pub struct RollbackGuard {
    fired: bool,
}

impl RollbackGuard {
    /// Returns `true` the first time it is called, `false` ever after.
    pub fn try_trigger(&mut self) -> bool {
        !std::mem::replace(&mut self.fired, true)
    }

    #[must_use]
    pub fn fired(&self) -> bool {
        self.fired
    }
}

/// Steps of one compose deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeStep {
    Validate,
    Pull,
    Down,
    Up,
    Verify,
    /// Verify or `up` failed with this reason.
    Failed(String),
    /// Restore the latest backup, then re-enter the pipeline.
    Restore(String),
    Done,
}

/// What to do once a step has failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureAction {
    /// Restore the backup and redeploy.
    Rollback,
    /// Give up: rollback disabled.
    Abort,
    /// Give up: this was already the rollback attempt.
    AbortAfterRollback,
}

impl ComposeStep {
    /// Next step after this one succeeded.
    ///
    /// `pull` gates the pull step. A rollback redeploy skips `Validate` but
    /// still pulls when pulling is on.
    #[must_use]
    pub fn next(&self, pull: bool) -> Self {
        match self {
            Self::Validate | Self::Restore(_) if pull => Self::Pull,
            Self::Validate | Self::Restore(_) | Self::Pull => Self::Down,
            Self::Down => Self::Up,
            Self::Up => Self::Verify,
            Self::Verify | Self::Done => Self::Done,
            Self::Failed(reason) => Self::Failed(reason.clone()),
        }
    }
}

/// Decide how to react to a failed step.
pub fn on_failure(rollback_enabled: bool, guard: &mut RollbackGuard) -> FailureAction {
    if guard.fired() {
        FailureAction::AbortAfterRollback
    } else if rollback_enabled && guard.try_trigger() {
        FailureAction::Rollback
    } else {
        FailureAction::Abort
    }
}
