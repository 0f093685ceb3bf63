use super::{BlankRun, OutputClassifier, ProgressEvent};

const PULL_MARKERS: &[&str] = &["Pulling", "Pulled"];
const STOP_MARKERS: &[&str] = &["Stopping", "Stopped", "Removing", "Removed"];
const START_MARKERS: &[&str] = &["Creating", "Created", "Starting", "Started"];

/// Groups `docker compose` chatter under one heading per phase.
#[derive(Debug, Default)]
pub struct ComposeClassifier {
    pulled: bool,
    stopped: bool,
    started: bool,
    blanks: BlankRun,
}

impl OutputClassifier for ComposeClassifier {
    fn feed(&mut self, line: &str) -> Vec<ProgressEvent> {
        let line = line.trim();
        if let Some(events) = self.blanks.check(line) {
            return events;
        }

        let has = |markers: &[&str]| markers.iter().any(|m| line.contains(m));
        let mut events = Vec::with_capacity(2);
        if has(PULL_MARKERS) {
            if !self.pulled {
                self.pulled = true;
                events.push(ProgressEvent::PullStarted);
            }
        } else if has(STOP_MARKERS) {
            if !self.stopped {
                self.stopped = true;
                events.push(ProgressEvent::StopStarted);
            }
        } else if has(START_MARKERS) && !self.started {
            self.started = true;
            events.push(ProgressEvent::StartStarted);
        }
        events.push(ProgressEvent::Line(line.to_string()));
        events
    }
}
