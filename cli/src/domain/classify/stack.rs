use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use super::{BlankRun, OutputClassifier, ProgressEvent};

static UPDATING_SERVICE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^Updating service (\S+) \(id: ([^)]+)\)").expect("valid regex")
});

/// Follows `docker stack deploy --detach=false` convergence output.
///
/// Swarm prints progress per service id; the id is mapped back to the
/// service name learned from the `Updating service NAME (id: ID)` lines.
#[derive(Debug, Default)]
pub struct StackClassifier {
    names: HashMap<String, String>,
    order: Vec<String>,
    converged: HashSet<String>,
    /// Id inferred from the first `verify: Waiting` after a convergence.
    current: Option<String>,
    /// Id (or, during rollback, name) most recently announced as verifying.
    verifying: Option<String>,
    last_countdown: Option<String>,
    update_announced: bool,
    rollback: Option<Rollback>,
    blanks: BlankRun,
}

#[derive(Debug, Default)]
struct Rollback {
    service: Option<String>,
}

impl StackClassifier {
    fn name_of(&self, id: &str) -> String {
        self.names.get(id).cloned().unwrap_or_else(|| id.to_string())
    }

    fn on_updating(&mut self, line: &str) -> Vec<ProgressEvent> {
        let mut events = Vec::with_capacity(2);
        if !self.update_announced {
            self.update_announced = true;
            events.push(ProgressEvent::UpdateStarted);
        }
        if let Some(caps) = UPDATING_SERVICE.captures(line) {
            let (name, id) = (caps[1].to_string(), caps[2].to_string());
            if self.names.insert(id.clone(), name).is_none() {
                self.order.push(id);
            }
        }
        events.push(ProgressEvent::Line(line.to_string()));
        events
    }

    fn on_converged(&mut self, line: &str) -> Vec<ProgressEvent> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(id) = tokens.len().checked_sub(2).and_then(|i| tokens.get(i)) else {
            return vec![ProgressEvent::Line(line.to_string())];
        };
        let id = (*id).to_string();
        let mut events = Vec::with_capacity(2);
        if self.converged.insert(id.clone()) {
            events.push(ProgressEvent::ServiceConverged {
                service: self.name_of(&id),
            });
        }
        events.push(ProgressEvent::Line(line.to_string()));
        self.current = None;
        self.verifying = None;
        self.rollback = None;
        events
    }

    fn on_waiting(&mut self, line: &str) -> Vec<ProgressEvent> {
        let mut events = Vec::with_capacity(2);
        if self.current.is_none() {
            self.current = self
                .order
                .iter()
                .find(|id| !self.converged.contains(*id) && self.verifying.as_ref() != Some(*id))
                .cloned();
        }

        match (&self.current, &self.rollback) {
            (Some(id), _) if self.verifying.as_ref() != Some(id) => {
                events.push(ProgressEvent::ServiceConverging {
                    service: self.name_of(id),
                });
                self.verifying = Some(id.clone());
            }
            (_, Some(Rollback { service: Some(svc) })) if self.verifying.as_ref() != Some(svc) => {
                events.push(ProgressEvent::ServiceConverging {
                    service: svc.clone(),
                });
                self.verifying = Some(svc.clone());
            }
            _ => {}
        }

        if self.last_countdown.as_deref() != Some(line) {
            self.last_countdown = Some(line.to_string());
            events.push(ProgressEvent::Line(line.to_string()));
        }
        events
    }
}

impl OutputClassifier for StackClassifier {
    fn feed(&mut self, line: &str) -> Vec<ProgressEvent> {
        let line = line.trim();
        if let Some(events) = self.blanks.check(line) {
            return events;
        }

        if line.starts_with("Updating service ") {
            return self.on_updating(line);
        }
        if line.contains("rollback: manually requested rollback") {
            let service = match self.verifying.clone() {
                Some(v) => Some(self.name_of(&v)),
                None => self.rollback.take().and_then(|r| r.service),
            };
            self.rollback = Some(Rollback {
                service: service.clone(),
            });
            return vec![ProgressEvent::RollbackStarted { service }];
        }
        if line.contains("verify: Service") && line.contains("converged") {
            return self.on_converged(line);
        }
        if line.contains("verify: Waiting") {
            return self.on_waiting(line);
        }
        vec![ProgressEvent::Line(line.to_string())]
    }

    fn finish(&mut self) -> Vec<ProgressEvent> {
        // Swarm sometimes exits without a final "converged" line.
        match self.current.take() {
            Some(id) if self.converged.insert(id.clone()) => {
                vec![ProgressEvent::ServiceConverged {
                    service: self.name_of(&id),
                }]
            }
            _ => Vec::new(),
        }
    }
}
