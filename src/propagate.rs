//! Propagation of edits and deletions across a recurring series.
//!
//! A change made to one instance can be carried to every later pending
//! sibling, but only after the [`Confirm`] capability says yes. Declining is
//! a normal outcome: the instance that was addressed is still changed.

use crate::types::{Mutation, Task, TaskStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use tracing::{debug, info};

/// Yes/no decision source for propagation.
pub trait Confirm {
    fn ask(&mut self, message: &str) -> Result<bool>;
}

/// Always gives the same answer. `FixedAnswer(true)` stands in for
/// `confirmation=no`.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
    fn ask(&mut self, _message: &str) -> Result<bool> {
        Ok(self.0)
    }
}

/// Pre-recorded answers, consumed in order. Declines once exhausted.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConfirm {
    answers: VecDeque<bool>,
    asked: Vec<String>,
}

impl ScriptedConfirm {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            asked: Vec::new(),
        }
    }

    /// Questions asked so far.
    pub fn asked(&self) -> &[String] {
        &self.asked
    }
}

impl Confirm for ScriptedConfirm {
    fn ask(&mut self, message: &str) -> Result<bool> {
        self.asked.push(message.to_string());
        Ok(self.answers.pop_front().unwrap_or(false))
    }
}

/// Prompts on stderr and reads a line from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn ask(&mut self, message: &str) -> Result<bool> {
        let mut stderr = std::io::stderr();
        write!(stderr, "{} (yes/no) ", message)?;
        stderr.flush()?;

        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok(matches!(
            line.trim().to_ascii_lowercase().as_str(),
            "y" | "yes"
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationState {
    Idle,
    AwaitingConfirmation,
    Applied,
    Rejected,
}

impl PropagationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropagationState::Idle => "idle",
            PropagationState::AwaitingConfirmation => "awaiting-confirmation",
            PropagationState::Applied => "applied",
            PropagationState::Rejected => "rejected",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, PropagationState::Applied | PropagationState::Rejected)
    }
}

impl std::fmt::Display for PropagationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one proposal. `changed` holds the mutated tasks, the addressed
/// task first; the caller persists them.
#[derive(Debug, Clone, Serialize)]
pub struct PropagationOutcome {
    pub state: PropagationState,
    pub changed: Vec<Task>,
}

/// Later pending instances of the same series as `on`.
pub fn later_pending_siblings<'s>(on: &Task, candidates: &'s [Task]) -> Vec<&'s Task> {
    let (Some(parent), Some(mask)) = (on.parent_id, on.mask_index) else {
        return Vec::new();
    };
    candidates
        .iter()
        .filter(|t| {
            t.id != on.id
                && t.parent_id == Some(parent)
                && t.status == TaskStatus::Pending
                && t.mask_index.is_some_and(|m| m > mask)
        })
        .collect()
}

pub struct Coordinator<'a> {
    confirm: &'a mut dyn Confirm,
    state: PropagationState,
}

impl<'a> Coordinator<'a> {
    pub fn new(confirm: &'a mut dyn Confirm) -> Self {
        Self {
            confirm,
            state: PropagationState::Idle,
        }
    }

    fn transition(&mut self, next: PropagationState) {
        debug!(from = %self.state, to = %next, "propagation state");
        self.state = next;
    }

    /// Apply `mutation` to `on`, and to its later pending siblings if confirmed.
    ///
    /// `siblings` may be any superset of the series; only later pending
    /// instances sharing `on`'s parent are considered.
    pub fn propose(
        &mut self,
        mutation: &Mutation,
        on: &Task,
        siblings: &[Task],
        now: DateTime<Utc>,
    ) -> Result<PropagationOutcome> {
        if self.state.is_terminal() {
            self.transition(PropagationState::Idle);
        }

        let mut target = on.clone();
        mutation.apply(&mut target, now);

        let later = later_pending_siblings(on, siblings);
        if later.is_empty() {
            self.transition(PropagationState::Applied);
            return Ok(PropagationOutcome {
                state: self.state,
                changed: vec![target],
            });
        }

        self.transition(PropagationState::AwaitingConfirmation);
        let message = format!(
            "This is a recurring task. Do you want to {} all pending recurrences of this same task?",
            mutation.verb()
        );
        let accepted = match self.confirm.ask(&message) {
            Ok(answer) => answer,
            Err(e) => {
                self.transition(PropagationState::Idle);
                return Err(e);
            }
        };

        let mut changed = vec![target];
        if accepted {
            for sibling in later {
                let mut task = sibling.clone();
                mutation.apply(&mut task, now);
                changed.push(task);
            }
            info!(task = %on.id, count = changed.len(), verb = mutation.verb(), "propagated to series");
            self.transition(PropagationState::Applied);
        } else {
            info!(task = %on.id, verb = mutation.verb(), "propagation declined");
            self.transition(PropagationState::Rejected);
        }

        Ok(PropagationOutcome {
            state: self.state,
            changed,
        })
    }
}
