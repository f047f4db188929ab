use crate::error::TraceError;
use crate::step::{ActorId, Choice, StepKind, StepRecord};
use crate::trace::BugTrace;

/// Replay engine: checks that a replayed iteration reproduced a recorded one.
pub struct ReplayEngine;

impl ReplayEngine {
    /// Verify that a replay produces the same step sequence.
    ///
    /// Steps are compared by kind, actor, target, event representation and
    /// chosen value. State names are not compared: a replay that reaches the
    /// same states through renamed handlers is still the same schedule.
    pub fn verify(original: &BugTrace, replay: &BugTrace) -> ReplayResult {
        for (i, (o, r)) in original.iter().zip(replay.iter()).enumerate() {
            if let Some(reason) = Self::diff(o, r) {
                return ReplayResult::Diverged { index: i, reason };
            }
        }

        if original.len() != replay.len() {
            return ReplayResult::Diverged {
                index: original.len().min(replay.len()),
                reason: format!(
                    "different step count: {} vs {}",
                    original.len(),
                    replay.len()
                ),
            };
        }

        ReplayResult::Identical
    }

    fn diff(o: &StepRecord, r: &StepRecord) -> Option<String> {
        if o.kind != r.kind {
            return Some(format!("kind {} vs {}", o.kind, r.kind));
        }
        if o.actor != r.actor {
            return Some(format!("actor {} vs {}", display(&o.actor), display(&r.actor)));
        }
        if o.target != r.target {
            return Some(format!("target {} vs {}", display(&o.target), display(&r.target)));
        }
        let o_event = o.event.as_ref().map(|e| e.representation.as_str());
        let r_event = r.event.as_ref().map(|e| e.representation.as_str());
        if o_event != r_event {
            return Some(format!("event {o_event:?} vs {r_event:?}"));
        }
        if o.choice != r.choice {
            return Some(format!("choice {:?} vs {:?}", o.choice, r.choice));
        }
        None
    }
}

fn display(actor: &Option<ActorId>) -> String {
    actor
        .as_ref()
        .map(ActorId::to_string)
        .unwrap_or_else(|| "-".to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayResult {
    Identical,
    Diverged { index: usize, reason: String },
}

impl ReplayResult {
    pub fn is_identical(&self) -> bool {
        matches!(self, ReplayResult::Identical)
    }
}

/// Feeds the random choices of a recorded trace back to a replaying run, in
/// trace order.
pub struct ChoiceReplayer<'a> {
    trace: &'a BugTrace,
    cursor: usize,
}

impl<'a> ChoiceReplayer<'a> {
    pub fn new(trace: &'a BugTrace) -> Self {
        ChoiceReplayer { trace, cursor: 0 }
    }

    pub fn next_bool(&mut self, actor: &ActorId) -> Result<bool, TraceError> {
        let (index, choice) = self.advance(actor)?;
        match choice {
            Choice::Bool(b) => Ok(b),
            Choice::Int(n) => Err(TraceError::ReplayDiverged {
                index,
                reason: format!("expected a boolean choice, recorded integer {n}"),
            }),
        }
    }

    pub fn next_int(&mut self, actor: &ActorId) -> Result<i64, TraceError> {
        let (index, choice) = self.advance(actor)?;
        match choice {
            Choice::Int(n) => Ok(n),
            Choice::Bool(b) => Err(TraceError::ReplayDiverged {
                index,
                reason: format!("expected an integer choice, recorded boolean {b}"),
            }),
        }
    }

    /// Number of recorded choices not yet consumed.
    pub fn remaining(&self) -> usize {
        self.trace.steps()[self.cursor..]
            .iter()
            .filter(|s| s.kind == StepKind::RandomChoice)
            .count()
    }

    fn advance(&mut self, actor: &ActorId) -> Result<(usize, Choice), TraceError> {
        let step = self.trace.steps()[self.cursor..]
            .iter()
            .find(|s| s.kind == StepKind::RandomChoice)
            .ok_or_else(|| TraceError::ReplayExhausted {
                actor: actor.clone(),
            })?;
        self.cursor = step.index() + 1;

        if step.actor.as_ref() != Some(actor) {
            return Err(TraceError::ReplayDiverged {
                index: step.index(),
                reason: format!(
                    "choice requested by {actor}, recorded for {}",
                    display(&step.actor)
                ),
            });
        }
        let choice = step.choice.ok_or_else(|| TraceError::ReplayDiverged {
            index: step.index(),
            reason: "random choice step has no value".to_string(),
        })?;
        Ok((step.index(), choice))
    }
}
