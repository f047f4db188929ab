use serde::{Deserialize, Serialize};
use std::ops::Index;

use crate::error::TraceError;
use crate::step::{ActorId, Choice, EventSnapshot, StepKind, StepRecord};

/// Current version of the persisted trace format.
pub const TRACE_FORMAT_VERSION: u32 = 1;

/// Maximum supported version (for forward-compat rejection).
const MAX_SUPPORTED_VERSION: u32 = 1;

/// The steps of one test iteration, from the initial state to the state in
/// which the iteration ended.
///
/// Append-only except for [`BugTrace::pop`], which backtracks one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BugTrace {
    /// Missing in old JSON; serde default fills TRACE_FORMAT_VERSION.
    #[serde(default = "default_version")]
    version: u32,
    steps: Vec<StepRecord>,
}

fn default_version() -> u32 {
    TRACE_FORMAT_VERSION
}

impl Default for BugTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl BugTrace {
    pub fn new() -> Self {
        BugTrace {
            version: TRACE_FORMAT_VERSION,
            steps: Vec::new(),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StepRecord> {
        self.steps.get(index)
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StepRecord> {
        self.steps.iter()
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }

    pub fn add_create_machine_step(
        &mut self,
        creator: Option<&ActorId>,
        creator_state: Option<&str>,
        created: &ActorId,
        event: Option<EventSnapshot>,
    ) -> usize {
        let mut step = StepRecord::new(self.len(), StepKind::CreateMachine)
            .actor(creator.cloned(), creator_state.map(str::to_string))
            .target(created.clone());
        step.event = event;
        self.push(step)
    }

    pub fn add_create_monitor_step(&mut self, monitor: &ActorId) -> usize {
        let step = StepRecord::new(self.len(), StepKind::CreateMonitor).target(monitor.clone());
        self.push(step)
    }

    pub fn add_send_event_step(
        &mut self,
        sender: &ActorId,
        sender_state: Option<&str>,
        event: EventSnapshot,
        target: &ActorId,
        sender_state_info: Option<&str>,
        target_state_info: Option<&str>,
    ) -> usize {
        let mut step = StepRecord::new(self.len(), StepKind::SendEvent)
            .actor(Some(sender.clone()), sender_state.map(str::to_string))
            .target(target.clone())
            .event(event);
        step.state_info = sender_state_info.map(str::to_string);
        step.target_state_info = target_state_info.map(str::to_string);
        self.push(step)
    }

    pub fn add_dequeue_event_step(
        &mut self,
        actor: &ActorId,
        state: &str,
        event: EventSnapshot,
        state_info: Option<&str>,
    ) -> usize {
        let mut step = StepRecord::new(self.len(), StepKind::DequeueEvent)
            .actor(Some(actor.clone()), Some(state.to_string()))
            .event(event);
        step.state_info = state_info.map(str::to_string);
        self.push(step)
    }

    /// Patch the state info of the most recent dequeue of `actor` once the
    /// state its handler ended in is known.
    pub fn replace_dequeued_actor_state_info(
        &mut self,
        actor: &ActorId,
        state: &str,
    ) -> Result<(), TraceError> {
        let step = self
            .steps
            .iter_mut()
            .rev()
            .find(|s| s.is_dequeue_of(actor))
            .ok_or_else(|| TraceError::MissingDequeue {
                actor: actor.clone(),
            })?;
        step.state_info = Some(state.to_string());
        Ok(())
    }

    pub fn add_raise_event_step(
        &mut self,
        actor: &ActorId,
        state: &str,
        event: EventSnapshot,
    ) -> usize {
        let step = StepRecord::new(self.len(), StepKind::RaiseEvent)
            .actor(Some(actor.clone()), Some(state.to_string()))
            .event(event);
        self.push(step)
    }

    pub fn add_goto_state_step(&mut self, actor: &ActorId, state: &str) -> usize {
        let step = StepRecord::new(self.len(), StepKind::GotoState)
            .actor(Some(actor.clone()), Some(state.to_string()));
        self.push(step)
    }

    pub fn add_invoke_action_step(&mut self, actor: &ActorId, state: &str, action: &str) -> usize {
        let mut step = StepRecord::new(self.len(), StepKind::InvokeAction)
            .actor(Some(actor.clone()), Some(state.to_string()));
        step.action = Some(action.to_string());
        self.push(step)
    }

    pub fn add_wait_to_receive_step(
        &mut self,
        actor: &ActorId,
        state: &str,
        event_names: &str,
    ) -> usize {
        let mut step = StepRecord::new(self.len(), StepKind::WaitToReceive)
            .actor(Some(actor.clone()), Some(state.to_string()));
        step.awaited_events = Some(event_names.to_string());
        self.push(step)
    }

    pub fn add_received_event_step(
        &mut self,
        actor: &ActorId,
        state: &str,
        event: EventSnapshot,
    ) -> usize {
        let step = StepRecord::new(self.len(), StepKind::ReceiveEvent)
            .actor(Some(actor.clone()), Some(state.to_string()))
            .event(event);
        self.push(step)
    }

    pub fn add_random_bool_choice_step(&mut self, actor: &ActorId, state: &str, choice: bool) -> usize {
        self.add_random_choice_step(actor, state, Choice::Bool(choice))
    }

    pub fn add_random_int_choice_step(&mut self, actor: &ActorId, state: &str, choice: i64) -> usize {
        self.add_random_choice_step(actor, state, Choice::Int(choice))
    }

    fn add_random_choice_step(&mut self, actor: &ActorId, state: &str, choice: Choice) -> usize {
        let mut step = StepRecord::new(self.len(), StepKind::RandomChoice)
            .actor(Some(actor.clone()), Some(state.to_string()));
        step.choice = Some(choice);
        self.push(step)
    }

    pub fn add_halt_step(&mut self, actor: &ActorId, state: &str) -> usize {
        let step = StepRecord::new(self.len(), StepKind::Halt)
            .actor(Some(actor.clone()), Some(state.to_string()));
        self.push(step)
    }

    /// Remove and return the latest step.
    pub fn pop(&mut self) -> Result<StepRecord, TraceError> {
        let mut step = self.steps.pop().ok_or(TraceError::EmptyTrace)?;
        step.previous = None;
        step.next = None;
        if let Some(last) = self.steps.last_mut() {
            last.next = None;
        }
        tracing::trace!(index = step.index(), kind = %step.kind, "popped trace step");
        Ok(step)
    }

    /// The latest step, without removing it.
    pub fn peek(&self) -> Option<&StepRecord> {
        self.steps.last()
    }

    /// Render the dequeue steps as the JSON document consumed by the
    /// counterexample visualizer. An empty trace renders as an empty string.
    pub fn to_visualization_format(&self) -> String {
        if self.steps.is_empty() {
            return String::new();
        }

        let last_dequeue = self
            .steps
            .iter()
            .rposition(|s| s.kind == StepKind::DequeueEvent);

        let mut out = String::from("[\n");
        for (i, step) in self.steps.iter().enumerate() {
            if step.kind != StepKind::DequeueEvent {
                continue;
            }
            let to = step.actor.as_ref().map(ActorId::to_string).unwrap_or_default();
            let from = step
                .event
                .as_ref()
                .and_then(|e| e.sender.as_ref())
                .map(ActorId::to_string)
                .unwrap_or_default();
            let message = step
                .event
                .as_ref()
                .map(|e| e.representation.as_str())
                .unwrap_or_default();
            let state = step.state_info.as_deref().filter(|s| !s.is_empty());

            out.push_str("  {\n");
            out.push_str(&format!("    \"From\": {},\n", quoted(&from)));
            out.push_str(&format!("    \"To\": {},\n", quoted(&to)));
            out.push_str(&format!(
                "    \"Message\": {}{}\n",
                quoted(message),
                if state.is_some() { "," } else { "" }
            ));
            if let Some(state) = state {
                out.push_str("    \"State\":\n    {\n");
                out.push_str(&format!("    {}: {}\n", quoted(&to), quoted(state)));
                out.push_str("    }\n");
            }
            if Some(i) == last_dequeue {
                out.push_str("  }\n");
            } else {
                out.push_str("  },\n");
            }
        }
        out.push_str("]\n");
        out
    }

    /// Serialize the trace to JSON.
    pub fn to_json(&self) -> Result<String, TraceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON, rebuilding the step links.
    ///
    /// Rejects traces with version > MAX_SUPPORTED_VERSION.
    pub fn from_json(json: &str) -> Result<Self, TraceError> {
        let parsed: BugTrace = serde_json::from_str(json)?;
        if parsed.version > MAX_SUPPORTED_VERSION {
            return Err(TraceError::UnsupportedVersion {
                found: parsed.version,
                max: MAX_SUPPORTED_VERSION,
            });
        }
        let mut trace = BugTrace::new();
        for step in parsed.steps {
            trace.push(step);
        }
        Ok(trace)
    }

    fn push(&mut self, mut step: StepRecord) -> usize {
        let index = self.steps.len();
        step.index = index;
        step.next = None;
        step.previous = None;
        if let Some(last) = self.steps.last_mut() {
            last.next = Some(index);
            step.previous = Some(last.index);
        }
        tracing::trace!(index, kind = %step.kind, "pushed trace step");
        self.steps.push(step);
        index
    }
}

/// `s` as a JSON string literal.
fn quoted(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

impl Index<usize> for BugTrace {
    type Output = StepRecord;

    fn index(&self, index: usize) -> &StepRecord {
        &self.steps[index]
    }
}

impl<'a> IntoIterator for &'a BugTrace {
    type Item = &'a StepRecord;
    type IntoIter = std::slice::Iter<'a, StepRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}
