use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an actor (machine or monitor) as it appears in a trace.
///
/// The numeric id is unique within one test iteration; the name is the
/// actor's type name and is only used for display.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId {
    pub id: u64,
    pub name: String,
}

impl ActorId {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        ActorId {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.id)
    }
}

/// Kind of an observed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    CreateMachine,
    CreateMonitor,
    SendEvent,
    DequeueEvent,
    RaiseEvent,
    GotoState,
    InvokeAction,
    WaitToReceive,
    ReceiveEvent,
    RandomChoice,
    Halt,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateMachine => write!(f, "create_machine"),
            Self::CreateMonitor => write!(f, "create_monitor"),
            Self::SendEvent => write!(f, "send_event"),
            Self::DequeueEvent => write!(f, "dequeue_event"),
            Self::RaiseEvent => write!(f, "raise_event"),
            Self::GotoState => write!(f, "goto_state"),
            Self::InvokeAction => write!(f, "invoke_action"),
            Self::WaitToReceive => write!(f, "wait_to_receive"),
            Self::ReceiveEvent => write!(f, "receive_event"),
            Self::RandomChoice => write!(f, "random_choice"),
            Self::Halt => write!(f, "halt"),
        }
    }
}

/// A nondeterministic value chosen by a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    Bool(bool),
    Int(i64),
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
        }
    }
}

/// Display-oriented copy of an event, taken when the step is recorded.
///
/// Payloads are never held by reference: the live event may be mutated or
/// dropped by the runtime long before the trace is reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub representation: String,
    pub sender: Option<ActorId>,
    pub sender_state: Option<String>,
}

impl EventSnapshot {
    pub fn capture(event: &impl fmt::Display) -> Self {
        EventSnapshot {
            representation: event.to_string(),
            sender: None,
            sender_state: None,
        }
    }

    pub fn with_sender(mut self, sender: ActorId, sender_state: Option<String>) -> Self {
        self.sender = Some(sender);
        self.sender_state = sender_state;
        self
    }
}

/// One observed action of a test iteration.
///
/// `index`, `previous` and `next` are owned by the trace the record lives in
/// and are only readable from outside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub(crate) index: usize,
    pub kind: StepKind,
    pub actor: Option<ActorId>,
    pub actor_state: Option<String>,
    pub target: Option<ActorId>,
    pub event: Option<EventSnapshot>,
    pub action: Option<String>,
    pub awaited_events: Option<String>,
    pub choice: Option<Choice>,
    /// State info of `actor`; for a dequeue this is patched with the state
    /// the handler ended in.
    pub state_info: Option<String>,
    pub target_state_info: Option<String>,
    #[serde(skip)]
    pub(crate) previous: Option<usize>,
    #[serde(skip)]
    pub(crate) next: Option<usize>,
}

impl StepRecord {
    pub(crate) fn new(index: usize, kind: StepKind) -> Self {
        StepRecord {
            index,
            kind,
            actor: None,
            actor_state: None,
            target: None,
            event: None,
            action: None,
            awaited_events: None,
            choice: None,
            state_info: None,
            target_state_info: None,
            previous: None,
            next: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Index of the preceding record in the same trace.
    pub fn previous(&self) -> Option<usize> {
        self.previous
    }

    /// Index of the following record in the same trace.
    pub fn next(&self) -> Option<usize> {
        self.next
    }

    pub fn is_dequeue_of(&self, actor: &ActorId) -> bool {
        self.kind == StepKind::DequeueEvent && self.actor.as_ref() == Some(actor)
    }

    pub(crate) fn actor(mut self, actor: Option<ActorId>, state: Option<String>) -> Self {
        self.actor = actor;
        self.actor_state = state;
        self
    }

    pub(crate) fn target(mut self, target: ActorId) -> Self {
        self.target = Some(target);
        self
    }

    pub(crate) fn event(mut self, event: EventSnapshot) -> Self {
        self.event = Some(event);
        self
    }
}

impl fmt::Display for StepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.index, self.kind)?;
        if let Some(actor) = &self.actor {
            write!(f, " {actor}")?;
            if let Some(state) = &self.actor_state {
                write!(f, " in {state}")?;
            }
        }
        if let Some(target) = &self.target {
            write!(f, " -> {target}")?;
        }
        if let Some(event) = &self.event {
            write!(f, " '{}'", event.representation)?;
        }
        if let Some(action) = &self.action {
            write!(f, " action {action}")?;
        }
        if let Some(awaited) = &self.awaited_events {
            write!(f, " awaiting {awaited}")?;
        }
        if let Some(choice) = &self.choice {
            write!(f, " chose {choice}")?;
        }
        Ok(())
    }
}
