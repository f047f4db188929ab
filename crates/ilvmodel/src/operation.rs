use serde::{Deserialize, Serialize};
use std::fmt;

use crate::node::OperationType;

/// The operation an actor will perform when it is next scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextOperation {
    /// First step of a freshly created actor.
    Start,
    /// Spawn another actor.
    Create,
    /// Dispatch an event to `target`.
    Send { target: u64 },
    /// Consume the event sent at step `send_index`.
    Receive { send_index: u64 },
    /// Halt.
    Stop,
    Yield,
    Join,
}

impl NextOperation {
    /// The tree operation this maps to, if the program model tracks it.
    pub fn operation_type(&self) -> Option<OperationType> {
        match self {
            Self::Start => Some(OperationType::Start),
            Self::Create => Some(OperationType::Create),
            Self::Send { .. } => Some(OperationType::Send),
            Self::Receive { .. } => Some(OperationType::Receive),
            Self::Stop => Some(OperationType::Stop),
            Self::Yield | Self::Join => None,
        }
    }

    /// Create, Send and Stop continue the running handler; Start and Receive
    /// always begin a new one.
    pub fn continues_handler(&self) -> bool {
        matches!(self, Self::Create | Self::Send { .. } | Self::Stop)
    }
}

impl fmt::Display for NextOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Create => write!(f, "create"),
            Self::Send { target } => write!(f, "send to {target}"),
            Self::Receive { send_index } => write!(f, "receive of send {send_index}"),
            Self::Stop => write!(f, "stop"),
            Self::Yield => write!(f, "yield"),
            Self::Join => write!(f, "join"),
        }
    }
}

/// An actor as seen by the scheduler at one scheduling decision.
pub trait Schedulable {
    fn id(&self) -> u64;
    fn next_operation(&self) -> NextOperation;
    fn is_enabled(&self) -> bool;
}

/// Plain snapshot of a schedulable actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub actor_id: u64,
    pub next: NextOperation,
    pub is_enabled: bool,
}

impl Candidate {
    pub fn new(actor_id: u64, next: NextOperation) -> Self {
        Candidate {
            actor_id,
            next,
            is_enabled: true,
        }
    }

    pub fn disabled(actor_id: u64, next: NextOperation) -> Self {
        Candidate {
            actor_id,
            next,
            is_enabled: false,
        }
    }

    pub fn start(actor_id: u64) -> Self {
        Self::new(actor_id, NextOperation::Start)
    }

    pub fn create(actor_id: u64) -> Self {
        Self::new(actor_id, NextOperation::Create)
    }

    pub fn send(actor_id: u64, target: u64) -> Self {
        Self::new(actor_id, NextOperation::Send { target })
    }

    pub fn receive(actor_id: u64, send_index: u64) -> Self {
        Self::new(actor_id, NextOperation::Receive { send_index })
    }

    pub fn stop(actor_id: u64) -> Self {
        Self::new(actor_id, NextOperation::Stop)
    }
}

impl Schedulable for Candidate {
    fn id(&self) -> u64 {
        self.actor_id
    }

    fn next_operation(&self) -> NextOperation {
        self.next
    }

    fn is_enabled(&self) -> bool {
        self.is_enabled
    }
}
