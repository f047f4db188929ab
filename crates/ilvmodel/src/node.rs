use interleave_trace::Choice;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ModelError;
use crate::operation::{NextOperation, Schedulable};

/// Stable handle of a node in the event tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Start,
    Create,
    Send,
    Receive,
    Stop,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Create => write!(f, "create"),
            Self::Send => write!(f, "send"),
            Self::Receive => write!(f, "receive"),
            Self::Stop => write!(f, "stop"),
        }
    }
}

/// One scheduling decision in the cross-iteration event tree.
///
/// `source_actor` is always the actor that executes the operation. The
/// meaning of `target_actor` depends on the operation:
///
/// | operation | target                          |
/// |-----------|---------------------------------|
/// | Start     | creator (none for the harness)  |
/// | Create    | created actor, once known       |
/// | Send      | receiver                        |
/// | Receive   | sender                          |
/// | Stop      | none                            |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub operation: OperationType,
    pub source_actor: u64,
    pub target_actor: Option<u64>,
    /// Send: identifier assigned when the send is scheduled. Receive: the
    /// identifier of the send it consumes.
    pub matching_send_index: Option<u64>,
    pub total_ordering_index: Option<u64>,
    pub recorded_choices: Vec<Choice>,
    /// Number of iterations that scheduled this node.
    pub visits: u64,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Continuation recorded when this node last completed.
    pub(crate) continuation: Option<NodeId>,
}

impl TreeNode {
    fn new(operation: OperationType, source_actor: u64) -> Self {
        TreeNode {
            operation,
            source_actor,
            target_actor: None,
            matching_send_index: None,
            total_ordering_index: None,
            recorded_choices: Vec::new(),
            visits: 0,
            parent: None,
            children: Vec::new(),
            continuation: None,
        }
    }

    pub fn create_start(actor: u64, creator: Option<u64>) -> Self {
        let mut node = Self::new(OperationType::Start, actor);
        node.target_actor = creator;
        node
    }

    pub fn create_receive(receiver: u64, sender: u64, send_index: u64) -> Self {
        let mut node = Self::new(OperationType::Receive, receiver);
        node.target_actor = Some(sender);
        node.matching_send_index = Some(send_index);
        node
    }

    /// Build the node a candidate's next operation would occupy.
    pub fn create_from_candidate<S: Schedulable>(candidate: &S) -> Result<Self, ModelError> {
        let actor = candidate.id();
        let node = match candidate.next_operation() {
            NextOperation::Start => Self::create_start(actor, None),
            NextOperation::Create => Self::new(OperationType::Create, actor),
            NextOperation::Send { target } => {
                let mut node = Self::new(OperationType::Send, actor);
                node.target_actor = Some(target);
                node
            }
            NextOperation::Receive { send_index } => {
                let mut node = Self::new(OperationType::Receive, actor);
                node.matching_send_index = Some(send_index);
                node
            }
            NextOperation::Stop => Self::new(OperationType::Stop, actor),
            op @ (NextOperation::Yield | NextOperation::Join) => {
                return Err(ModelError::UnsupportedOperation(op.to_string()))
            }
        };
        Ok(node)
    }

    pub fn add_integer_choice(&mut self, choice: i64) {
        self.recorded_choices.push(Choice::Int(choice));
    }

    pub fn add_boolean_choice(&mut self, choice: bool) {
        self.recorded_choices.push(Choice::Bool(choice));
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn continuation(&self) -> Option<NodeId> {
        self.continuation
    }

    /// Whether `candidate` is the next operation of the handler this node
    /// belongs to.
    pub fn is_continued_by<S: Schedulable>(&self, candidate: &S) -> bool {
        self.source_actor == candidate.id() && candidate.next_operation().continues_handler()
    }

    /// Whether `other` occupies the same position in the tree. Create targets
    /// are only known after the create ran, so they are not compared.
    pub fn same_position(&self, other: &TreeNode) -> bool {
        if self.operation != other.operation || self.source_actor != other.source_actor {
            return false;
        }
        match self.operation {
            OperationType::Start | OperationType::Send => self.target_actor == other.target_actor,
            OperationType::Receive => {
                self.target_actor.is_none()
                    || other.target_actor.is_none()
                    || self.target_actor == other.target_actor
            }
            OperationType::Create | OperationType::Stop => true,
        }
    }
}

impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.operation, self.source_actor)?;
        if let Some(target) = self.target_actor {
            write!(f, "->{target}")?;
        }
        if let Some(idx) = self.matching_send_index {
            write!(f, " #{idx}")?;
        }
        Ok(())
    }
}
