use thiserror::Error;

use crate::node::{NodeId, OperationType};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("there is an ongoing handler: {node}")]
    HandlerInProgress { node: NodeId },

    #[error("no handler in progress")]
    NoHandlerInProgress,

    #[error("cannot map {operation} of actor {actor} back to a tree node")]
    UnmappedChoice { actor: u64, operation: String },

    #[error("{operation} for key {key} is already pending at node {node}")]
    AlreadyPending {
        operation: OperationType,
        key: u64,
        node: NodeId,
    },

    #[error("resumed actor {found} does not match in-progress actor {expected}")]
    ActorMismatch { expected: u64, found: u64 },

    #[error("program model does not support operation {0}")]
    UnsupportedOperation(String),

    #[error("create by actor {creator} produced no enabled, previously unknown actor")]
    NoCreatedActor { creator: u64 },

    #[error("only a send can be withheld, current node {node} is a {operation}")]
    WithheldNonSend { node: NodeId, operation: OperationType },

    #[error("tree root is actor {existing}, harness is actor {found}")]
    RootMismatch { existing: u64, found: u64 },

    #[error("unknown tree node: {0}")]
    UnknownNode(NodeId),

    #[error("malformed node {node}: {reason}")]
    MalformedNode { node: NodeId, reason: &'static str },

    #[error("config: {0}")]
    Config(String),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("trace: {0}")]
    Trace(#[from] interleave_trace::TraceError),
}
