use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::config::{ModelConfig, TreeRetention};
use crate::error::ModelError;
use crate::node::{NodeId, OperationType, TreeNode};
use crate::operation::{NextOperation, Schedulable};
use crate::tree::{Completion, EventTree};

/// Maps the live scheduler's choices onto the event tree.
///
/// Idle between scheduling decisions, in progress between
/// [`ProgramModel::record_scheduling_choice_start`] and
/// [`ProgramModel::record_scheduling_choice_result`]. The lookup indices are
/// per iteration and cleared by [`ProgramModel::reset`]; whether the tree
/// survives a reset is decided by [`TreeRetention`].
#[derive(Debug)]
pub struct ProgramModel {
    tree: EventTree,
    config: ModelConfig,
    current: Option<NodeId>,
    highest_known_id: u64,
    /// Receive nodes of sends that were not yet delivered, by send index.
    send_index_to_receive: HashMap<u64, NodeId>,
    /// Start nodes of created actors that have not run yet.
    actor_to_start: HashMap<u64, NodeId>,
    actor_to_latest_completed: HashMap<u64, NodeId>,
    is_first_step: bool,
}

impl Default for ProgramModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramModel {
    pub fn new() -> Self {
        Self::with_config(ModelConfig::default())
    }

    pub fn with_config(config: ModelConfig) -> Self {
        ProgramModel {
            tree: EventTree::with_max_nodes(config.max_tree_nodes),
            config,
            current: None,
            highest_known_id: 0,
            send_index_to_receive: HashMap::new(),
            actor_to_start: HashMap::new(),
            actor_to_latest_completed: HashMap::new(),
            is_first_step: true,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Reset for a new iteration using the configured retention.
    pub fn reset(&mut self) {
        self.reset_with(self.config.tree_retention);
    }

    pub fn reset_with(&mut self, retention: TreeRetention) {
        self.send_index_to_receive.clear();
        self.actor_to_start.clear();
        self.actor_to_latest_completed.clear();
        self.current = None;
        self.highest_known_id = 0;
        self.is_first_step = true;
        match retention {
            TreeRetention::Discard => {
                self.tree = EventTree::with_max_nodes(self.config.max_tree_nodes);
            }
            TreeRetention::Retain => self.tree.begin_iteration(),
        }
        debug!(?retention, nodes = self.tree.len(), "program model reset");
    }

    pub fn tree(&self) -> &EventTree {
        &self.tree
    }

    pub fn into_tree(self) -> EventTree {
        self.tree
    }

    pub fn is_in_progress(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_node(&self) -> Option<NodeId> {
        self.current
    }

    pub fn current_choice(&self) -> Option<&TreeNode> {
        self.current.and_then(|id| self.tree.node(id))
    }

    /// Seed the tree with the harness actor's Start node and make it the
    /// choice in progress.
    pub fn initialize_with_test_harness(&mut self, harness_id: u64) -> Result<NodeId, ModelError> {
        let root = self
            .tree
            .initialize_with_root(TreeNode::create_start(harness_id, None))?;
        self.current = Some(root);
        self.highest_known_id = harness_id;
        self.is_first_step = false;
        self.tree.start_schedule_choice(root)?;
        debug!(actor = harness_id, node = %root, "initialized tree with harness");
        Ok(root)
    }

    pub fn record_scheduling_choice_start<S: Schedulable>(
        &mut self,
        candidate: &S,
        step_index: u64,
    ) -> Result<NodeId, ModelError> {
        if let Some(node) = self.current {
            return Err(ModelError::HandlerInProgress { node });
        }
        if self.is_first_step && candidate.next_operation() == NextOperation::Start {
            return self.initialize_with_test_harness(candidate.id());
        }

        let id = self.map_candidate(candidate)?.ok_or_else(|| {
            warn!(actor = candidate.id(), op = %candidate.next_operation(), "choice has no tree node");
            ModelError::UnmappedChoice {
                actor: candidate.id(),
                operation: candidate.next_operation().to_string(),
            }
        })?;

        let node = self.tree.node_mut(id).ok_or(ModelError::UnknownNode(id))?;
        if Some(node.operation) != candidate.next_operation().operation_type()
            || node.source_actor != candidate.id()
        {
            warn!(
                actor = candidate.id(),
                node = %id,
                node_actor = node.source_actor,
                op = %node.operation,
                "tree node does not belong to choice"
            );
            return Err(ModelError::UnmappedChoice {
                actor: candidate.id(),
                operation: candidate.next_operation().to_string(),
            });
        }
        if node.operation == OperationType::Send {
            node.matching_send_index = Some(step_index);
        }

        self.tree.start_schedule_choice(id)?;
        self.current = Some(id);
        debug!(actor = candidate.id(), node = %id, op = %candidate.next_operation(), step_index, "scheduling choice started");
        Ok(id)
    }

    pub fn record_scheduling_choice_result<S: Schedulable>(
        &mut self,
        current: &S,
        next_choices: &BTreeMap<u64, S>,
        end_step_index: u64,
        was_withheld: bool,
    ) -> Result<Completion, ModelError> {
        if self.is_first_step {
            self.initialize_with_test_harness(current.id())?;
        }
        let id = self.current.ok_or(ModelError::NoHandlerInProgress)?;
        let node = self.tree.node(id).ok_or(ModelError::UnknownNode(id))?.clone();

        if node.source_actor != current.id() {
            warn!(expected = node.source_actor, found = current.id(), node = %id, "resumed actor mismatch");
            if self.config.strict_actor_check {
                return Err(ModelError::ActorMismatch {
                    expected: node.source_actor,
                    found: current.id(),
                });
            }
        }

        let created = match node.operation {
            OperationType::Create => {
                let created_id = next_choices
                    .iter()
                    .filter(|(actor, s)| **actor > self.highest_known_id && s.is_enabled())
                    .map(|(actor, _)| *actor)
                    .max()
                    .ok_or(ModelError::NoCreatedActor {
                        creator: node.source_actor,
                    })?;
                if let Some(create) = self.tree.node_mut(id) {
                    create.target_actor = Some(created_id);
                }
                self.highest_known_id = created_id;
                Some((
                    Pending::Start(created_id),
                    TreeNode::create_start(created_id, Some(node.source_actor)),
                ))
            }
            OperationType::Send => {
                let send_index = node.matching_send_index.ok_or(ModelError::MalformedNode {
                    node: id,
                    reason: "send without an identifier",
                })?;
                if was_withheld {
                    self.tree.record_withheld(send_index);
                    debug!(actor = node.source_actor, send_index, "send withheld");
                    None
                } else {
                    let receiver = node.target_actor.ok_or(ModelError::MalformedNode {
                        node: id,
                        reason: "send without a receiver",
                    })?;
                    Some((
                        Pending::Receive(send_index),
                        TreeNode::create_receive(receiver, node.source_actor, send_index),
                    ))
                }
            }
            OperationType::Start | OperationType::Receive | OperationType::Stop => None,
        };
        let (pending, created) = created.unzip();
        if let Some(pending) = pending {
            self.ensure_not_pending(pending)?;
        }

        let continuation = next_choices
            .get(&node.source_actor)
            .filter(|next| node.is_continued_by(*next))
            .map(TreeNode::create_from_candidate)
            .transpose()?;

        let completion = self.tree.complete_schedule_choice(id, continuation, created)?;

        if let (Some(pending), Some(created_id)) = (pending, completion.created) {
            match pending {
                Pending::Start(actor) => self.actor_to_start.insert(actor, created_id),
                Pending::Receive(send_index) => self.send_index_to_receive.insert(send_index, created_id),
            };
        }
        self.actor_to_latest_completed.insert(node.source_actor, id);
        self.current = None;

        debug!(
            actor = node.source_actor,
            node = %id,
            op = %node.operation,
            end_step_index,
            was_withheld,
            "scheduling choice completed"
        );
        Ok(completion)
    }

    pub fn record_integer_choice(&mut self, choice: i64) -> Result<(), ModelError> {
        self.current_node_mut()?.add_integer_choice(choice);
        Ok(())
    }

    pub fn record_boolean_choice(&mut self, choice: bool) -> Result<(), ModelError> {
        self.current_node_mut()?.add_boolean_choice(choice);
        Ok(())
    }

    /// Mark the send in progress as withheld: its receive is not created in
    /// this iteration.
    ///
    /// The withheld set is keyed by the send's identifier, the same key its
    /// receive is looked up by, not by the node's ordering index.
    pub fn record_event_withheld(&mut self) -> Result<(), ModelError> {
        let id = self.current.ok_or(ModelError::NoHandlerInProgress)?;
        let node = self.tree.node(id).ok_or(ModelError::UnknownNode(id))?;
        if node.operation != OperationType::Send {
            return Err(ModelError::WithheldNonSend {
                node: id,
                operation: node.operation,
            });
        }
        let index = node.matching_send_index.ok_or(ModelError::MalformedNode {
            node: id,
            reason: "send without an identifier",
        })?;
        let actor = node.source_actor;
        self.tree.record_withheld(index);
        debug!(actor, send_index = index, "send withheld");
        Ok(())
    }

    fn current_node_mut(&mut self) -> Result<&mut TreeNode, ModelError> {
        let id = self.current.ok_or(ModelError::NoHandlerInProgress)?;
        self.tree.node_mut(id).ok_or(ModelError::UnknownNode(id))
    }

    /// A created node must not replace one that is still waiting to run.
    fn ensure_not_pending(&self, pending: Pending) -> Result<(), ModelError> {
        let (operation, key, existing) = match pending {
            Pending::Start(actor) => (OperationType::Start, actor, self.actor_to_start.get(&actor)),
            Pending::Receive(send_index) => (
                OperationType::Receive,
                send_index,
                self.send_index_to_receive.get(&send_index),
            ),
        };
        match existing {
            Some(&node) => {
                warn!(%operation, key, node = %node, "created node is already pending");
                Err(ModelError::AlreadyPending {
                    operation,
                    key,
                    node,
                })
            }
            None => Ok(()),
        }
    }

    fn map_candidate<S: Schedulable>(&self, candidate: &S) -> Result<Option<NodeId>, ModelError> {
        let actor = candidate.id();
        let found = match candidate.next_operation() {
            NextOperation::Receive { send_index } => self.send_index_to_receive.get(&send_index).copied(),
            NextOperation::Start => self.actor_to_start.get(&actor).copied(),
            NextOperation::Create | NextOperation::Send { .. } | NextOperation::Stop => self
                .actor_to_latest_completed
                .get(&actor)
                .and_then(|&latest| self.tree.child_event(latest)),
            op @ (NextOperation::Yield | NextOperation::Join) => {
                return Err(ModelError::UnsupportedOperation(op.to_string()))
            }
        };
        Ok(found)
    }
}

/// Lookup key of a node created by a completed choice.
#[derive(Debug, Clone, Copy)]
enum Pending {
    Start(u64),
    Receive(u64),
}
