use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::ModelError;
use crate::node::{NodeId, TreeNode};

/// Nodes attached by one completed scheduling choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Completion {
    pub continuation: Option<NodeId>,
    pub created: Option<NodeId>,
}

/// Arena-backed tree of scheduling choices, rooted at the harness actor's
/// Start node.
///
/// Nodes are never removed; parent, child and continuation links are plain
/// [`NodeId`]s into the arena.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventTree {
    nodes: Vec<TreeNode>,
    root: Option<NodeId>,
    #[serde(skip)]
    current: Option<NodeId>,
    /// Sends whose receive was held back in the current iteration.
    withheld_send_indices: BTreeSet<u64>,
    next_ordering_index: u64,
    #[serde(default)]
    max_nodes: Option<usize>,
}

impl EventTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_nodes(max_nodes: Option<usize>) -> Self {
        EventTree {
            max_nodes,
            ..Self::default()
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// The node currently being executed, if any.
    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the tree reached its configured node bound.
    pub fn is_saturated(&self) -> bool {
        self.max_nodes.is_some_and(|max| self.nodes.len() >= max)
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(TreeNode::children).unwrap_or_default()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(TreeNode::parent)
    }

    /// The continuation child of `id`: the same actor's next operation within
    /// the handler, as recorded when `id` last completed.
    pub fn child_event(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(TreeNode::continuation)
    }

    pub fn withheld_send_indices(&self) -> &BTreeSet<u64> {
        &self.withheld_send_indices
    }

    pub fn is_withheld(&self, send_index: u64) -> bool {
        self.withheld_send_indices.contains(&send_index)
    }

    pub fn record_withheld(&mut self, send_index: u64) {
        self.withheld_send_indices.insert(send_index);
    }

    /// Set the root from the harness actor's Start node. A retained tree
    /// keeps its root when the harness matches.
    pub fn initialize_with_root(&mut self, node: TreeNode) -> Result<NodeId, ModelError> {
        if let Some(root) = self.root {
            let existing = self.node(root).ok_or(ModelError::UnknownNode(root))?;
            if !existing.same_position(&node) {
                return Err(ModelError::RootMismatch {
                    existing: existing.source_actor,
                    found: node.source_actor,
                });
            }
            return Ok(root);
        }
        let id = self.insert(node, None);
        self.root = Some(id);
        Ok(id)
    }

    /// Mark `id` as the node being executed.
    pub fn start_schedule_choice(&mut self, id: NodeId) -> Result<(), ModelError> {
        let ordering = self.next_ordering_index;
        let node = self.node_mut(id).ok_or(ModelError::UnknownNode(id))?;
        // Choices belong to one visit; a revisit records them afresh.
        if node.visits > 0 {
            node.recorded_choices.clear();
        }
        node.visits += 1;
        if node.total_ordering_index.is_none() {
            node.total_ordering_index = Some(ordering);
            self.next_ordering_index += 1;
        }
        self.current = Some(id);
        Ok(())
    }

    /// Attach the nodes derived from running `current`.
    ///
    /// `created` (a Start or Receive node) becomes a child of `current`.
    /// `continuation` becomes a child as well and is remembered as the node
    /// [`EventTree::child_event`] returns; without one, `current` has no
    /// forced continuation.
    pub fn complete_schedule_choice(
        &mut self,
        current: NodeId,
        continuation: Option<TreeNode>,
        created: Option<TreeNode>,
    ) -> Result<Completion, ModelError> {
        if self.node(current).is_none() {
            return Err(ModelError::UnknownNode(current));
        }
        let created = created.map(|n| self.attach_or_reuse(current, n));
        let continuation = continuation.map(|n| self.attach_or_reuse(current, n));
        if let Some(node) = self.node_mut(current) {
            node.continuation = continuation;
        }
        if self.current == Some(current) {
            self.current = None;
        }
        Ok(Completion {
            continuation,
            created,
        })
    }

    /// Clear per-iteration bookkeeping while keeping every node.
    pub fn begin_iteration(&mut self) {
        self.current = None;
        self.withheld_send_indices.clear();
    }

    /// Node ids in depth-first pre-order from the root.
    pub fn depth_first(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        order
    }

    pub fn to_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a persisted tree, rejecting arenas whose links do not form a
    /// tree rooted at `root`.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let tree: EventTree = serde_json::from_str(json)?;
        tree.check_links()?;
        Ok(tree)
    }

    /// Every node is reached exactly once from the root, and parent,
    /// children and continuation links agree.
    fn check_links(&self) -> Result<(), ModelError> {
        let Some(root) = self.root else {
            return match self.nodes.first() {
                Some(_) => Err(ModelError::MalformedNode {
                    node: NodeId(0),
                    reason: "nodes without a root",
                }),
                None => Ok(()),
            };
        };
        let root_node = self.node(root).ok_or(ModelError::UnknownNode(root))?;
        if root_node.parent.is_some() {
            return Err(ModelError::MalformedNode {
                node: root,
                reason: "root has a parent",
            });
        }

        let mut seen = vec![false; self.nodes.len()];
        seen[root.0] = true;
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            for &child in &node.children {
                let child_node = self.node(child).ok_or(ModelError::UnknownNode(child))?;
                if child_node.parent != Some(id) {
                    return Err(ModelError::MalformedNode {
                        node: child,
                        reason: "child does not point back to its parent",
                    });
                }
                if seen[child.0] {
                    return Err(ModelError::MalformedNode {
                        node: child,
                        reason: "node reached twice",
                    });
                }
                seen[child.0] = true;
                stack.push(child);
            }
            if let Some(c) = node.continuation {
                if !node.children.contains(&c) {
                    return Err(ModelError::MalformedNode {
                        node: id,
                        reason: "continuation is not a child",
                    });
                }
            }
        }

        match seen.iter().position(|s| !s) {
            Some(i) => Err(ModelError::MalformedNode {
                node: NodeId(i),
                reason: "node unreachable from root",
            }),
            None => Ok(()),
        }
    }

    fn attach_or_reuse(&mut self, parent: NodeId, node: TreeNode) -> NodeId {
        let existing = self
            .children(parent)
            .iter()
            .copied()
            .find(|&c| self.nodes[c.0].same_position(&node));
        match existing {
            Some(id) => {
                let reused = &mut self.nodes[id.0];
                if node.matching_send_index.is_some() {
                    reused.matching_send_index = node.matching_send_index;
                }
                if reused.target_actor.is_none() {
                    reused.target_actor = node.target_actor;
                }
                id
            }
            None => self.insert(node, Some(parent)),
        }
    }

    fn insert(&mut self, mut node: TreeNode, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = parent;
        node.children.clear();
        node.continuation = None;
        self.nodes.push(node);
        if let Some(p) = parent {
            self.nodes[p.0].children.push(id);
        }
        id
    }
}
