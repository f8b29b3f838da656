//! Arena-backed computation graph.
//!
//! Nodes live in a slot vector indexed by [`NodeId`]; a removed node leaves a
//! hole so identifiers stay stable for the whole lifetime of the graph. Every
//! connecting mutation rejects edges that would close a cycle, so the graph is
//! a DAG after each successful call.

mod node;
pub mod operation;
mod topology;

use std::collections::HashMap;

use thiserror::Error;

pub use node::{InputSlot, Node, NodeId, OutputSlot, RelatedNode};
pub use operation::{
    LayerBindingId, Operation, OperationKind, PermutationVector, PermuteDescriptor,
    ReshapeDescriptor, TransposeDescriptor,
};
pub use topology::TopologicalIter;

use crate::network::{BindingDescriptor, BindingDirection, BindingTable};
use crate::tensor::{DescriptorError, TensorDescriptor};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),
    #[error("input slot {slot} does not exist")]
    UnknownInputSlot { slot: InputSlot },
    #[error("output slot {slot} does not exist")]
    UnknownOutputSlot { slot: OutputSlot },
    #[error("input slot {slot} is already connected to {producer}")]
    SlotAlreadyConnected { slot: InputSlot, producer: OutputSlot },
    #[error("input slot {slot} is not connected")]
    UnconnectedSlot { slot: InputSlot },
    #[error("connecting {from} to {to} would create a cycle")]
    WouldCreateCycle { from: OutputSlot, to: InputSlot },
    #[error("node {node} ('{name}') has an unconnected input slot {index}")]
    DanglingInput {
        node: NodeId,
        name: String,
        index: usize,
    },
    #[error("node {node} ('{name}') output {index} has no tensor descriptor")]
    MissingDescriptor {
        node: NodeId,
        name: String,
        index: usize,
    },
    #[error("graph contains a cycle")]
    Cycle,
    #[error("node {node} ('{name}') still has consumers")]
    NodeHasConsumers { node: NodeId, name: String },
    #[error("{kind} binding id {id} is used by more than one node")]
    DuplicateBindingId { kind: OperationKind, id: LayerBindingId },
    #[error("{direction} name '{name}' is used by more than one boundary node")]
    DuplicateBoundaryName {
        direction: BindingDirection,
        name: String,
    },
    #[error("node {node} ('{name}') is inconsistent with its tensors: {reason}")]
    InvalidOperation {
        node: NodeId,
        name: String,
        reason: String,
    },
    #[error("layer '{referenced_by}' references unknown layer '{layer}'")]
    UnknownLayer { layer: String, referenced_by: String },
    #[error("layer name '{0}' is used more than once")]
    DuplicateLayerName(String),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Directed acyclic multigraph of tensor operations.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Option<Node>>,
    live: usize,
    next_seq: u64,
    related: HashMap<NodeId, Vec<RelatedNode>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    pub fn try_node(&self, id: NodeId) -> GraphResult<&Node> {
        self.node(id).ok_or(GraphError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> GraphResult<&mut Node> {
        self.nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(GraphError::UnknownNode(id))
    }

    /// Live nodes in insertion order.
    ///
    /// Ids are allocated in the same order as sequence numbers, so the arena
    /// is already sorted.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter().flatten()
    }

    /// First live node with the given name, in insertion order.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes()
            .find(|node| node.name == name)
            .map(|node| node.id)
    }

    /// Appends a node whose slots are all unconnected.
    pub fn add_node(&mut self, operation: Operation, name: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.nodes
            .push(Some(Node::new(id, name.into(), operation, seq)));
        self.live += 1;
        id
    }

    fn check_input(&self, slot: InputSlot) -> GraphResult<Option<OutputSlot>> {
        let node = self.try_node(slot.node)?;
        node.inputs
            .get(slot.index)
            .copied()
            .ok_or(GraphError::UnknownInputSlot { slot })
    }

    fn check_output(&self, slot: OutputSlot) -> GraphResult<&Node> {
        let node = self.try_node(slot.node)?;
        if slot.index >= node.outputs.len() {
            return Err(GraphError::UnknownOutputSlot { slot });
        }
        Ok(node)
    }

    /// Producer feeding `slot`, if connected.
    pub fn producer(&self, slot: InputSlot) -> GraphResult<Option<OutputSlot>> {
        self.check_input(slot)
    }

    pub fn consumers(&self, slot: OutputSlot) -> GraphResult<&[InputSlot]> {
        let node = self.check_output(slot)?;
        Ok(node.consumers(slot.index))
    }

    /// Descriptor of the tensor flowing into `slot`.
    pub fn input_descriptor(&self, slot: InputSlot) -> Option<&TensorDescriptor> {
        let producer = self.check_input(slot).ok().flatten()?;
        self.output_descriptor(producer)
    }

    pub fn output_descriptor(&self, slot: OutputSlot) -> Option<&TensorDescriptor> {
        self.node(slot.node)?.output_descriptor(slot.index)
    }

    pub fn set_output_descriptor(
        &mut self,
        slot: OutputSlot,
        descriptor: TensorDescriptor,
    ) -> GraphResult<()> {
        self.check_output(slot)?;
        let node = self.node_mut(slot.node)?;
        node.outputs[slot.index].descriptor = Some(descriptor);
        Ok(())
    }

    /// Returns true when `target` can be reached from `start` along data edges.
    fn reaches(&self, start: NodeId, target: NodeId) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if std::mem::replace(&mut visited[current.index()], true) {
                continue;
            }
            if let Some(node) = self.node(current) {
                for port in &node.outputs {
                    stack.extend(port.consumers.iter().map(|slot| slot.node));
                }
            }
        }
        false
    }

    pub fn connect(&mut self, from: OutputSlot, to: InputSlot) -> GraphResult<()> {
        self.check_output(from)?;
        if let Some(producer) = self.check_input(to)? {
            return Err(GraphError::SlotAlreadyConnected { slot: to, producer });
        }
        if self.reaches(to.node, from.node) {
            return Err(GraphError::WouldCreateCycle { from, to });
        }
        self.node_mut(to.node)?.inputs[to.index] = Some(from);
        self.node_mut(from.node)?.outputs[from.index]
            .consumers
            .push(to);
        Ok(())
    }

    /// Detaches `slot` from its producer and returns the former producer.
    pub fn disconnect(&mut self, slot: InputSlot) -> GraphResult<OutputSlot> {
        let producer = self
            .check_input(slot)?
            .ok_or(GraphError::UnconnectedSlot { slot })?;
        self.node_mut(slot.node)?.inputs[slot.index] = None;
        let consumers = &mut self.node_mut(producer.node)?.outputs[producer.index].consumers;
        if let Some(position) = consumers.iter().position(|consumer| *consumer == slot) {
            consumers.remove(position);
        }
        Ok(producer)
    }

    /// Inserts a single-input, single-output node immediately before `position`.
    ///
    /// The new node consumes whatever fed `position`, and `position` is rewired
    /// to consume the new node's output, which carries `descriptor`. The
    /// producer keeps its consumer ordering: the new node takes the place of
    /// `position` in the producer's consumer list.
    pub fn insert(
        &mut self,
        position: InputSlot,
        operation: Operation,
        name: impl Into<String>,
        descriptor: TensorDescriptor,
    ) -> GraphResult<NodeId> {
        let producer = self
            .check_input(position)?
            .ok_or(GraphError::UnconnectedSlot { slot: position })?;
        let kind = operation.kind();
        let name = name.into();
        if kind.num_inputs() != 1 || kind.num_outputs() != 1 {
            return Err(GraphError::InvalidOperation {
                node: position.node,
                name,
                reason: format!("cannot insert a {kind} node on a single edge"),
            });
        }

        let id = self.add_node(operation, name);
        let new_input = InputSlot::new(id, 0);
        let new_output = OutputSlot::new(id, 0);
        {
            let node = self.node_mut(id)?;
            node.inputs[0] = Some(producer);
            node.outputs[0].descriptor = Some(descriptor);
            node.outputs[0].consumers.push(position);
        }
        let consumers = &mut self.node_mut(producer.node)?.outputs[producer.index].consumers;
        if let Some(entry) = consumers.iter_mut().find(|consumer| **consumer == position) {
            *entry = new_input;
        }
        self.node_mut(position.node)?.inputs[position.index] = Some(new_output);
        Ok(id)
    }

    /// Moves every consumer of `from` onto `to`, preserving consumer order.
    pub fn move_all_connections(&mut self, from: OutputSlot, to: OutputSlot) -> GraphResult<()> {
        self.check_output(from)?;
        self.check_output(to)?;
        if from == to {
            return Ok(());
        }
        let moved = self.consumers(from)?.to_vec();
        if let Some(slot) = moved.iter().find(|slot| self.reaches(slot.node, to.node)) {
            return Err(GraphError::WouldCreateCycle { from: to, to: *slot });
        }
        self.node_mut(from.node)?.outputs[from.index]
            .consumers
            .clear();
        for slot in &moved {
            self.node_mut(slot.node)?.inputs[slot.index] = Some(to);
        }
        self.node_mut(to.node)?.outputs[to.index]
            .consumers
            .extend(moved);
        Ok(())
    }

    /// Deletes a node that no longer has consumers, disconnecting its inputs.
    pub fn remove(&mut self, id: NodeId) -> GraphResult<Node> {
        let node = self.try_node(id)?;
        if node.has_consumers() {
            return Err(GraphError::NodeHasConsumers {
                node: id,
                name: node.name.clone(),
            });
        }
        for index in 0..node.num_inputs() {
            let slot = InputSlot::new(id, index);
            if self.check_input(slot)?.is_some() {
                self.disconnect(slot)?;
            }
        }
        let removed = self.nodes[id.index()]
            .take()
            .ok_or(GraphError::UnknownNode(id))?;
        self.live -= 1;
        self.related.remove(&id);
        Ok(removed)
    }

    /// Records that `replacement` supersedes `superseded`.
    ///
    /// Anything `superseded` already replaced is carried over, so the side
    /// table keeps the full history after chained rewrites.
    pub fn add_related(&mut self, replacement: NodeId, superseded: NodeId) -> GraphResult<()> {
        self.try_node(replacement)?;
        let node = self.try_node(superseded)?;
        let mut entries = vec![RelatedNode {
            id: superseded,
            name: node.name.clone(),
        }];
        if let Some(history) = self.related.get(&superseded) {
            entries.extend(history.iter().cloned());
        }
        self.related.entry(replacement).or_default().extend(entries);
        Ok(())
    }

    /// Nodes superseded by `node` through rewrites; empty for original nodes.
    pub fn related_nodes(&self, node: NodeId) -> &[RelatedNode] {
        self.related
            .get(&node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Boundary tensors of the graph, in insertion order of their nodes.
    pub fn binding_table(&self) -> GraphResult<BindingTable> {
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for node in self.nodes() {
            match node.operation {
                Operation::Input { binding_id } => {
                    let descriptor = node.output_descriptor(0).cloned().ok_or_else(|| {
                        GraphError::MissingDescriptor {
                            node: node.id,
                            name: node.name.clone(),
                            index: 0,
                        }
                    })?;
                    if inputs.iter().any(|b: &BindingDescriptor| b.id == binding_id) {
                        return Err(GraphError::DuplicateBindingId {
                            kind: OperationKind::Input,
                            id: binding_id,
                        });
                    }
                    if inputs.iter().any(|b| b.name == node.name) {
                        return Err(GraphError::DuplicateBoundaryName {
                            direction: BindingDirection::Input,
                            name: node.name.clone(),
                        });
                    }
                    inputs.push(BindingDescriptor {
                        name: node.name.clone(),
                        id: binding_id,
                        descriptor,
                        node: node.id,
                    });
                }
                Operation::Output { binding_id } => {
                    let descriptor = self
                        .input_descriptor(node.input_slot(0))
                        .cloned()
                        .ok_or_else(|| GraphError::DanglingInput {
                            node: node.id,
                            name: node.name.clone(),
                            index: 0,
                        })?;
                    if outputs.iter().any(|b: &BindingDescriptor| b.id == binding_id) {
                        return Err(GraphError::DuplicateBindingId {
                            kind: OperationKind::Output,
                            id: binding_id,
                        });
                    }
                    if outputs.iter().any(|b| b.name == node.name) {
                        return Err(GraphError::DuplicateBoundaryName {
                            direction: BindingDirection::Output,
                            name: node.name.clone(),
                        });
                    }
                    outputs.push(BindingDescriptor {
                        name: node.name.clone(),
                        id: binding_id,
                        descriptor,
                        node: node.id,
                    });
                }
                _ => {}
            }
        }
        Ok(BindingTable::new(inputs, outputs))
    }
}
