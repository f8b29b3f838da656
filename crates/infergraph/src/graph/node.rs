use std::fmt;

use smallvec::SmallVec;

use super::operation::{Operation, OperationKind};
use crate::tensor::TensorDescriptor;

/// Stable identifier of a node. Identifiers are never reused after removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct NodeId(pub u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Input position `index` of `node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputSlot {
    pub node: NodeId,
    pub index: usize,
}

impl InputSlot {
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

impl fmt::Display for InputSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.in[{}]", self.node, self.index)
    }
}

/// Output position `index` of `node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputSlot {
    pub node: NodeId,
    pub index: usize,
}

impl OutputSlot {
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

impl fmt::Display for OutputSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.out[{}]", self.node, self.index)
    }
}

/// Identity of a node superseded by a rewrite, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedNode {
    pub id: NodeId,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct OutputPort {
    pub(crate) descriptor: Option<TensorDescriptor>,
    pub(crate) consumers: SmallVec<[InputSlot; 2]>,
}

/// A single operation in the graph together with its connections.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) operation: Operation,
    pub(crate) inputs: SmallVec<[Option<OutputSlot>; 2]>,
    pub(crate) outputs: SmallVec<[OutputPort; 1]>,
    pub(crate) seq: u64,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: String, operation: Operation, seq: u64) -> Self {
        let kind = operation.kind();
        Self {
            id,
            name,
            operation,
            inputs: SmallVec::from_elem(None, kind.num_inputs()),
            outputs: (0..kind.num_outputs())
                .map(|_| OutputPort::default())
                .collect(),
            seq,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }

    /// Insertion sequence number; breaks ties in topological order.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Producer connected to each input slot, `None` while unconnected.
    pub fn inputs(&self) -> &[Option<OutputSlot>] {
        &self.inputs
    }

    pub fn input(&self, index: usize) -> Option<OutputSlot> {
        self.inputs.get(index).copied().flatten()
    }

    pub fn output_descriptor(&self, index: usize) -> Option<&TensorDescriptor> {
        self.outputs.get(index)?.descriptor.as_ref()
    }

    /// Consumers of output `index`, in connection order.
    pub fn consumers(&self, index: usize) -> &[InputSlot] {
        self.outputs
            .get(index)
            .map(|port| port.consumers.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_consumers(&self) -> bool {
        self.outputs.iter().any(|port| !port.consumers.is_empty())
    }

    pub fn input_slot(&self, index: usize) -> InputSlot {
        InputSlot::new(self.id, index)
    }

    pub fn output_slot(&self, index: usize) -> OutputSlot {
        OutputSlot::new(self.id, index)
    }
}
