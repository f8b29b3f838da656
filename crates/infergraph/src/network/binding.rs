use std::fmt;

use serde::Serialize;

use crate::graph::{LayerBindingId, NodeId};
use crate::tensor::TensorDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingDirection {
    Input,
    Output,
}

impl fmt::Display for BindingDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BindingDirection::Input => "input",
            BindingDirection::Output => "output",
        })
    }
}

/// A named boundary tensor: the caller binds memory to it by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindingDescriptor {
    pub name: String,
    pub id: LayerBindingId,
    pub descriptor: TensorDescriptor,
    #[serde(skip)]
    pub node: NodeId,
}

/// Input and output boundary tensors of a graph, in node insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BindingTable {
    inputs: Vec<BindingDescriptor>,
    outputs: Vec<BindingDescriptor>,
}

impl BindingTable {
    pub(crate) fn new(inputs: Vec<BindingDescriptor>, outputs: Vec<BindingDescriptor>) -> Self {
        Self { inputs, outputs }
    }

    pub fn inputs(&self) -> &[BindingDescriptor] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[BindingDescriptor] {
        &self.outputs
    }

    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|binding| binding.name == name)
    }

    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|binding| binding.name == name)
    }

    pub fn input(&self, name: &str) -> Option<&BindingDescriptor> {
        self.input_index(name).map(|index| &self.inputs[index])
    }

    pub fn output(&self, name: &str) -> Option<&BindingDescriptor> {
        self.output_index(name).map(|index| &self.outputs[index])
    }

    pub(crate) fn input_position_of(&self, node: NodeId) -> Option<usize> {
        self.inputs.iter().position(|binding| binding.node == node)
    }

    pub(crate) fn output_position_of(&self, node: NodeId) -> Option<usize> {
        self.outputs.iter().position(|binding| binding.node == node)
    }
}
