use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::node::{Node, NodeId};
use super::operation::Operation;
use super::{Graph, GraphError, GraphResult};

/// Lazy topological walk over a [`Graph`] (Kahn's algorithm).
///
/// Among nodes whose producers have all been yielded, the one inserted
/// earliest comes first, so the order is fully determined by the graph state.
pub struct TopologicalIter<'g> {
    graph: &'g Graph,
    pending: Vec<usize>,
    ready: BinaryHeap<Reverse<(u64, NodeId)>>,
}

impl<'g> TopologicalIter<'g> {
    fn new(graph: &'g Graph) -> Self {
        let mut pending = vec![0; graph.nodes.len()];
        let mut ready = BinaryHeap::new();
        for node in graph.nodes.iter().flatten() {
            let connected = node.inputs.iter().filter(|input| input.is_some()).count();
            pending[node.id.index()] = connected;
            if connected == 0 {
                ready.push(Reverse((node.seq, node.id)));
            }
        }
        Self {
            graph,
            pending,
            ready,
        }
    }
}

impl<'g> Iterator for TopologicalIter<'g> {
    type Item = &'g Node;

    fn next(&mut self) -> Option<&'g Node> {
        let Reverse((_, id)) = self.ready.pop()?;
        let node = self.graph.node(id)?;
        for port in &node.outputs {
            for consumer in &port.consumers {
                let count = &mut self.pending[consumer.node.index()];
                *count -= 1;
                if *count == 0 {
                    if let Some(next) = self.graph.node(consumer.node) {
                        self.ready.push(Reverse((next.seq, next.id)));
                    }
                }
            }
        }
        Some(node)
    }
}

impl Graph {
    /// Iterates live nodes in topological order. Each call starts a fresh walk.
    pub fn iter(&self) -> TopologicalIter<'_> {
        TopologicalIter::new(self)
    }

    pub fn topological_order(&self) -> Vec<NodeId> {
        self.iter().map(Node::id).collect()
    }

    /// Checks that the graph is complete and consistent enough to execute.
    pub fn validate(&self) -> GraphResult<()> {
        for node in self.nodes() {
            if let Some(index) = node.inputs.iter().position(Option::is_none) {
                return Err(GraphError::DanglingInput {
                    node: node.id,
                    name: node.name.clone(),
                    index,
                });
            }
            if let Some(index) = node.outputs.iter().position(|port| port.descriptor.is_none()) {
                return Err(GraphError::MissingDescriptor {
                    node: node.id,
                    name: node.name.clone(),
                    index,
                });
            }
        }
        if self.iter().count() != self.len() {
            return Err(GraphError::Cycle);
        }
        for node in self.nodes() {
            self.check_operation(node)?;
        }
        self.binding_table()?;
        Ok(())
    }

    /// Checks a fully connected node's parameters against its tensors.
    fn check_operation(&self, node: &Node) -> GraphResult<()> {
        let invalid = |reason: String| GraphError::InvalidOperation {
            node: node.id,
            name: node.name.clone(),
            reason,
        };
        let input = |index: usize| self.input_descriptor(node.input_slot(index));
        let output = node.output_descriptor(0);

        match (&node.operation, input(0), output) {
            (Operation::Permute(desc), Some(input), Some(output)) => {
                let expected = desc.output_shape(input.shape()).transpose()?;
                if expected.as_ref() != Some(output.shape()) {
                    return Err(invalid(format!(
                        "permute {:?} of {} cannot produce {}",
                        desc.mappings.as_slice(),
                        input.shape(),
                        output.shape()
                    )));
                }
            }
            (Operation::Transpose(desc), Some(input), Some(output)) => {
                let expected = desc.output_shape(input.shape()).transpose()?;
                if expected.as_ref() != Some(output.shape()) {
                    return Err(invalid(format!(
                        "transpose {:?} of {} cannot produce {}",
                        desc.permutation.as_slice(),
                        input.shape(),
                        output.shape()
                    )));
                }
            }
            (Operation::Reshape(desc), Some(input), Some(output)) => {
                if desc.target_shape != *output.shape()
                    || input.num_elements() != output.num_elements()
                {
                    return Err(invalid(format!(
                        "reshape of {} to {} does not preserve the element count",
                        input.shape(),
                        desc.target_shape
                    )));
                }
            }
            (Operation::Addition, Some(lhs), Some(output)) => {
                let rhs = input(1);
                if rhs.map(|rhs| rhs.shape()) != Some(lhs.shape()) || lhs.shape() != output.shape()
                {
                    return Err(invalid(
                        "addition operands and result must share one shape".to_string(),
                    ));
                }
            }
            _ => return Ok(()),
        }

        let same_type = node
            .inputs
            .iter()
            .filter_map(|slot| slot.and_then(|slot| self.output_descriptor(slot)))
            .chain(output)
            .all(|desc| Some(desc.data_type()) == output.map(|out| out.data_type()));
        if !same_type {
            return Err(invalid(
                "inputs and outputs must share one data type".to_string(),
            ));
        }
        Ok(())
    }
}
