use crate::graph::{
    Graph, GraphError, GraphResult, InputSlot, NodeId, Operation, OutputSlot, ReshapeDescriptor,
};
use crate::optimizer::{filters, AppliedRewrite, RewriteRule};

use super::{is_layout_preserving, related};

/// Replaces the transpose or permute `node` by a reshape producing the same
/// output descriptor, named after the node it supersedes.
fn replace_with_reshape(
    graph: &mut Graph,
    node: NodeId,
    rule: &'static str,
) -> GraphResult<AppliedRewrite> {
    let (name, descriptor) = {
        let old = graph.try_node(node)?;
        let descriptor = old
            .output_descriptor(0)
            .cloned()
            .ok_or_else(|| GraphError::MissingDescriptor {
                node,
                name: old.name().to_string(),
                index: 0,
            })?;
        (old.name().to_string(), descriptor)
    };

    let reshape = graph.insert(
        InputSlot::new(node, 0),
        Operation::Reshape(ReshapeDescriptor::new(descriptor.shape().clone())),
        format!("merged-{name}-into-reshape"),
        descriptor,
    )?;
    graph.move_all_connections(OutputSlot::new(node, 0), OutputSlot::new(reshape, 0))?;
    graph.add_related(reshape, node)?;
    let replaced = vec![related(graph.try_node(node)?)];
    graph.remove(node)?;

    Ok(AppliedRewrite {
        rule,
        replaced,
        replacement: Some(reshape),
    })
}

/// Input dims of a single-input node, paired with its output descriptor being present.
fn input_dims(graph: &Graph, node: NodeId) -> Option<&[usize]> {
    let node = graph.node(node)?;
    node.output_descriptor(0)?;
    Some(graph.input_descriptor(node.input_slot(0))?.shape().dims())
}

/// Turns a transpose that does not reorder data into a reshape.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransposeAsReshape;

impl RewriteRule for TransposeAsReshape {
    fn name(&self) -> &'static str {
        "TransposeAsReshape"
    }

    fn matches_operation(&self, op: &Operation) -> bool {
        filters::transpose(op)
    }

    fn matches(&self, graph: &Graph, node: NodeId) -> bool {
        let Some(Operation::Transpose(desc)) = graph.node(node).map(|n| n.operation()) else {
            return false;
        };
        input_dims(graph, node)
            .is_some_and(|dims| is_layout_preserving(dims, desc.permutation.as_slice()))
    }

    fn apply(&self, graph: &mut Graph, node: NodeId) -> GraphResult<AppliedRewrite> {
        replace_with_reshape(graph, node, self.name())
    }
}

/// Turns a permute that does not reorder data into a reshape.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermuteAsReshape;

impl RewriteRule for PermuteAsReshape {
    fn name(&self) -> &'static str {
        "PermuteAsReshape"
    }

    fn matches_operation(&self, op: &Operation) -> bool {
        filters::permute(op)
    }

    fn matches(&self, graph: &Graph, node: NodeId) -> bool {
        let Some(Operation::Permute(desc)) = graph.node(node).map(|n| n.operation()) else {
            return false;
        };
        // Output axis j of a permute reads input axis inverse[j].
        let source_axes = desc.mappings.inverse();
        input_dims(graph, node)
            .is_some_and(|dims| is_layout_preserving(dims, source_axes.as_slice()))
    }

    fn apply(&self, graph: &mut Graph, node: NodeId) -> GraphResult<AppliedRewrite> {
        replace_with_reshape(graph, node, self.name())
    }
}
