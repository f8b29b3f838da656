use crate::graph::{Graph, GraphResult, NodeId, Operation};
use crate::optimizer::{filters, AppliedRewrite, RewriteRule};

use super::{bypass_pair, parent_of, producer_of};

/// Returns the producer of `node` when the pair is a no-op round trip.
///
/// `is_inverse(parent_op, child_op)` decides whether the two parameter sets
/// cancel; the descriptors on either side of the pair must also match exactly.
fn inverse_parent(
    graph: &Graph,
    node: NodeId,
    is_inverse: impl Fn(&Operation, &Operation) -> bool,
) -> Option<NodeId> {
    let child = graph.node(node)?;
    let parent = producer_of(graph, child)?;
    if !is_inverse(parent.operation(), child.operation()) {
        return None;
    }
    let before = graph.input_descriptor(parent.input_slot(0))?;
    let after = child.output_descriptor(0)?;
    (before == after).then_some(parent.id())
}

fn transposes_cancel(parent: &Operation, child: &Operation) -> bool {
    let (Operation::Transpose(first), Operation::Transpose(second)) = (parent, child) else {
        return false;
    };
    let (first, second) = (first.permutation.as_slice(), second.permutation.as_slice());
    first.len() == second.len()
        && second
            .iter()
            .enumerate()
            .all(|(axis, &read)| first[read] == axis)
}

fn permutes_cancel(parent: &Operation, child: &Operation) -> bool {
    let (Operation::Permute(first), Operation::Permute(second)) = (parent, child) else {
        return false;
    };
    let (first, second) = (first.mappings.as_slice(), second.mappings.as_slice());
    first.len() == second.len()
        && first
            .iter()
            .enumerate()
            .all(|(axis, &moved_to)| second[moved_to] == axis)
}

/// Removes a transpose immediately undone by the transpose it feeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimizeInverseTransposes;

impl RewriteRule for OptimizeInverseTransposes {
    fn name(&self) -> &'static str {
        "OptimizeInverseTransposes"
    }

    fn matches_operation(&self, op: &Operation) -> bool {
        filters::transpose(op)
    }

    fn matches(&self, graph: &Graph, node: NodeId) -> bool {
        inverse_parent(graph, node, transposes_cancel).is_some()
    }

    fn apply(&self, graph: &mut Graph, node: NodeId) -> GraphResult<AppliedRewrite> {
        let parent = parent_of(graph, node)?;
        Ok(AppliedRewrite {
            rule: self.name(),
            replaced: bypass_pair(graph, parent, node)?,
            replacement: None,
        })
    }
}

/// Removes a permute immediately undone by the permute it feeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimizeInversePermutes;

impl RewriteRule for OptimizeInversePermutes {
    fn name(&self) -> &'static str {
        "OptimizeInversePermutes"
    }

    fn matches_operation(&self, op: &Operation) -> bool {
        filters::permute(op)
    }

    fn matches(&self, graph: &Graph, node: NodeId) -> bool {
        inverse_parent(graph, node, permutes_cancel).is_some()
    }

    fn apply(&self, graph: &mut Graph, node: NodeId) -> GraphResult<AppliedRewrite> {
        let parent = parent_of(graph, node)?;
        Ok(AppliedRewrite {
            rule: self.name(),
            replaced: bypass_pair(graph, parent, node)?,
            replacement: None,
        })
    }
}
