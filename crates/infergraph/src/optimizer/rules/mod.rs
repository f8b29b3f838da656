//! Built-in rewrite rules.

mod as_reshape;
mod inverse;
mod reshape_chain;

pub use as_reshape::{PermuteAsReshape, TransposeAsReshape};
pub use inverse::{OptimizeInversePermutes, OptimizeInverseTransposes};
pub use reshape_chain::OptimizeConsecutiveReshapes;

use crate::graph::{
    Graph, GraphError, GraphResult, InputSlot, Node, NodeId, OutputSlot, RelatedNode,
};

use super::{FrozenRuleSet, RuleSet};

/// The standard rule list, in application order.
pub fn default_rules() -> FrozenRuleSet {
    let mut rules = RuleSet::new();
    rules
        .add(OptimizeConsecutiveReshapes)
        .add(OptimizeInversePermutes)
        .add(OptimizeInverseTransposes)
        .add(PermuteAsReshape)
        .add(TransposeAsReshape);
    rules.freeze()
}

/// Returns true when moving axes with `permutation` (output axis `j` reads
/// input axis `permutation[j]`) leaves the row-major element order of `dims`
/// unchanged: the non-unit input axes must keep their relative order.
///
/// A documented special case rather than a general layout analysis: it is
/// the only criterion the reshape rules apply, and permutations that move
/// data are never rewritten.
pub(crate) fn is_layout_preserving(dims: &[usize], permutation: &[usize]) -> bool {
    if dims.len() != permutation.len() {
        return false;
    }
    let mut last: Option<usize> = None;
    for &axis in permutation {
        if dims[axis] == 1 {
            continue;
        }
        if last.is_some_and(|prev| prev > axis) {
            return false;
        }
        last = Some(axis);
    }
    true
}

/// Node feeding input slot 0 of `node`.
pub(crate) fn producer_of<'g>(graph: &'g Graph, node: &Node) -> Option<&'g Node> {
    graph.node(node.input(0)?.node)
}

/// Node feeding input slot 0 of `node`, as an error when unconnected.
pub(crate) fn parent_of(graph: &Graph, node: NodeId) -> GraphResult<NodeId> {
    let slot = InputSlot::new(node, 0);
    graph
        .producer(slot)?
        .map(|producer| producer.node)
        .ok_or(GraphError::UnconnectedSlot { slot })
}

pub(crate) fn related(node: &Node) -> RelatedNode {
    RelatedNode {
        id: node.id(),
        name: node.name().to_string(),
    }
}

/// Reconnects every consumer of `child` to whatever feeds `parent`, then
/// removes `child` and, once it is unused, `parent`. Returns the removed nodes.
pub(crate) fn bypass_pair(
    graph: &mut Graph,
    parent: NodeId,
    child: NodeId,
) -> GraphResult<Vec<RelatedNode>> {
    let slot = InputSlot::new(parent, 0);
    let source = graph
        .producer(slot)?
        .ok_or(GraphError::UnconnectedSlot { slot })?;
    graph.move_all_connections(OutputSlot::new(child, 0), source)?;

    let mut replaced = vec![related(graph.try_node(child)?)];
    graph.remove(child)?;
    if !graph.try_node(parent)?.has_consumers() {
        replaced.push(related(graph.try_node(parent)?));
        graph.remove(parent)?;
    }
    Ok(replaced)
}
