use crate::graph::{Graph, GraphError, GraphResult, InputSlot, NodeId, Operation, OutputSlot};
use crate::optimizer::{filters, AppliedRewrite, RewriteRule};

use super::{bypass_pair, parent_of, producer_of, related};

/// Folds `reshape(reshape(x))` into a single reshape of `x`, or drops both
/// when the outer reshape restores the original descriptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimizeConsecutiveReshapes;

impl RewriteRule for OptimizeConsecutiveReshapes {
    fn name(&self) -> &'static str {
        "OptimizeConsecutiveReshapes"
    }

    fn matches_operation(&self, op: &Operation) -> bool {
        filters::reshape(op)
    }

    fn matches(&self, graph: &Graph, node: NodeId) -> bool {
        graph
            .node(node)
            .and_then(|child| producer_of(graph, child))
            .is_some_and(|parent| matches!(parent.operation(), Operation::Reshape(_)))
    }

    fn apply(&self, graph: &mut Graph, node: NodeId) -> GraphResult<AppliedRewrite> {
        let parent = parent_of(graph, node)?;
        let source_slot = InputSlot::new(parent, 0);
        let restores_source = {
            let before = graph.input_descriptor(source_slot);
            let after = graph.output_descriptor(OutputSlot::new(node, 0));
            before.is_some() && before == after
        };

        if restores_source {
            return Ok(AppliedRewrite {
                rule: self.name(),
                replaced: bypass_pair(graph, parent, node)?,
                replacement: None,
            });
        }

        // Reading straight from the source keeps the outer target shape valid:
        // both reshapes preserve the element count.
        let source = graph
            .producer(source_slot)?
            .ok_or(GraphError::UnconnectedSlot { slot: source_slot })?;
        let child_slot = InputSlot::new(node, 0);
        graph.disconnect(child_slot)?;
        graph.connect(source, child_slot)?;

        let mut replaced = Vec::new();
        if !graph.try_node(parent)?.has_consumers() {
            graph.add_related(node, parent)?;
            replaced.push(related(graph.try_node(parent)?));
            graph.remove(parent)?;
        }
        Ok(AppliedRewrite {
            rule: self.name(),
            replaced,
            replacement: Some(node),
        })
    }
}
