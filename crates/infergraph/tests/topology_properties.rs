//! Property-based tests for graph iteration order.
//!
//! Random DAGs are inserted in shuffled order so that insertion order and data
//! dependencies disagree as often as possible.

use std::collections::HashMap;

use infergraph::graph::{
    Graph, GraphError, InputSlot, NodeId, Operation, OutputSlot, ReshapeDescriptor,
};
use infergraph::tensor::TensorShape;
use proptest::prelude::*;
use proptest::sample::Index;

/// Logical node `i > 0` reads from `parents[i].0`, plus `parents[i].1` when
/// it is an addition. Node 0 is the only input.
#[derive(Debug, Clone)]
struct Dag {
    insertion: Vec<usize>,
    parents: Vec<(usize, Option<usize>)>,
}

fn arb_dag() -> impl Strategy<Value = Dag> {
    (2usize..16).prop_flat_map(|n| {
        let picks = proptest::collection::vec((any::<Index>(), any::<Index>(), any::<bool>()), n);
        let insertion = Just((0..n).collect::<Vec<_>>()).prop_shuffle();
        (picks, insertion).prop_map(|(picks, insertion)| {
            let parents = picks
                .iter()
                .enumerate()
                .map(|(node, (first, second, add))| {
                    if node == 0 {
                        (0, None)
                    } else {
                        let second = (*add && node >= 2).then(|| second.index(node));
                        (first.index(node), second)
                    }
                })
                .collect();
            Dag { insertion, parents }
        })
    })
}

fn build(dag: &Dag) -> (Graph, Vec<NodeId>) {
    let mut graph = Graph::new();
    let mut ids = vec![NodeId(0); dag.parents.len()];
    for &logical in &dag.insertion {
        let operation = match dag.parents[logical] {
            _ if logical == 0 => Operation::Input { binding_id: 0 },
            (_, Some(_)) => Operation::Addition,
            (_, None) => Operation::Reshape(ReshapeDescriptor::new(
                TensorShape::new(vec![1]).unwrap(),
            )),
        };
        ids[logical] = graph.add_node(operation, format!("n{logical}"));
    }
    for (logical, &(first, second)) in dag.parents.iter().enumerate().skip(1) {
        graph
            .connect(OutputSlot::new(ids[first], 0), InputSlot::new(ids[logical], 0))
            .unwrap();
        if let Some(second) = second {
            graph
                .connect(OutputSlot::new(ids[second], 0), InputSlot::new(ids[logical], 1))
                .unwrap();
        }
    }
    (graph, ids)
}

/// Every producer appears before each of its consumers, and every node once.
fn assert_topological(graph: &Graph) -> Result<(), TestCaseError> {
    let order = graph.topological_order();
    prop_assert_eq!(order.len(), graph.len());
    let position: HashMap<NodeId, usize> =
        order.iter().enumerate().map(|(pos, &id)| (id, pos)).collect();
    prop_assert_eq!(position.len(), order.len());
    for node in graph.nodes() {
        for producer in node.inputs().iter().flatten() {
            prop_assert!(position[&producer.node] < position[&node.id()]);
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn producers_precede_consumers(dag in arb_dag()) {
        let (graph, _) = build(&dag);
        assert_topological(&graph)?;
    }

    #[test]
    fn iteration_is_deterministic(dag in arb_dag()) {
        let (graph, _) = build(&dag);
        prop_assert_eq!(graph.topological_order(), graph.topological_order());
        let copy = graph.clone();
        prop_assert_eq!(copy.topological_order(), graph.topological_order());
    }

    #[test]
    fn order_survives_removing_sinks(dag in arb_dag()) {
        let (mut graph, ids) = build(&dag);
        let sinks: Vec<NodeId> = ids
            .iter()
            .copied()
            .filter(|&id| !graph.try_node(id).unwrap().has_consumers())
            .collect();
        for id in &sinks {
            graph.remove(*id).unwrap();
        }
        prop_assert_eq!(graph.len(), ids.len() - sinks.len());
        assert_topological(&graph)?;
    }

    #[test]
    fn closing_a_cycle_is_rejected(dag in arb_dag()) {
        let (mut graph, ids) = build(&dag);
        let last = ids.len() - 1;
        let (parent, _) = dag.parents[last];

        if parent != 0 {
            let slot = InputSlot::new(ids[parent], 0);
            graph.disconnect(slot).unwrap();
            let err = graph.connect(OutputSlot::new(ids[last], 0), slot).unwrap_err();
            prop_assert!(matches!(err, GraphError::WouldCreateCycle { .. }), "{err}");
        }

        let own = InputSlot::new(ids[last], 0);
        graph.disconnect(own).unwrap();
        let err = graph.connect(OutputSlot::new(ids[last], 0), own).unwrap_err();
        prop_assert!(matches!(err, GraphError::WouldCreateCycle { .. }), "{err}");
        prop_assert_eq!(graph.topological_order().len(), graph.len());
    }
}
