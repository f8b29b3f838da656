use infergraph::graph::{
    Graph, GraphResult, InputSlot, NodeId, Operation, OutputSlot, PermutationVector,
    PermuteDescriptor, ReshapeDescriptor, TransposeDescriptor,
};
use infergraph::optimizer::rules::TransposeAsReshape;
use infergraph::optimizer::{AppliedRewrite, RewriteRule, RuleSet};
use infergraph::tensor::{DataType, TensorDescriptor, TensorShape};
use infergraph::{default_rules, optimize, OperationKind, OptimizerOptions};

fn f32_desc(dims: &[usize]) -> TensorDescriptor {
    TensorDescriptor::from_dims(dims.to_vec(), DataType::Float32).unwrap()
}

fn transpose(perm: &[usize]) -> Operation {
    Operation::Transpose(TransposeDescriptor::new(
        PermutationVector::new(perm.to_vec()).unwrap(),
    ))
}

fn permute(mappings: &[usize]) -> Operation {
    Operation::Permute(PermuteDescriptor::new(
        PermutationVector::new(mappings.to_vec()).unwrap(),
    ))
}

fn reshape(dims: &[usize]) -> Operation {
    Operation::Reshape(ReshapeDescriptor::new(TensorShape::new(dims.to_vec()).unwrap()))
}

fn options() -> OptimizerOptions {
    OptimizerOptions {
        max_passes: 8,
        validate_each_rewrite: true,
    }
}

/// `input -> layers... -> output`, each layer given with its output dims.
fn chain(input_dims: &[usize], layers: &[(&str, Operation, &[usize])]) -> Graph {
    let mut graph = Graph::new();
    let input = graph.add_node(Operation::Input { binding_id: 0 }, "input");
    graph
        .set_output_descriptor(OutputSlot::new(input, 0), f32_desc(input_dims))
        .unwrap();
    let mut previous = input;
    for (name, operation, dims) in layers {
        let id = graph.add_node(operation.clone(), *name);
        graph
            .set_output_descriptor(OutputSlot::new(id, 0), f32_desc(dims))
            .unwrap();
        graph
            .connect(OutputSlot::new(previous, 0), InputSlot::new(id, 0))
            .unwrap();
        previous = id;
    }
    let output = graph.add_node(Operation::Output { binding_id: 0 }, "output");
    graph
        .connect(OutputSlot::new(previous, 0), InputSlot::new(output, 0))
        .unwrap();
    graph.validate().unwrap();
    graph
}

fn kinds(graph: &Graph) -> Vec<OperationKind> {
    graph.iter().map(|node| node.kind()).collect()
}

fn names(graph: &Graph) -> Vec<String> {
    graph.iter().map(|node| node.name().to_string()).collect()
}

#[test]
fn unit_axis_transpose_becomes_reshape() -> anyhow::Result<()> {
    let mut graph = chain(
        &[1, 2, 3, 1],
        &[("transpose", transpose(&[0, 3, 1, 2]), &[1, 1, 2, 3])],
    );
    let original = graph.find("transpose").unwrap();

    let report = optimize(&mut graph, &default_rules(), &options())?;

    assert!(report.converged);
    assert_eq!(report.passes.len(), 1);
    assert_eq!(
        kinds(&graph),
        [OperationKind::Input, OperationKind::Reshape, OperationKind::Output]
    );

    let reshape_id = graph.find("merged-transpose-into-reshape").unwrap();
    let node = graph.try_node(reshape_id)?;
    match node.operation() {
        Operation::Reshape(desc) => assert_eq!(desc.target_shape.dims(), [1, 1, 2, 3]),
        other => panic!("expected a reshape, got {other:?}"),
    }
    assert_eq!(node.output_descriptor(0), Some(&f32_desc(&[1, 1, 2, 3])));

    let related = graph.related_nodes(reshape_id);
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].name, "transpose");
    assert_eq!(related[0].id, original);
    assert!(!graph.contains(original));

    let applied: Vec<&AppliedRewrite> = report.rewrites().collect();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].rule, "TransposeAsReshape");
    assert_eq!(applied[0].replacement, Some(reshape_id));
    graph.validate()?;
    Ok(())
}

#[test]
fn optimizing_twice_changes_nothing() -> anyhow::Result<()> {
    let mut graph = chain(
        &[1, 2, 3, 1],
        &[("transpose", transpose(&[0, 3, 1, 2]), &[1, 1, 2, 3])],
    );
    optimize(&mut graph, &default_rules(), &options())?;
    let before = names(&graph);

    let report = optimize(&mut graph, &default_rules(), &options())?;
    assert!(report.converged);
    assert_eq!(report.total_rewrites(), 0);
    assert_eq!(report.passes.len(), 1);
    assert_eq!(names(&graph), before);
    Ok(())
}

#[test]
fn unit_axis_permute_becomes_reshape() -> anyhow::Result<()> {
    // Source axes of mappings [0, 2, 3, 1] are [0, 3, 1, 2].
    let mut graph = chain(
        &[1, 2, 3, 1],
        &[("permute", permute(&[0, 2, 3, 1]), &[1, 1, 2, 3])],
    );
    let report = optimize(&mut graph, &default_rules(), &options())?;

    assert!(report.converged);
    assert_eq!(names(&graph), ["input", "merged-permute-into-reshape", "output"]);
    assert_eq!(report.rewrites().next().map(|r| r.rule), Some("PermuteAsReshape"));
    Ok(())
}

#[test]
fn data_moving_transpose_is_kept() -> anyhow::Result<()> {
    let mut graph = chain(&[2, 3], &[("transpose", transpose(&[1, 0]), &[3, 2])]);
    let report = optimize(&mut graph, &default_rules(), &options())?;

    assert!(report.converged);
    assert_eq!(report.total_rewrites(), 0);
    assert_eq!(names(&graph), ["input", "transpose", "output"]);
    Ok(())
}

#[test]
fn inverse_transposes_cancel() -> anyhow::Result<()> {
    let mut graph = chain(
        &[2, 3, 4],
        &[
            ("t1", transpose(&[1, 2, 0]), &[3, 4, 2]),
            ("t2", transpose(&[2, 0, 1]), &[2, 3, 4]),
        ],
    );
    let report = optimize(&mut graph, &default_rules(), &options())?;

    assert!(report.converged);
    assert_eq!(names(&graph), ["input", "output"]);
    let applied = report.rewrites().next().unwrap();
    assert_eq!(applied.rule, "OptimizeInverseTransposes");
    let replaced: Vec<&str> = applied.replaced.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(replaced, ["t2", "t1"]);
    assert_eq!(applied.replacement, None);
    Ok(())
}

#[test]
fn inverse_permutes_cancel() -> anyhow::Result<()> {
    let mut graph = chain(
        &[2, 3, 4],
        &[
            ("p1", permute(&[1, 2, 0]), &[4, 2, 3]),
            ("p2", permute(&[2, 0, 1]), &[2, 3, 4]),
        ],
    );
    let report = optimize(&mut graph, &default_rules(), &options())?;

    assert!(report.converged);
    assert_eq!(names(&graph), ["input", "output"]);
    assert_eq!(
        report.rewrites().map(|r| r.rule).collect::<Vec<_>>(),
        ["OptimizeInversePermutes"]
    );
    Ok(())
}

#[test]
fn inverse_pair_keeps_parent_with_other_consumers() -> anyhow::Result<()> {
    let mut graph = chain(
        &[2, 3, 4],
        &[
            ("t1", transpose(&[1, 2, 0]), &[3, 4, 2]),
            ("t2", transpose(&[2, 0, 1]), &[2, 3, 4]),
        ],
    );
    let t1 = graph.find("t1").unwrap();
    let side = graph.add_node(Operation::Output { binding_id: 1 }, "side");
    graph.connect(OutputSlot::new(t1, 0), InputSlot::new(side, 0))?;

    let report = optimize(&mut graph, &default_rules(), &options())?;

    assert!(report.converged);
    assert_eq!(names(&graph), ["input", "t1", "output", "side"]);
    let output = graph.find("output").unwrap();
    let input = graph.find("input").unwrap();
    assert_eq!(
        graph.producer(InputSlot::new(output, 0))?,
        Some(OutputSlot::new(input, 0))
    );
    Ok(())
}

#[test]
fn consecutive_reshapes_merge() -> anyhow::Result<()> {
    let mut graph = chain(
        &[2, 3],
        &[
            ("flatten", reshape(&[6]), &[6]),
            ("fold", reshape(&[3, 2]), &[3, 2]),
        ],
    );
    let report = optimize(&mut graph, &default_rules(), &options())?;

    assert!(report.converged);
    assert_eq!(names(&graph), ["input", "fold", "output"]);
    let fold = graph.find("fold").unwrap();
    let related: Vec<&str> = graph
        .related_nodes(fold)
        .iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(related, ["flatten"]);
    Ok(())
}

#[test]
fn round_trip_reshapes_vanish() -> anyhow::Result<()> {
    let mut graph = chain(
        &[2, 3],
        &[
            ("flatten", reshape(&[6]), &[6]),
            ("restore", reshape(&[2, 3]), &[2, 3]),
        ],
    );
    let report = optimize(&mut graph, &default_rules(), &options())?;

    assert!(report.converged);
    assert_eq!(names(&graph), ["input", "output"]);
    Ok(())
}

#[test]
fn rewrites_chain_across_passes() -> anyhow::Result<()> {
    let mut graph = chain(
        &[1, 2, 3, 1],
        &[
            ("transpose", transpose(&[0, 3, 1, 2]), &[1, 1, 2, 3]),
            ("flatten", reshape(&[6]), &[6]),
        ],
    );
    let report = optimize(&mut graph, &default_rules(), &options())?;

    assert!(report.converged);
    assert_eq!(report.passes.len(), 2);
    assert!(report.passes[0].still_matching);
    assert!(!report.passes[1].still_matching);
    assert_eq!(names(&graph), ["input", "flatten", "output"]);

    let flatten = graph.find("flatten").unwrap();
    let history: Vec<&str> = graph
        .related_nodes(flatten)
        .iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(history, ["merged-transpose-into-reshape", "transpose"]);
    Ok(())
}

/// Claims the input node on every pass without changing the graph.
struct AlwaysMatches;

impl RewriteRule for AlwaysMatches {
    fn name(&self) -> &'static str {
        "AlwaysMatches"
    }

    fn matches_operation(&self, op: &Operation) -> bool {
        matches!(op, Operation::Input { .. })
    }

    fn matches(&self, _graph: &Graph, _node: NodeId) -> bool {
        true
    }

    fn apply(&self, _graph: &mut Graph, _node: NodeId) -> GraphResult<AppliedRewrite> {
        Ok(AppliedRewrite {
            rule: self.name(),
            replaced: Vec::new(),
            replacement: None,
        })
    }
}

/// Relies on the default operation pre-filter; matches by node name only.
struct NamedNode(&'static str);

impl RewriteRule for NamedNode {
    fn name(&self) -> &'static str {
        "NamedNode"
    }

    fn matches(&self, graph: &Graph, node: NodeId) -> bool {
        graph.node(node).is_some_and(|n| n.name() == self.0)
    }

    fn apply(&self, _graph: &mut Graph, _node: NodeId) -> GraphResult<AppliedRewrite> {
        Ok(AppliedRewrite {
            rule: self.name(),
            replaced: Vec::new(),
            replacement: None,
        })
    }
}

#[test]
fn default_pre_filter_offers_every_operation() -> anyhow::Result<()> {
    let rule = NamedNode("output");
    for op in [
        Operation::Input { binding_id: 0 },
        Operation::Output { binding_id: 0 },
        Operation::Addition,
        transpose(&[1, 0]),
        reshape(&[6]),
    ] {
        assert!(rule.matches_operation(&op));
    }

    let mut graph = chain(&[2, 3], &[("flatten", reshape(&[6]), &[6])]);
    let mut rules = RuleSet::new();
    rules.add(NamedNode("flatten"));
    let report = optimize(
        &mut graph,
        &rules.freeze(),
        &OptimizerOptions {
            max_passes: 2,
            validate_each_rewrite: false,
        },
    )?;
    // The rule never removes its match, so it fires on the reshape every pass.
    assert!(!report.converged);
    assert_eq!(report.total_rewrites(), 2);
    Ok(())
}

#[test]
fn pass_budget_stops_non_converging_rules() -> anyhow::Result<()> {
    let mut graph = chain(&[2, 3], &[]);
    let mut rules = RuleSet::new();
    rules.add(AlwaysMatches);
    let rules = rules.freeze();

    let report = optimize(
        &mut graph,
        &rules,
        &OptimizerOptions {
            max_passes: 3,
            validate_each_rewrite: false,
        },
    )?;

    assert!(!report.converged);
    assert_eq!(report.passes.len(), 3);
    assert!(report.passes.iter().all(|pass| pass.still_matching));
    assert_eq!(report.total_rewrites(), 3);
    assert_eq!(names(&graph), ["input", "output"]);
    Ok(())
}

#[test]
fn empty_rule_set_is_trivially_converged() -> anyhow::Result<()> {
    let mut graph = chain(&[2, 3], &[("transpose", transpose(&[1, 0]), &[3, 2])]);
    let report = optimize(&mut graph, &RuleSet::new().freeze(), &options())?;
    assert!(report.converged);
    assert!(report.passes.is_empty());
    Ok(())
}

/// Drops every transpose by wiring its consumers to its producer.
struct DropTransposes;

impl RewriteRule for DropTransposes {
    fn name(&self) -> &'static str {
        "DropTransposes"
    }

    fn matches_operation(&self, op: &Operation) -> bool {
        matches!(op, Operation::Transpose(_))
    }

    fn matches(&self, _graph: &Graph, _node: NodeId) -> bool {
        true
    }

    fn apply(&self, graph: &mut Graph, node: NodeId) -> GraphResult<AppliedRewrite> {
        let source = graph.producer(InputSlot::new(node, 0))?.unwrap();
        graph.move_all_connections(OutputSlot::new(node, 0), source)?;
        let removed = graph.remove(node)?;
        Ok(AppliedRewrite {
            rule: self.name(),
            replaced: vec![infergraph::graph::RelatedNode {
                id: removed.id(),
                name: removed.name().to_string(),
            }],
            replacement: None,
        })
    }
}

#[test]
fn earlier_rule_wins_on_a_shared_node() -> anyhow::Result<()> {
    let scenario = || {
        chain(
            &[1, 2, 3, 1],
            &[("transpose", transpose(&[0, 3, 1, 2]), &[1, 1, 2, 3])],
        )
    };

    let mut first = RuleSet::new();
    first.add(DropTransposes).add(TransposeAsReshape);
    let mut graph = scenario();
    let report = optimize(&mut graph, &first.freeze(), &OptimizerOptions::default())?;
    assert_eq!(report.rewrites().map(|r| r.rule).collect::<Vec<_>>(), ["DropTransposes"]);
    assert_eq!(names(&graph), ["input", "output"]);

    let mut second = RuleSet::new();
    second.add(TransposeAsReshape).add(DropTransposes);
    let mut graph = scenario();
    let report = optimize(&mut graph, &second.freeze(), &OptimizerOptions::default())?;
    assert_eq!(
        report.rewrites().map(|r| r.rule).collect::<Vec<_>>(),
        ["TransposeAsReshape"]
    );
    assert_eq!(names(&graph), ["input", "merged-transpose-into-reshape", "output"]);
    Ok(())
}

#[test]
fn invalid_graph_is_rejected_before_rewriting() {
    let mut graph = Graph::new();
    graph.add_node(Operation::Output { binding_id: 0 }, "output");
    assert!(optimize(&mut graph, &default_rules(), &options()).is_err());
}
