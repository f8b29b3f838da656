use tracing::{debug, info, warn};

use crate::env;
use crate::graph::{Graph, GraphResult, NodeId};

use super::{AppliedRewrite, FrozenRuleSet, OptimizerOptions, RewriteRule};

/// Rewrites applied during one pass over the rule list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub index: usize,
    pub rewrites: Vec<AppliedRewrite>,
    /// Whether any rule still matched some node once the pass finished.
    pub still_matching: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizationReport {
    pub passes: Vec<PassReport>,
    /// False when the pass budget ran out before a fixed point was reached.
    pub converged: bool,
}

impl OptimizationReport {
    pub fn rewrites(&self) -> impl Iterator<Item = &AppliedRewrite> {
        self.passes.iter().flat_map(|pass| pass.rewrites.iter())
    }

    pub fn total_rewrites(&self) -> usize {
        self.passes.iter().map(|pass| pass.rewrites.len()).sum()
    }
}

fn rule_matches(rule: &dyn RewriteRule, graph: &Graph, node: NodeId) -> bool {
    graph
        .node(node)
        .is_some_and(|n| rule.matches_operation(n.operation()))
        && rule.matches(graph, node)
}

fn any_rule_matches(graph: &Graph, rules: &FrozenRuleSet) -> bool {
    rules
        .iter()
        .any(|rule| graph.iter().any(|node| rule_matches(rule, graph, node.id())))
}

/// Applies `rules` to `graph` until no rule matches or the pass budget is spent.
///
/// Each pass walks the rules in order. For every rule the current topological
/// order is snapshotted and each node still present is offered to the rule;
/// a match is rewritten immediately, so later nodes observe earlier rewrites.
/// Running out of passes is reported through `converged == false`, not as an
/// error; the graph is left in the state reached so far.
pub fn optimize(
    graph: &mut Graph,
    rules: &FrozenRuleSet,
    options: &OptimizerOptions,
) -> GraphResult<OptimizationReport> {
    graph.validate()?;

    let mut report = OptimizationReport::default();
    if rules.is_empty() {
        report.converged = true;
        return Ok(report);
    }

    let max_passes = options.max_passes.max(1);
    let pass_stats = env::opt_pass_stats_enabled();

    for index in 0..max_passes {
        let mut rewrites = Vec::new();
        for rule in rules.iter() {
            for node in graph.topological_order() {
                if !rule_matches(rule, graph, node) {
                    continue;
                }
                let applied = rule.apply(graph, node)?;
                debug!(
                    rule = applied.rule,
                    replaced = ?applied.replaced,
                    replacement = ?applied.replacement,
                    "applied rewrite"
                );
                if options.validate_each_rewrite {
                    graph.validate()?;
                }
                rewrites.push(applied);
            }
        }

        let still_matching = any_rule_matches(graph, rules);
        if pass_stats {
            info!(
                pass = index,
                rewrites = rewrites.len(),
                nodes = graph.len(),
                still_matching,
                "optimizer pass finished"
            );
        }
        report.passes.push(PassReport {
            index,
            rewrites,
            still_matching,
        });
        if !still_matching {
            report.converged = true;
            break;
        }
    }

    if !report.converged {
        warn!(
            max_passes,
            rules = ?rules.names(),
            "optimizer pass budget exhausted before reaching a fixed point"
        );
    }
    info!(
        passes = report.passes.len(),
        rewrites = report.total_rewrites(),
        converged = report.converged,
        "graph optimization finished"
    );
    Ok(report)
}
