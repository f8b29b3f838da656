//! Graph rewrite rules and the fixed-point driver that applies them.

mod driver;
pub mod rules;

use serde::{Deserialize, Serialize};

use crate::env;
use crate::graph::{Graph, GraphResult, NodeId, Operation, RelatedNode};

pub use driver::{optimize, OptimizationReport, PassReport};
pub use rules::default_rules;

/// Knobs for [`optimize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerOptions {
    /// Upper bound on full passes over the rule list before giving up on a fixed point.
    pub max_passes: usize,
    /// Re-validate the whole graph after every applied rewrite.
    pub validate_each_rewrite: bool,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            max_passes: env::opt_max_passes(),
            validate_each_rewrite: false,
        }
    }
}

/// Record of one applied rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRewrite {
    pub rule: &'static str,
    /// Nodes removed from the graph by the rewrite.
    pub replaced: Vec<RelatedNode>,
    /// Node introduced in their place, if any.
    pub replacement: Option<NodeId>,
}

/// A local graph rewrite.
///
/// Rules hold no state between applications. `apply` is only called on a node
/// for which `matches` just returned true, and must leave every connection
/// outside the consumed nodes untouched.
pub trait RewriteRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cheap pre-filter on the operation alone.
    fn matches_operation(&self, _op: &Operation) -> bool {
        true
    }

    fn matches(&self, graph: &Graph, node: NodeId) -> bool;

    fn apply(&self, graph: &mut Graph, node: NodeId) -> GraphResult<AppliedRewrite>;
}

/// Mutable list that collects rules prior to freezing.
pub struct RuleSet {
    rules: Vec<Box<dyn RewriteRule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add<R>(&mut self, rule: R) -> &mut Self
    where
        R: RewriteRule + 'static,
    {
        self.rules.push(Box::new(rule));
        self
    }

    /// Freezes the set. Insertion order is kept: earlier rules win on a shared node.
    pub fn freeze(self) -> FrozenRuleSet {
        FrozenRuleSet { rules: self.rules }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable ordered rule list consumed by the driver.
pub struct FrozenRuleSet {
    rules: Vec<Box<dyn RewriteRule>>,
}

impl FrozenRuleSet {
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn RewriteRule> {
        self.rules.iter().map(|rule| &**rule)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|rule| rule.name()).collect()
    }
}

impl std::fmt::Debug for FrozenRuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Common operation pre-filters.
pub mod filters {
    use crate::graph::Operation;

    pub fn transpose(op: &Operation) -> bool {
        matches!(op, Operation::Transpose(_))
    }

    pub fn permute(op: &Operation) -> bool {
        matches!(op, Operation::Permute(_))
    }

    pub fn reshape(op: &Operation) -> bool {
        matches!(op, Operation::Reshape(_))
    }
}
