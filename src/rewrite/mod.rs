//! Pattern rewrite engine and its rule catalog.
//!
//! A rule is a bundle of plain functions: a dispatch filter on node kind,
//! a structural matcher, a guard that checks the side conditions, and a
//! builder that produces the replacement. Rules never hold state, so a
//! built catalog is shared read-only across parallel compiles.
//!
//! ```text
//! for each pass:
//!     bottom-up over every node
//!         for rule in catalog.for_tag(node.tag())    // priority desc, name asc
//!             matches && guard && build → candidate
//!             candidate ≡ baseline on every fixture → replace, go to parent
//!             otherwise → remember (rule, fingerprint) as rejected
//! until a pass replaces nothing, or the pass cap is hit
//! ```

pub mod effects;
pub mod engine;
pub mod rules;

use std::cmp::Reverse;
use std::fmt;

use crate::config::EngineConfig;
use crate::ir::{Node, NodeTag};
use crate::runtime::HelperCatalog;

pub use engine::{AppliedRewrite, Engine, RejectedRegion, RewriteOutcome, COMPOSITION};

/// Read-only context every rule function receives.
#[derive(Clone, Copy)]
pub struct RuleContext<'a> {
    pub helpers: &'a HelperCatalog,
    pub config: &'a EngineConfig,
    /// Request parameter of the enclosing entry handler, if any.
    pub request: Option<&'a str>,
}

pub type MatchFn = fn(&Node, &RuleContext) -> bool;
pub type GuardFn = fn(&Node, &RuleContext) -> bool;
pub type BuildFn = fn(&Node, &RuleContext) -> Option<Node>;

#[derive(Clone, Copy)]
pub struct RewriteRule {
    pub name: &'static str,
    /// Higher runs first.
    pub priority: u16,
    /// Node kinds the rule is tried on.
    pub kinds: &'static [NodeTag],
    pub matches: MatchFn,
    pub guard: GuardFn,
    /// Replacement for the matched node. Synthesized nodes carry
    /// `NodeId::PENDING`; reused subtrees keep their ids.
    pub build: BuildFn,
}

impl RewriteRule {
    pub fn applies_to(&self, tag: NodeTag) -> bool {
        self.kinds.contains(&tag)
    }

    /// Run matcher, guard and builder in order.
    pub fn apply(&self, node: &Node, ctx: &RuleContext) -> Option<Node> {
        if !self.applies_to(node.tag()) || !(self.matches)(node, ctx) || !(self.guard)(node, ctx) {
            return None;
        }
        (self.build)(node, ctx)
    }
}

impl fmt::Debug for RewriteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewriteRule")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("kinds", &self.kinds)
            .finish()
    }
}

/// Closed, ordered set of rules.
#[derive(Clone, Debug)]
pub struct RuleCatalog {
    rules: Vec<RewriteRule>,
}

impl Default for RuleCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl RuleCatalog {
    pub fn builder() -> RuleCatalogBuilder {
        RuleCatalogBuilder { rules: Vec::new() }
    }

    /// The rules shipped with the simplifier.
    pub fn standard() -> Self {
        rules::standard_rules()
            .into_iter()
            .fold(Self::builder(), RuleCatalogBuilder::register)
            .build()
    }

    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    /// Rules for one node kind, in application order.
    pub fn for_tag(&self, tag: NodeTag) -> impl Iterator<Item = &RewriteRule> {
        self.rules.iter().filter(move |r| r.applies_to(tag))
    }

    pub fn get(&self, name: &str) -> Option<&RewriteRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

pub struct RuleCatalogBuilder {
    rules: Vec<RewriteRule>,
}

impl RuleCatalogBuilder {
    /// Add a rule. A later rule with the same name replaces the earlier one.
    pub fn register(mut self, rule: RewriteRule) -> Self {
        self.rules.retain(|r| r.name != rule.name);
        self.rules.push(rule);
        self
    }

    pub fn build(mut self) -> RuleCatalog {
        self.rules
            .sort_by(|a, b| (Reverse(a.priority), a.name).cmp(&(Reverse(b.priority), b.name)));
        RuleCatalog { rules: self.rules }
    }
}
