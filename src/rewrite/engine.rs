//! Fixpoint driver: bottom-up passes guarded by the equivalence checker.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{RuleCatalog, RuleContext};
use crate::config::EngineConfig;
use crate::equiv::{EquivalenceChecker, FixturePlan, Observation, Verdict};
use crate::ir::visit::{node_at, replace_at};
use crate::ir::{Fingerprint, IdAllocator, NodeId, NodePath, Program};
use crate::runtime::HelperCatalog;
use crate::span::Span;

/// Rule name recorded when the rewritten program as a whole diverges.
pub const COMPOSITION: &str = "<composition>";

/// One accepted rule application.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppliedRewrite {
    pub rule: &'static str,
    /// Top-level function the node belongs to.
    pub function: Option<String>,
    pub node: NodeId,
    pub pass: u32,
}

/// A rewrite the checker refused; the region keeps its earlier form.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RejectedRegion {
    pub rule: String,
    pub function: Option<String>,
    pub node: NodeId,
    pub span: Span,
    #[serde(serialize_with = "fingerprint_hex")]
    pub fingerprint: Fingerprint,
    pub reason: String,
}

fn fingerprint_hex<S: serde::Serializer>(fp: &Fingerprint, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&fp.to_string())
}

#[derive(Clone, Debug)]
pub struct RewriteOutcome {
    /// The rewritten program, or the input when the run did not converge.
    pub program: Program,
    pub converged: bool,
    pub passes: u32,
    /// Applications present in `program`. Empty when the run fell back.
    pub applied: Vec<AppliedRewrite>,
    /// Applications of a run whose result was thrown away.
    pub discarded: Vec<AppliedRewrite>,
    pub rejected: Vec<RejectedRegion>,
}

/// State of one run, threaded through every pass.
struct Run<'p> {
    program: Program,
    plan: FixturePlan,
    baseline: Vec<Observation>,
    ids: IdAllocator,
    memo: HashSet<(&'static str, Fingerprint)>,
    applied: Vec<AppliedRewrite>,
    rejected: Vec<RejectedRegion>,
    pass: u32,
    original: &'p Program,
}

pub struct Engine<'a> {
    catalog: &'a RuleCatalog,
    helpers: &'a HelperCatalog,
    config: &'a EngineConfig,
    checker: EquivalenceChecker,
}

impl<'a> Engine<'a> {
    pub fn new(catalog: &'a RuleCatalog, helpers: &'a HelperCatalog, config: &'a EngineConfig) -> Self {
        Self {
            catalog,
            helpers,
            config,
            checker: EquivalenceChecker::new(config, helpers),
        }
    }

    /// Rewrite `program` to a fixpoint, or give up after `max_passes`.
    pub fn run(&self, program: &Program) -> RewriteOutcome {
        let plan = self.checker.plan(program);
        let baseline = self.checker.observe(&plan, program);
        let mut run = Run {
            program: program.clone(),
            plan,
            baseline,
            ids: IdAllocator::after(program),
            memo: HashSet::new(),
            applied: Vec::new(),
            rejected: Vec::new(),
            pass: 0,
            original: program,
        };

        let mut converged = false;
        while run.pass < self.config.max_passes {
            run.pass += 1;
            let mut changed = false;
            for decl in 0..run.program.decls.len() {
                changed |= self.visit(&mut run, NodePath::decl(decl));
            }
            debug!(unit = %program.name, pass = run.pass, changed, "rewrite pass finished");
            if !changed {
                converged = true;
                break;
            }
        }

        if !converged {
            warn!(
                unit = %program.name,
                passes = run.pass,
                "rewriting did not converge; keeping the scaffolded program"
            );
            return run.finish(false);
        }

        // Every step was checked against the baseline; this re-check covers
        // the composition as a whole.
        if let Verdict::Diverged(reason) = self.checker.compare(&run.plan, &run.baseline, &run.program) {
            warn!(unit = %program.name, %reason, "rewritten program diverged; keeping the scaffolded program");
            run.rejected.push(RejectedRegion {
                rule: COMPOSITION.to_string(),
                function: None,
                node: NodeId::PENDING,
                span: Span::dummy(),
                fingerprint: Fingerprint([0; 32]),
                reason,
            });
            return run.finish(false);
        }

        info!(
            unit = %program.name,
            passes = run.pass,
            applied = run.applied.len(),
            rejected = run.rejected.len(),
            "rewriting converged"
        );
        run.finish(true)
    }

    /// Post-order visit of the subtree at `path`. Returns whether anything
    /// in it was replaced.
    fn visit(&self, run: &mut Run, path: NodePath) -> bool {
        let children = node_at(&run.program, &path).map_or(0, |n| n.child_count());
        let mut changed = false;
        for i in 0..children {
            changed |= self.visit(run, path.child(i));
        }
        changed | self.rewrite_at(run, &path)
    }

    /// Try the catalog at one node; the first accepted candidate wins.
    fn rewrite_at(&self, run: &mut Run, path: &NodePath) -> bool {
        let Some(node) = node_at(&run.program, path) else {
            return false;
        };
        let ctx = RuleContext {
            helpers: self.helpers,
            config: self.config,
            request: run.program.request_param(path.decl_index()),
        };
        let fingerprint = node.fingerprint();
        let function = run.program.decl_name(path.decl_index()).map(str::to_string);
        let mut accepted = None;

        for rule in self.catalog.for_tag(node.tag()) {
            if run.memo.contains(&(rule.name, fingerprint)) {
                continue;
            }
            let Some(mut replacement) = rule.apply(node, &ctx) else {
                continue;
            };
            if replacement.same_shape(node) {
                continue;
            }
            replacement.stamp_pending(&mut run.ids);

            let mut candidate = run.program.clone();
            replace_at(&mut candidate, path, replacement);
            match self.checker.compare(&run.plan, &run.baseline, &candidate) {
                Verdict::Equivalent => {
                    debug!(rule = rule.name, node = %node.id, function = ?function, "applied");
                    run.applied.push(AppliedRewrite {
                        rule: rule.name,
                        function: function.clone(),
                        node: node.id,
                        pass: run.pass,
                    });
                    accepted = Some(candidate);
                    break;
                }
                Verdict::Diverged(reason) => {
                    debug!(rule = rule.name, node = %node.id, %reason, "rejected");
                    run.memo.insert((rule.name, fingerprint));
                    run.rejected.push(RejectedRegion {
                        rule: rule.name.to_string(),
                        function: function.clone(),
                        node: node.id,
                        span: node.span,
                        fingerprint,
                        reason,
                    });
                }
            }
        }

        match accepted {
            Some(candidate) => {
                run.program = candidate;
                true
            }
            None => false,
        }
    }
}

impl Run<'_> {
    fn finish(self, converged: bool) -> RewriteOutcome {
        let (program, applied, discarded) = if converged {
            (self.program, self.applied, Vec::new())
        } else {
            (self.original.clone(), Vec::new(), self.applied)
        };
        RewriteOutcome {
            program,
            converged,
            passes: self.pass,
            applied,
            discarded,
            rejected: self.rejected,
        }
    }
}
