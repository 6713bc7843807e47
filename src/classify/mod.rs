//! Tier classification of functions by the scaffolding they contain.
//!
//! A pure structural scan: no rewriting, no execution. The scan reports
//! every scaffold occurrence it finds, and the tier follows from which
//! patterns showed up:
//!
//! - **Tier1**: nothing detected, the function is already idiomatic.
//! - **Tier2**: only patterns a single local rewrite can remove.
//! - **Tier3**: at least one pattern that spans control flow.


use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::ir::visit::{always_exits, declared_name, reads_of, writes_to};
use crate::ir::{Node, NodeId, NodeKind, Program};
use crate::runtime::{HelperCatalog, HelperKind};
use crate::span::Span;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Tier {
    Tier1,
    Tier2,
    Tier3,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Tier1 => write!(f, "tier1"),
            Tier::Tier2 => write!(f, "tier2"),
            Tier::Tier3 => write!(f, "tier3"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScaffoldPattern {
    /// `x = e; return x;`
    StagedReturn,
    /// Staged variable assigned inside branches and returned afterwards.
    BranchStagedReturn,
    /// Local declared and never read.
    DeadTemporary,
    /// Identity or boxing helper call.
    BoxedCallWrapper,
    /// Property lookup through a helper.
    ReflectiveLookup,
    /// Helper with a native counterpart.
    GenericHelperCall,
    /// Request method compared through a case-folding helper.
    CaseInsensitiveDispatch,
    /// `if/else` where a branch always exits.
    WrappedControlFlow,
    /// Exception-to-error conversion at an async boundary.
    AsyncErrorConversion,
}

impl ScaffoldPattern {
    /// Whether one local rewrite removes the pattern.
    pub fn is_confined(self) -> bool {
        matches!(
            self,
            ScaffoldPattern::StagedReturn
                | ScaffoldPattern::DeadTemporary
                | ScaffoldPattern::BoxedCallWrapper
                | ScaffoldPattern::ReflectiveLookup
                | ScaffoldPattern::GenericHelperCall
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ScaffoldPattern::StagedReturn => "staged-return",
            ScaffoldPattern::BranchStagedReturn => "branch-staged-return",
            ScaffoldPattern::DeadTemporary => "dead-temporary",
            ScaffoldPattern::BoxedCallWrapper => "boxed-call-wrapper",
            ScaffoldPattern::ReflectiveLookup => "reflective-lookup",
            ScaffoldPattern::GenericHelperCall => "generic-helper-call",
            ScaffoldPattern::CaseInsensitiveDispatch => "case-insensitive-dispatch",
            ScaffoldPattern::WrappedControlFlow => "wrapped-control-flow",
            ScaffoldPattern::AsyncErrorConversion => "async-error-conversion",
        }
    }
}

impl fmt::Display for ScaffoldPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One scaffold occurrence.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    pub pattern: ScaffoldPattern,
    pub node: NodeId,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Classification {
    pub tier: Tier,
    pub detections: Vec<Detection>,
}

impl Classification {
    /// Distinct patterns found, in declaration order of `ScaffoldPattern`.
    pub fn patterns(&self) -> BTreeSet<ScaffoldPattern> {
        self.detections.iter().map(|d| d.pattern).collect()
    }

    pub fn has(&self, pattern: ScaffoldPattern) -> bool {
        self.detections.iter().any(|d| d.pattern == pattern)
    }
}

pub fn tier_of(detections: &[Detection]) -> Tier {
    if detections.is_empty() {
        Tier::Tier1
    } else if detections.iter().all(|d| d.pattern.is_confined()) {
        Tier::Tier2
    } else {
        Tier::Tier3
    }
}

// ─── Scan ──────────────────────────────────────────────────────────

/// Classify one `FunctionDef` node. Anything else is Tier1.
pub fn classify_function(node: &Node, helpers: &HelperCatalog) -> Classification {
    let mut detections = Vec::new();
    if let NodeKind::FunctionDef(def) = &node.kind {
        scan(&def.body, helpers, &mut detections);
        scan_locals(&def.body, &mut detections);
    }
    Classification {
        tier: tier_of(&detections),
        detections,
    }
}

/// Classify every top-level function, in declaration order.
pub fn classify_program(program: &Program, helpers: &HelperCatalog) -> Vec<(String, Classification)> {
    program
        .decls
        .iter()
        .filter_map(|decl| {
            let def = decl.as_function()?;
            Some((def.name.clone(), classify_function(decl, helpers)))
        })
        .collect()
}

/// Highest tier over all functions of a program.
pub fn program_tier(program: &Program, helpers: &HelperCatalog) -> Tier {
    classify_program(program, helpers)
        .iter()
        .map(|(_, c)| c.tier)
        .max()
        .unwrap_or(Tier::Tier1)
}

fn detect(out: &mut Vec<Detection>, pattern: ScaffoldPattern, node: &Node) {
    out.push(Detection {
        pattern,
        node: node.id,
        span: node.span,
    });
}

fn scan(node: &Node, helpers: &HelperCatalog, out: &mut Vec<Detection>) {
    match &node.kind {
        NodeKind::Call { .. } => {
            let kind = node.called_name().and_then(|name| helpers.kind(name));
            let pattern = match kind {
                Some(HelperKind::Identity) => Some(ScaffoldPattern::BoxedCallWrapper),
                Some(HelperKind::ReflectiveLookup) => Some(ScaffoldPattern::ReflectiveLookup),
                Some(HelperKind::CaseFold) => Some(ScaffoldPattern::CaseInsensitiveDispatch),
                Some(HelperKind::Native(_)) => Some(ScaffoldPattern::GenericHelperCall),
                Some(HelperKind::Structural) => Some(ScaffoldPattern::AsyncErrorConversion),
                None => None,
            };
            if let Some(pattern) = pattern {
                detect(out, pattern, node);
            }
        }
        NodeKind::Block(stmts) => {
            for (i, stmt) in stmts.iter().enumerate() {
                if let NodeKind::Conditional {
                    then_branch,
                    else_branch: Some(else_branch),
                    ..
                } = &stmt.kind
                {
                    if always_exits(then_branch) || always_exits(else_branch) {
                        detect(out, ScaffoldPattern::WrappedControlFlow, stmt);
                    }
                }
                if let Some(next) = stmts.get(i + 1) {
                    if staged_name(stmt, next).is_some() {
                        detect(out, ScaffoldPattern::StagedReturn, next);
                    }
                }
            }
        }
        _ => {}
    }
    for child in node.children() {
        scan(child, helpers, out);
    }
}

/// `x = e;` immediately followed by `return x;` yields `x`.
pub fn staged_name<'a>(stmt: &'a Node, next: &Node) -> Option<&'a str> {
    let NodeKind::Assignment { target, .. } = &stmt.kind else {
        return None;
    };
    let name = target.as_ident()?;
    match &next.kind {
        NodeKind::Return(Some(value)) if value.as_ident() == Some(name) => Some(name),
        _ => None,
    }
}

/// Dead and branch-staged locals, judged against the whole function body.
fn scan_locals(body: &Node, out: &mut Vec<Detection>) {
    let mut decls: Vec<&Node> = Vec::new();
    body.walk(&mut |n| {
        if declared_name(n).is_some() {
            decls.push(n);
        }
    });
    for decl in decls {
        let Some(name) = declared_name(decl) else {
            continue;
        };
        if reads_of(body, name) == 0 {
            detect(out, ScaffoldPattern::DeadTemporary, decl);
        } else if returns_unstaged(body, name) && assigned_in_branch(body, name) {
            detect(out, ScaffoldPattern::BranchStagedReturn, decl);
        }
    }
}

/// A `return name;` that does not directly follow a write of `name`.
fn returns_unstaged(body: &Node, name: &str) -> bool {
    let mut found = false;
    body.walk(&mut |n| {
        if let NodeKind::Block(stmts) = &n.kind {
            for (i, stmt) in stmts.iter().enumerate() {
                let NodeKind::Return(Some(value)) = &stmt.kind else {
                    continue;
                };
                if value.as_ident() != Some(name) {
                    continue;
                }
                let staged = i > 0 && staged_name(&stmts[i - 1], stmt) == Some(name);
                found |= !staged;
            }
        }
    });
    found
}

fn assigned_in_branch(body: &Node, name: &str) -> bool {
    let mut found = false;
    body.walk(&mut |n| {
        if let NodeKind::Conditional {
            then_branch,
            else_branch,
            ..
        } = &n.kind
        {
            found |= writes_to(then_branch, name) > 0;
            if let Some(e) = else_branch {
                found |= writes_to(e, name) > 0;
            }
        }
    });
    found
}
