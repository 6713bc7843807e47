//! Guard-clause flattening and ordering of exit guards.

use super::{block_stmts, no_guard, stmts_of, synth, with_stmts};
use crate::ir::visit::{always_exits, declarations_of, reads_of};
use crate::ir::{BinOp, Node, NodeKind, NodeTag};
use crate::rewrite::effects::is_pure;
use crate::rewrite::{RewriteRule, RuleContext};

// ─── else-after-exit ───────────────────────────────────────────────

pub const ELSE_AFTER_EXIT: RewriteRule = RewriteRule {
    name: "else-after-exit",
    priority: 45,
    kinds: &[NodeTag::Block],
    matches: else_matches,
    guard: no_guard,
    build: else_build,
};

/// How an `if/else` at some index of a block flattens.
enum Flatten {
    /// `if (c) { exit } else { B }` → `if (c) { exit } B`
    KeepThen,
    /// `if (c) { A } else { exit }` → `if (!c) { exit } A`
    Invert(BinOp),
}

fn flatten_plan(stmt: &Node) -> Option<Flatten> {
    let NodeKind::Conditional {
        cond,
        then_branch,
        else_branch: Some(else_branch),
    } = &stmt.kind
    else {
        return None;
    };
    let then_exits = always_exits(then_branch);
    let else_exits = always_exits(else_branch);
    let negated = match &cond.kind {
        NodeKind::BinaryOp { op, .. } => op.negated(),
        _ => None,
    };
    match (then_exits, else_exits, negated) {
        // Both exit: the shorter branch becomes the guard.
        (true, true, Some(op)) if else_branch.size() < then_branch.size() => Some(Flatten::Invert(op)),
        (true, _, _) => Some(Flatten::KeepThen),
        (false, true, Some(op)) => Some(Flatten::Invert(op)),
        _ => None,
    }
}

/// First statement index that flattens without a name clash.
fn flatten_site(stmts: &[Node]) -> Option<(usize, Node, Vec<Node>)> {
    stmts.iter().enumerate().find_map(|(i, stmt)| {
        let (guard, spliced) = flatten(stmt)?;
        let clash = spliced_names(&spliced).iter().any(|name| {
            stmts[..i]
                .iter()
                .chain(&stmts[i + 1..])
                .chain(std::iter::once(&guard))
                .any(|s| reads_of(s, name) > 0 || declarations_of(s, name) > 0)
        });
        if clash {
            None
        } else {
            Some((i, guard, spliced))
        }
    })
}

/// The guard `if` and the statements that follow it.
fn flatten(stmt: &Node) -> Option<(Node, Vec<Node>)> {
    let plan = flatten_plan(stmt)?;
    let NodeKind::Conditional {
        cond,
        then_branch,
        else_branch: Some(else_branch),
    } = &stmt.kind
    else {
        return None;
    };
    let guard = |cond: Node, branch: &Node| {
        Node::with_id(
            stmt.id,
            NodeKind::Conditional {
                cond: Box::new(cond),
                then_branch: Box::new(branch.clone()),
                else_branch: None,
            },
            stmt.span,
        )
    };
    match plan {
        Flatten::KeepThen => Some((guard((**cond).clone(), then_branch), stmts_of(else_branch))),
        Flatten::Invert(op) => {
            let NodeKind::BinaryOp { lhs, rhs, .. } = &cond.kind else {
                return None;
            };
            let inverted = synth(
                NodeKind::BinaryOp {
                    op,
                    lhs: lhs.clone(),
                    rhs: rhs.clone(),
                },
                cond.span,
            );
            Some((guard(inverted, else_branch), stmts_of(then_branch)))
        }
    }
}

/// Names the spliced statements would bind in the enclosing block.
fn spliced_names(stmts: &[Node]) -> Vec<String> {
    stmts
        .iter()
        .filter_map(|s| match &s.kind {
            NodeKind::Assignment {
                decl: Some(_),
                target,
                ..
            } => target.as_ident().map(str::to_string),
            NodeKind::FunctionDef(def) => Some(def.name.clone()),
            _ => None,
        })
        .collect()
}

fn else_matches(node: &Node, _: &RuleContext) -> bool {
    block_stmts(node).map_or(false, |stmts| flatten_site(stmts).is_some())
}

fn else_build(node: &Node, _: &RuleContext) -> Option<Node> {
    let stmts = block_stmts(node)?;
    let (i, guard, spliced) = flatten_site(stmts)?;
    let mut out = Vec::with_capacity(stmts.len() + spliced.len());
    out.extend_from_slice(&stmts[..i]);
    out.push(guard);
    out.extend(spliced);
    out.extend_from_slice(&stmts[i + 1..]);
    Some(with_stmts(node, out))
}

// ─── dispatch-guard-order ──────────────────────────────────────────

pub const DISPATCH_GUARD_ORDER: RewriteRule = RewriteRule {
    name: "dispatch-guard-order",
    priority: 40,
    kinds: &[NodeTag::Block],
    matches: order_matches,
    guard: no_guard,
    build: order_build,
};

/// `if (subject === literal) { exit }` with no else: `(subject, literal, exit size)`.
fn exit_guard(stmt: &Node) -> Option<(&Node, &Node, usize)> {
    let NodeKind::Conditional {
        cond,
        then_branch,
        else_branch: None,
    } = &stmt.kind
    else {
        return None;
    };
    if !always_exits(then_branch) {
        return None;
    }
    let NodeKind::BinaryOp {
        op: BinOp::StrictEq,
        lhs,
        rhs,
    } = &cond.kind
    else {
        return None;
    };
    if !rhs.is_scalar_literal() || !is_pure(lhs) {
        return None;
    }
    Some((&**lhs, &**rhs, then_branch.size()))
}

/// First adjacent pair of disjoint guards where the second exit is shorter.
fn swap_site(stmts: &[Node]) -> Option<usize> {
    stmts.windows(2).position(|w| {
        let (Some((s1, l1, n1)), Some((s2, l2, n2))) = (exit_guard(&w[0]), exit_guard(&w[1])) else {
            return false;
        };
        s1.same_shape(s2) && !l1.same_shape(l2) && n2 < n1
    })
}

fn order_matches(node: &Node, _: &RuleContext) -> bool {
    block_stmts(node).map_or(false, |stmts| swap_site(stmts).is_some())
}

fn order_build(node: &Node, _: &RuleContext) -> Option<Node> {
    let mut stmts = block_stmts(node)?.to_vec();
    let i = swap_site(&stmts)?;
    stmts.swap(i, i + 1);
    Some(with_stmts(node, stmts))
}
