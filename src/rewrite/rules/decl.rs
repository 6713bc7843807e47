//! Declaration cleanups: temporary inlining and `let` → `const`.

use super::{block_stmts, no_guard, with_stmts};
use crate::ir::visit::{declarations_of, declared_name, reads_of, writes_to};
use crate::ir::{DeclKind, Node, NodeKind, NodeTag};
use crate::rewrite::effects::{is_inert, is_pure, on_spine, substitute};
use crate::rewrite::{RewriteRule, RuleContext};

// ─── single-use-temporary-inline ───────────────────────────────────

pub const SINGLE_USE_TEMPORARY_INLINE: RewriteRule = RewriteRule {
    name: "single-use-temporary-inline",
    priority: 25,
    kinds: &[NodeTag::Block],
    matches: inline_matches,
    guard: no_guard,
    build: inline_build,
};

/// The expression a statement evaluates first.
fn head(stmt: &Node) -> Option<&Node> {
    match &stmt.kind {
        NodeKind::Conditional { cond, .. } => Some(&**cond),
        NodeKind::Return(Some(value)) => Some(&**value),
        NodeKind::Assignment { target, value, .. } if target.as_ident().is_some() => Some(&**value),
        NodeKind::Call { .. } => Some(stmt),
        _ => None,
    }
}

fn replace_head(stmt: &Node, new_head: Node) -> Node {
    if matches!(stmt.kind, NodeKind::Call { .. }) {
        return new_head;
    }
    let mut out = stmt.clone();
    match &mut out.kind {
        NodeKind::Conditional { cond, .. } => **cond = new_head,
        NodeKind::Return(Some(value)) => **value = new_head,
        NodeKind::Assignment { value, .. } => **value = new_head,
        _ => {}
    }
    out
}

fn inline_site(stmts: &[Node]) -> Option<usize> {
    let block = Node::new(NodeKind::Block(stmts.to_vec()), Default::default());
    stmts.windows(2).position(|w| {
        let (stmt, next) = (&w[0], &w[1]);
        let NodeKind::Assignment {
            decl: Some(DeclKind::Let | DeclKind::Const),
            value: init,
            ..
        } = &stmt.kind
        else {
            return false;
        };
        let (Some(name), Some(first)) = (declared_name(stmt), head(next)) else {
            return false;
        };
        if reads_of(&block, name) != 1
            || writes_to(&block, name) != 0
            || declarations_of(&block, name) != 1
            || !on_spine(first, name)
        {
            return false;
        }
        // The initializer must not read what the next statement declares.
        if let Some(declared) = declared_name(next) {
            if reads_of(init, declared) > 0 {
                return false;
            }
        }
        if is_inert(init) {
            true
        } else if is_pure(init) {
            is_pure(first)
        } else {
            first.as_ident() == Some(name)
        }
    })
}

fn inline_matches(node: &Node, _: &RuleContext) -> bool {
    block_stmts(node).map_or(false, |stmts| inline_site(stmts).is_some())
}

fn inline_build(node: &Node, _: &RuleContext) -> Option<Node> {
    let stmts = block_stmts(node)?;
    let i = inline_site(stmts)?;
    let NodeKind::Assignment { value: init, .. } = &stmts[i].kind else {
        return None;
    };
    let name = declared_name(&stmts[i])?;
    let next = &stmts[i + 1];
    let new_head = substitute(head(next)?, name, init);
    let mut out = Vec::with_capacity(stmts.len() - 1);
    out.extend_from_slice(&stmts[..i]);
    out.push(replace_head(next, new_head));
    out.extend_from_slice(&stmts[i + 2..]);
    Some(with_stmts(node, out))
}

// ─── const-promotion ───────────────────────────────────────────────

pub const CONST_PROMOTION: RewriteRule = RewriteRule {
    name: "const-promotion",
    priority: 10,
    kinds: &[NodeTag::Block],
    matches: const_matches,
    guard: no_guard,
    build: const_build,
};

fn promotable(block: &Node, stmt: &Node) -> bool {
    matches!(
        &stmt.kind,
        NodeKind::Assignment {
            decl: Some(DeclKind::Let),
            ..
        }
    ) && declared_name(stmt)
        .map_or(false, |name| writes_to(block, name) == 0 && declarations_of(block, name) == 1)
}

fn const_matches(node: &Node, _: &RuleContext) -> bool {
    block_stmts(node).map_or(false, |stmts| stmts.iter().any(|s| promotable(node, s)))
}

fn const_build(node: &Node, _: &RuleContext) -> Option<Node> {
    let stmts = block_stmts(node)?;
    let promoted = stmts
        .iter()
        .map(|stmt| {
            let mut stmt = stmt.clone();
            if promotable(node, &stmt) {
                if let NodeKind::Assignment { decl, .. } = &mut stmt.kind {
                    *decl = Some(DeclKind::Const);
                }
            }
            stmt
        })
        .collect();
    Some(with_stmts(node, promoted))
}
