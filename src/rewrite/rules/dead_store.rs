//! Removal of locals that are written but never read.
//!
//! On a block, an unread `let`/`const` with no other writes goes away. On
//! a function, an unread local goes away together with every write to it,
//! wherever the write sits. Initializers with effects survive as
//! expression statements.

use super::{block_stmts, no_guard, synth, with_stmts};
use crate::ir::visit::{declarations_of, declared_name, reads_of, writes_to};
use crate::ir::{DeclKind, FunctionDef, Node, NodeKind, NodeTag};
use crate::rewrite::effects::is_inert;
use crate::rewrite::{RewriteRule, RuleContext};

pub const DEAD_STORE_ELIMINATION: RewriteRule = RewriteRule {
    name: "dead-store-elimination",
    priority: 30,
    kinds: &[NodeTag::Block, NodeTag::FunctionDef],
    matches: dead_matches,
    guard: no_guard,
    build: dead_build,
};

/// What happens to one store of a dead local.
enum Store {
    Drop,
    /// Keep the value for its effects.
    Keep(Node),
}

/// The store statement's fate, or `None` if the value cannot stand alone.
fn store_fate(value: &Node) -> Option<Store> {
    if is_inert(value) {
        Some(Store::Drop)
    } else if matches!(value.kind, NodeKind::Call { .. }) {
        Some(Store::Keep(value.clone()))
    } else {
        None
    }
}

/// The stored value when `stmt` stores into `name`.
fn store_of<'a>(stmt: &'a Node, name: &str) -> Option<&'a Node> {
    match &stmt.kind {
        NodeKind::Assignment { target, value, .. } if target.as_ident() == Some(name) => Some(&**value),
        _ => None,
    }
}

// ─── Block scope ───────────────────────────────────────────────────

fn dead_in_block(stmts: &[Node]) -> Option<usize> {
    let block = Node::new(NodeKind::Block(stmts.to_vec()), Default::default());
    stmts.iter().position(|stmt| {
        let NodeKind::Assignment {
            decl: Some(DeclKind::Let | DeclKind::Const),
            value,
            ..
        } = &stmt.kind
        else {
            return false;
        };
        let Some(name) = declared_name(stmt) else {
            return false;
        };
        reads_of(&block, name) == 0
            && writes_to(&block, name) == 0
            && declarations_of(&block, name) == 1
            && store_fate(value).is_some()
    })
}

// ─── Function scope ────────────────────────────────────────────────

/// First local of the function that is never read and whose stores can
/// all be removed.
fn dead_in_function(def: &FunctionDef) -> Option<String> {
    let mut names: Vec<&str> = Vec::new();
    def.body.walk(&mut |n| {
        if let Some(name) = declared_name(n) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    });
    names
        .into_iter()
        .find(|name| {
            !def.params.iter().any(|p| p == name)
                && declarations_of(&def.body, name) == 1
                && reads_of(&def.body, name) == 0
                && strip(&def.body, name).is_some()
        })
        .map(str::to_string)
}

/// `node` without any store into `name`; `None` when a store cannot go.
fn strip(node: &Node, name: &str) -> Option<Node> {
    let mut out = node.clone();
    if let NodeKind::Conditional {
        then_branch,
        else_branch,
        ..
    } = &mut out.kind
    {
        // A bare store as a branch becomes a block so it can be emptied.
        for branch in std::iter::once(then_branch).chain(else_branch.as_mut()) {
            if store_of(branch, name).is_some() {
                let span = branch.span;
                let inner = std::mem::replace(&mut **branch, synth(NodeKind::Block(vec![]), span));
                **branch = synth(NodeKind::Block(vec![inner]), span);
            }
        }
    }
    if let NodeKind::Block(stmts) = &mut out.kind {
        let mut kept = Vec::with_capacity(stmts.len());
        for stmt in stmts.drain(..) {
            match store_of(&stmt, name) {
                Some(value) => match store_fate(value)? {
                    Store::Drop => {}
                    Store::Keep(expr) => kept.push(expr),
                },
                None => kept.push(stmt),
            }
        }
        *stmts = kept;
    }
    for child in out.children_mut() {
        *child = strip(child, name)?;
    }
    // Stores nested inside expressions are out of reach.
    if writes_to(&out, name) > 0 || declarations_of(&out, name) > 0 {
        return None;
    }
    Some(out)
}

// ─── Rule ──────────────────────────────────────────────────────────

fn dead_matches(node: &Node, _: &RuleContext) -> bool {
    match &node.kind {
        NodeKind::Block(stmts) => dead_in_block(stmts).is_some(),
        NodeKind::FunctionDef(def) => dead_in_function(def).is_some(),
        _ => false,
    }
}

fn dead_build(node: &Node, _: &RuleContext) -> Option<Node> {
    if let Some(stmts) = block_stmts(node) {
        let i = dead_in_block(stmts)?;
        let mut out = stmts.to_vec();
        let removed = out.remove(i);
        if let Some(Store::Keep(expr)) = store_of(&removed, declared_name(&removed)?).and_then(store_fate) {
            out.insert(i, expr);
        }
        return Some(with_stmts(node, out));
    }
    let def = node.as_function()?;
    let name = dead_in_function(def)?;
    let body = strip(&def.body, &name)?;
    let mut out = node.clone();
    if let NodeKind::FunctionDef(new_def) = &mut out.kind {
        new_def.body = Box::new(body);
    }
    Some(out)
}
