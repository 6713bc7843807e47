//! The standard rule catalog.

mod control;
mod dead_store;
mod decl;
mod fold;
mod natives;
mod staging;
mod wrappers;

#[cfg(test)]
mod tests;

use super::{RewriteRule, RuleContext};
use crate::ir::{Literal, Node, NodeKind};
use crate::span::Span;

pub use control::{DISPATCH_GUARD_ORDER, ELSE_AFTER_EXIT};
pub use dead_store::DEAD_STORE_ELIMINATION;
pub use decl::{CONST_PROMOTION, SINGLE_USE_TEMPORARY_INLINE};
pub use fold::CONSTANT_LITERAL_FOLDING;
pub use natives::NATIVE_METHOD_SPECIALIZATION;
pub use staging::RETURN_STAGING_COLLAPSE;
pub use wrappers::{METHOD_CASE_NORMALIZE, REFLECTIVE_FIELD_ACCESS, TRIVIAL_WRAPPER_UNWRAP};

pub fn standard_rules() -> Vec<RewriteRule> {
    vec![
        TRIVIAL_WRAPPER_UNWRAP,
        REFLECTIVE_FIELD_ACCESS,
        METHOD_CASE_NORMALIZE,
        NATIVE_METHOD_SPECIALIZATION,
        CONSTANT_LITERAL_FOLDING,
        RETURN_STAGING_COLLAPSE,
        ELSE_AFTER_EXIT,
        DISPATCH_GUARD_ORDER,
        DEAD_STORE_ELIMINATION,
        SINGLE_USE_TEMPORARY_INLINE,
        CONST_PROMOTION,
    ]
}

// ─── Shared helpers ────────────────────────────────────────────────

/// Guard for rules whose matcher already checks everything.
pub(crate) fn no_guard(_: &Node, _: &RuleContext) -> bool {
    true
}

/// A synthesized node, id assigned by the engine.
pub(crate) fn synth(kind: NodeKind, span: Span) -> Node {
    Node::new(kind, span)
}

pub(crate) fn str_lit(value: String, span: Span) -> Node {
    synth(NodeKind::Literal(Literal::Str(value)), span)
}

/// `(helper name, args)` of a plain, non-awaited call of a bare name.
pub(crate) fn helper_call(node: &Node) -> Option<(&str, &[Node])> {
    match &node.kind {
        NodeKind::Call {
            callee,
            args,
            style: crate::ir::CallStyle::Plain,
            awaited: false,
        } => Some((callee.as_ident()?, args)),
        _ => None,
    }
}

/// Statements of a block, or the node itself as a one-statement list.
pub(crate) fn stmts_of(node: &Node) -> Vec<Node> {
    match &node.kind {
        NodeKind::Block(stmts) => stmts.clone(),
        _ => vec![node.clone()],
    }
}

/// Block statements of the matched node, if it is a block.
pub(crate) fn block_stmts(node: &Node) -> Option<&[Node]> {
    node.as_block()
}

/// Rebuild `node` as a block holding `stmts`, keeping its id and span.
pub(crate) fn with_stmts(node: &Node, stmts: Vec<Node>) -> Node {
    Node::with_id(node.id, NodeKind::Block(stmts), node.span)
}
