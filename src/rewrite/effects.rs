//! Side-effect and evaluation-order queries over expressions.

use crate::ir::{BinOp, CallStyle, Literal, Node, NodeKind};

/// String methods with no side effects. They still throw on a receiver
/// that is not a string.
pub const PURE_STRING_METHODS: &[&str] = &[
    "toUpperCase",
    "toLowerCase",
    "replace",
    "replaceAll",
    "trim",
    "includes",
    "startsWith",
    "endsWith",
];

/// Evaluating `node` changes nothing observable beyond possibly throwing.
pub fn is_pure(node: &Node) -> bool {
    match &node.kind {
        NodeKind::Literal(Literal::Record(fields)) => fields.iter().all(|(_, v)| is_pure(v)),
        NodeKind::Literal(_) | NodeKind::Identifier(_) => true,
        NodeKind::BinaryOp { lhs, rhs, .. } => is_pure(lhs) && is_pure(rhs),
        NodeKind::FieldAccess { object, .. } => is_pure(object),
        NodeKind::Conditional {
            cond,
            then_branch,
            else_branch,
        } => {
            is_pure(cond)
                && is_pure(then_branch)
                && else_branch.as_ref().map_or(true, |e| is_pure(e))
        }
        NodeKind::Call {
            callee,
            args,
            style: CallStyle::Plain,
            awaited: false,
        } => pure_callee(callee) && args.iter().all(is_pure),
        _ => false,
    }
}

fn pure_callee(callee: &Node) -> bool {
    let NodeKind::FieldAccess { object, field } = &callee.kind else {
        return false;
    };
    if object.as_ident() == Some("JSON") {
        return field == "stringify";
    }
    PURE_STRING_METHODS.contains(&field.as_str()) && is_pure(object)
}

/// Whether evaluating `node` can raise. Property reads and calls can.
pub fn may_throw(node: &Node) -> bool {
    let mut throws = false;
    node.walk(&mut |n| {
        throws |= matches!(n.kind, NodeKind::FieldAccess { .. } | NodeKind::Call { .. });
    });
    throws
}

/// Pure and cannot throw: safe to drop or move anywhere.
pub fn is_inert(node: &Node) -> bool {
    is_pure(node) && !may_throw(node)
}

/// Whether the single read of `name` inside `expr` sits on the expression's
/// evaluation spine: always evaluated, and not inside an argument list.
/// Operands of `+`, `===` and friends, the left side of `&&`/`||`, property
/// receivers and method receivers are on the spine.
pub fn on_spine(expr: &Node, name: &str) -> bool {
    match &expr.kind {
        NodeKind::Identifier(n) => n == name,
        NodeKind::BinaryOp { op, lhs, rhs } => {
            if matches!(op, BinOp::And | BinOp::Or) {
                on_spine(lhs, name)
            } else {
                on_spine(lhs, name) || on_spine(rhs, name)
            }
        }
        NodeKind::FieldAccess { object, .. } => on_spine(object, name),
        NodeKind::Call { callee, .. } => match &callee.kind {
            NodeKind::FieldAccess { object, .. } => on_spine(object, name),
            _ => false,
        },
        _ => false,
    }
}

/// Substitute `value` for the identifier `name` everywhere in `expr`.
pub fn substitute(expr: &Node, name: &str, value: &Node) -> Node {
    if expr.as_ident() == Some(name) {
        return value.clone();
    }
    let mut out = expr.clone();
    for child in out.children_mut() {
        *child = substitute(child, name, value);
    }
    out
}
