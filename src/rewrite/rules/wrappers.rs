//! Helper calls that disappear or become plain property syntax.

use super::{helper_call, no_guard, str_lit, synth};
use crate::ir::{BinOp, Node, NodeKind, NodeTag};
use crate::rewrite::{RewriteRule, RuleContext};
use crate::runtime::HelperKind;

/// Methods the fetch runtime normalizes to upper case on `request.method`.
pub const NORMALIZED_METHODS: &[&str] = &["DELETE", "GET", "HEAD", "OPTIONS", "POST", "PUT"];

// ─── trivial-wrapper-unwrap ────────────────────────────────────────

pub const TRIVIAL_WRAPPER_UNWRAP: RewriteRule = RewriteRule {
    name: "trivial-wrapper-unwrap",
    priority: 90,
    kinds: &[NodeTag::Call],
    matches: unwrap_matches,
    guard: no_guard,
    build: unwrap_build,
};

fn unwrap_matches(node: &Node, ctx: &RuleContext) -> bool {
    matches!(
        helper_call(node),
        Some((name, [_])) if ctx.helpers.kind(name) == Some(HelperKind::Identity)
    )
}

fn unwrap_build(node: &Node, _: &RuleContext) -> Option<Node> {
    let (_, args) = helper_call(node)?;
    args.first().cloned()
}

// ─── reflective-field-access ───────────────────────────────────────

pub const REFLECTIVE_FIELD_ACCESS: RewriteRule = RewriteRule {
    name: "reflective-field-access",
    priority: 85,
    kinds: &[NodeTag::Call],
    matches: reflective_matches,
    guard: no_guard,
    build: reflective_build,
};

fn reflective_matches(node: &Node, ctx: &RuleContext) -> bool {
    match helper_call(node) {
        Some((name, [_, key])) => {
            ctx.helpers.kind(name) == Some(HelperKind::ReflectiveLookup) && key.as_str_lit().is_some()
        }
        _ => false,
    }
}

fn reflective_build(node: &Node, _: &RuleContext) -> Option<Node> {
    let (_, [object, key]) = helper_call(node)? else {
        return None;
    };
    Some(synth(
        NodeKind::FieldAccess {
            object: Box::new(object.clone()),
            field: key.as_str_lit()?.to_string(),
        },
        node.span,
    ))
}

// ─── method-case-normalize ─────────────────────────────────────────

pub const METHOD_CASE_NORMALIZE: RewriteRule = RewriteRule {
    name: "method-case-normalize",
    priority: 80,
    kinds: &[NodeTag::Call],
    matches: case_matches,
    guard: case_guard,
    build: case_build,
};

/// `(method read, literal)` in either argument order. Only the handler's
/// own request has a normalized method; `body.method` is user data.
fn method_compare<'n>(node: &'n Node, ctx: &RuleContext) -> Option<(&'n Node, &'n str)> {
    let request = ctx.request?;
    let (_, [a, b]) = helper_call(node)? else {
        return None;
    };
    let is_method_read = |n: &Node| {
        matches!(&n.kind, NodeKind::FieldAccess { object, field }
            if field == "method" && object.as_ident() == Some(request))
    };
    if is_method_read(a) {
        Some((a, b.as_str_lit()?))
    } else if is_method_read(b) {
        Some((b, a.as_str_lit()?))
    } else {
        None
    }
}

fn case_matches(node: &Node, ctx: &RuleContext) -> bool {
    let Some((name, _)) = helper_call(node) else {
        return false;
    };
    ctx.helpers.kind(name) == Some(HelperKind::CaseFold) && method_compare(node, ctx).is_some()
}

fn case_guard(node: &Node, ctx: &RuleContext) -> bool {
    method_compare(node, ctx)
        .map(|(_, lit)| NORMALIZED_METHODS.contains(&lit.to_uppercase().as_str()))
        .unwrap_or(false)
}

fn case_build(node: &Node, ctx: &RuleContext) -> Option<Node> {
    let (read, lit) = method_compare(node, ctx)?;
    Some(synth(
        NodeKind::BinaryOp {
            op: BinOp::StrictEq,
            lhs: Box::new(read.clone()),
            rhs: Box::new(str_lit(lit.to_uppercase(), node.span)),
        },
        node.span,
    ))
}
