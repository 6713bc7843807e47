//! Helper calls with a native JavaScript counterpart.

use super::{helper_call, synth};
use crate::ir::{BinOp, CallStyle, Literal, Node, NodeKind, NodeTag};
use crate::rewrite::{RewriteRule, RuleContext};
use crate::runtime::{HelperContract, NativeForm, NativeGuard};

pub const NATIVE_METHOD_SPECIALIZATION: RewriteRule = RewriteRule {
    name: "native-method-specialization",
    priority: 70,
    kinds: &[NodeTag::Call, NodeTag::BinaryOp],
    matches: native_matches,
    guard: native_guard,
    build: native_build,
};

/// The helper call being specialized: the node itself, or for a length
/// comparison the call operand.
fn target<'a>(node: &'a Node, ctx: &RuleContext<'a>) -> Option<(&'a HelperContract, &'a [Node])> {
    let call = match &node.kind {
        NodeKind::BinaryOp { lhs, rhs, .. } => {
            if helper_call(lhs).is_some() {
                &**lhs
            } else {
                &**rhs
            }
        }
        _ => node,
    };
    let (name, args) = helper_call(call)?;
    let contract = ctx.helpers.get(name)?;
    contract.native()?;
    Some((contract, args))
}

fn native_matches(node: &Node, ctx: &RuleContext) -> bool {
    let Some((contract, args)) = target(node, ctx) else {
        return false;
    };
    let Some(form) = contract.native() else {
        return false;
    };
    let arity_ok = match form {
        NativeForm::Method(_) | NativeForm::Length => !args.is_empty(),
        NativeForm::Static(..) => true,
        NativeForm::Operator(BinOp::Add) => args.len() >= 2,
        NativeForm::Operator(_) => args.len() == 2,
    };
    // A length helper only specializes inside its comparison; the call
    // form of every other helper only on the call itself.
    let position_ok = match (&node.kind, form) {
        (NodeKind::BinaryOp { .. }, NativeForm::Length) => true,
        (NodeKind::Call { .. }, NativeForm::Length) => false,
        (NodeKind::Call { .. }, _) => true,
        _ => false,
    };
    arity_ok && position_ok
}

fn native_guard(node: &Node, ctx: &RuleContext) -> bool {
    let Some((contract, args)) = target(node, ctx) else {
        return false;
    };
    match contract.guard {
        NativeGuard::None => true,
        NativeGuard::AsciiLiteral => args[0].as_str_lit().map_or(false, |s| s.is_ascii()),
        NativeGuard::LiteralReplace => match args {
            [_, search, replacement] => {
                search.as_str_lit().map_or(false, |s| !s.is_empty())
                    && replacement.as_str_lit().map_or(false, |r| !r.contains('$'))
            }
            _ => false,
        },
        NativeGuard::StringOperand => args.iter().take(2).any(|a| a.as_str_lit().is_some()),
        NativeGuard::ZeroComparison => zero_comparison(node),
    }
}

/// `helper(..) === 0` or `0 !== helper(..)` and the like.
fn zero_comparison(node: &Node) -> bool {
    let NodeKind::BinaryOp { op, lhs, rhs } = &node.kind else {
        return false;
    };
    let is_zero = |n: &Node| matches!(n.kind, NodeKind::Literal(Literal::Number(v)) if v == 0.0);
    matches!(op, BinOp::StrictEq | BinOp::StrictNe)
        && ((helper_call(lhs).is_some() && is_zero(rhs)) || (is_zero(lhs) && helper_call(rhs).is_some()))
}

fn field(object: Node, name: &str, span: crate::span::Span) -> Node {
    synth(
        NodeKind::FieldAccess {
            object: Box::new(object),
            field: name.to_string(),
        },
        span,
    )
}

fn native_build(node: &Node, ctx: &RuleContext) -> Option<Node> {
    let (contract, args) = target(node, ctx)?;
    let span = node.span;
    let call = |callee: Node, args: Vec<Node>| {
        synth(
            NodeKind::Call {
                callee: Box::new(callee),
                args,
                style: CallStyle::Plain,
                awaited: false,
            },
            span,
        )
    };
    let built = match contract.native()? {
        NativeForm::Method(method) => {
            let (receiver, rest) = args.split_first()?;
            call(field(receiver.clone(), method, span), rest.to_vec())
        }
        NativeForm::Static(object, method) => {
            let callee = field(synth(NodeKind::Identifier(object.to_string()), span), method, span);
            call(callee, args.to_vec())
        }
        NativeForm::Operator(op) => {
            let (first, rest) = args.split_first()?;
            rest.iter().fold(first.clone(), |acc, arg| {
                synth(
                    NodeKind::BinaryOp {
                        op,
                        lhs: Box::new(acc),
                        rhs: Box::new(arg.clone()),
                    },
                    span,
                )
            })
        }
        NativeForm::Length => {
            let NodeKind::BinaryOp { op, lhs, rhs } = &node.kind else {
                return None;
            };
            let length = field(args[0].clone(), "length", span);
            let (lhs, rhs) = if helper_call(lhs).is_some() {
                (length, (**rhs).clone())
            } else {
                ((**lhs).clone(), length)
            };
            synth(
                NodeKind::BinaryOp {
                    op: *op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            )
        }
    };
    Some(built)
}
