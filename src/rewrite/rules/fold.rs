//! Compile-time evaluation of constant string producers.

use super::{str_lit, synth};
use crate::equiv::value::{format_number, quote_json};
use crate::ir::{BinOp, CallStyle, Literal, Node, NodeKind, NodeTag};
use crate::rewrite::{RewriteRule, RuleContext};

pub const CONSTANT_LITERAL_FOLDING: RewriteRule = RewriteRule {
    name: "constant-literal-folding",
    priority: 60,
    kinds: &[NodeTag::Call, NodeTag::BinaryOp],
    matches: fold_matches,
    guard: fold_guard,
    build: fold_build,
};

fn fold_matches(node: &Node, _: &RuleContext) -> bool {
    stringify_arg(node).is_some() || concat_parts(node).is_some()
}

fn fold_guard(node: &Node, ctx: &RuleContext) -> bool {
    match stringify_arg(node) {
        Some(arg) => json_text(arg).map_or(false, |t| t.len() <= ctx.config.fold_threshold),
        None => true,
    }
}

fn fold_build(node: &Node, _: &RuleContext) -> Option<Node> {
    if let Some(arg) = stringify_arg(node) {
        return Some(str_lit(json_text(arg)?, node.span));
    }
    let (prefix, a, b) = concat_parts(node)?;
    let joined = str_lit(format!("{}{}", a, b), node.span);
    Some(match prefix {
        None => joined,
        Some(prefix) => synth(
            NodeKind::BinaryOp {
                op: BinOp::Add,
                lhs: Box::new(prefix.clone()),
                rhs: Box::new(joined),
            },
            node.span,
        ),
    })
}

/// Argument of `JSON.stringify(<constant>)`.
fn stringify_arg(node: &Node) -> Option<&Node> {
    let NodeKind::Call {
        callee,
        args,
        style: CallStyle::Plain,
        awaited: false,
    } = &node.kind
    else {
        return None;
    };
    let NodeKind::FieldAccess { object, field } = &callee.kind else {
        return None;
    };
    if object.as_ident() != Some("JSON") || field != "stringify" {
        return None;
    }
    match args.as_slice() {
        [arg] if is_constant(arg) => Some(arg),
        _ => None,
    }
}

/// `"a" + "b"`, or `x + "a" + "b"` which regroups to `x + "ab"`.
fn concat_parts(node: &Node) -> Option<(Option<&Node>, &str, &str)> {
    let NodeKind::BinaryOp {
        op: BinOp::Add,
        lhs,
        rhs,
    } = &node.kind
    else {
        return None;
    };
    let b = rhs.as_str_lit()?;
    if let Some(a) = lhs.as_str_lit() {
        return Some((None, a, b));
    }
    match &lhs.kind {
        NodeKind::BinaryOp {
            op: BinOp::Add,
            lhs: prefix,
            rhs: mid,
        } => Some((Some(&**prefix), mid.as_str_lit()?, b)),
        _ => None,
    }
}

fn is_constant(node: &Node) -> bool {
    match &node.kind {
        NodeKind::Literal(Literal::Record(fields)) => fields.iter().all(|(_, v)| is_constant(v)),
        NodeKind::Literal(_) => true,
        _ => false,
    }
}

/// JSON text of a constant literal, as `JSON.stringify` prints it.
/// `None` where the result would be `undefined`.
pub fn json_text(node: &Node) -> Option<String> {
    let NodeKind::Literal(lit) = &node.kind else {
        return None;
    };
    Some(match lit {
        Literal::Null => "null".to_string(),
        Literal::Undefined => return None,
        Literal::Bool(b) => b.to_string(),
        Literal::Number(v) if v.is_finite() => format_number(*v),
        Literal::Number(_) => "null".to_string(),
        Literal::Str(s) => quote_json(s),
        Literal::Record(fields) => {
            let parts: Vec<String> = fields
                .iter()
                .filter_map(|(k, v)| Some(format!("{}:{}", quote_json(k), json_text(v)?)))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
    })
}
