use crate::equiv::interp::{Interpreter, Limits};
use crate::equiv::value::Value;
use crate::ir::{BinOp, CallStyle, Literal, NodeKind, NodeTag};
use crate::rewrite::rules::standard_rules;
use crate::rewrite::{RewriteRule, RuleContext};
use crate::runtime::HelperCatalog;
use crate::*;

// ─── Test rules ────────────────────────────────────────────────────

fn always(_: &Node, _: &RuleContext) -> bool {
    true
}

fn is_missing_url(node: &Node, _: &RuleContext) -> bool {
    node.as_str_lit() == Some("Missing url")
}

fn oops(node: &Node, _: &RuleContext) -> Option<Node> {
    Some(Node::new(NodeKind::Literal(Literal::Str("Oops".to_string())), node.span))
}

/// Changes a client-visible message; the checker must refuse it.
const BOGUS_MESSAGE: RewriteRule = RewriteRule {
    name: "bogus-message",
    priority: 100,
    kinds: &[NodeTag::Literal],
    matches: is_missing_url,
    guard: always,
    build: oops,
};

fn is_strict_eq(node: &Node, _: &RuleContext) -> bool {
    matches!(node.kind, NodeKind::BinaryOp { op: BinOp::StrictEq, .. })
}

fn swap_operands(node: &Node, _: &RuleContext) -> Option<Node> {
    let NodeKind::BinaryOp { op, lhs, rhs } = &node.kind else {
        return None;
    };
    Some(Node::new(
        NodeKind::BinaryOp {
            op: *op,
            lhs: rhs.clone(),
            rhs: lhs.clone(),
        },
        node.span,
    ))
}

/// Always applicable and always equivalent, so it never settles.
const PING_PONG: RewriteRule = RewriteRule {
    name: "ping-pong",
    priority: 1,
    kinds: &[NodeTag::BinaryOp],
    matches: is_strict_eq,
    guard: always,
    build: swap_operands,
};

fn is_replace_all_helper(node: &Node, _: &RuleContext) -> bool {
    matches!(&node.kind, NodeKind::Call { callee, args, .. }
        if callee.as_ident() == Some("rt_replace_all") && args.len() == 3)
}

fn first_occurrence_replace(node: &Node, _: &RuleContext) -> Option<Node> {
    let NodeKind::Call { args, .. } = &node.kind else {
        return None;
    };
    let [subject, from, to] = args.as_slice() else {
        return None;
    };
    let callee = Node::new(
        NodeKind::FieldAccess {
            object: Box::new(subject.clone()),
            field: "replace".to_string(),
        },
        node.span,
    );
    Some(Node::new(
        NodeKind::Call {
            callee: Box::new(callee),
            args: vec![from.clone(), to.clone()],
            style: CallStyle::Plain,
            awaited: false,
        },
        node.span,
    ))
}

/// Maps the all-occurrence helper to first-occurrence `replace`.
const WRONG_REPLACE: RewriteRule = RewriteRule {
    name: "wrong-replace",
    priority: 200,
    kinds: &[NodeTag::Call],
    matches: is_replace_all_helper,
    guard: always,
    build: first_occurrence_replace,
};

/// An already idiomatic handler.
fn tier1_handler() -> Program {
    let x = IrBuilder::new();
    let status = |code: f64| x.record(vec![("status", x.num(code))]);
    ProgramBuilder::new("plain")
        .decl(x.function(
            "fetch",
            &["request", "env"],
            x.block(vec![
                x.if_(
                    x.strict_eq(x.field(x.ident("request"), "method"), x.str("OPTIONS")),
                    x.block(vec![x.ret(x.construct("Response", vec![x.str(""), status(204.0)]))]),
                    None,
                ),
                x.ret(x.construct("Response", vec![x.str("hello"), status(200.0)])),
            ]),
        ))
        .entry("fetch")
        .finish()
}

// ─── Properties ────────────────────────────────────────────────────

#[test]
fn test_simplified_output_is_a_fixpoint() {
    let simplifier = Simplifier::default();
    for name in ["worker_minimal", "worker_strings", "worker_async"] {
        let unit = samples::by_name(name).unwrap();
        let once = simplifier.compile(&unit);
        assert!(once.report.totals.applied > 0, "{}", name);

        let twice = simplifier.compile(&once.program);
        assert_eq!(twice.report.totals.applied, 0, "{}: {:?}", name, twice.report.functions);
        assert!(
            twice.report.functions.iter().all(|f| f.tier == Tier::Tier1),
            "{}: {}",
            name,
            twice.report.format_summary()
        );
        assert_eq!(twice.text, once.text);
    }
}

#[test]
fn test_rejected_rewrite_leaves_region_untouched() {
    let catalog = standard_rules()
        .into_iter()
        .chain([BOGUS_MESSAGE])
        .fold(RuleCatalog::builder(), |b, r| b.register(r))
        .build();
    let out = Simplifier::default().with_catalog(catalog).compile(&samples::worker_async());

    assert!(out.converged());
    assert!(out.text.contains("Missing url"));
    assert!(!out.text.contains("Oops"));
    assert!(out.errors.iter().any(|e| matches!(
        e,
        SimplifyError::EquivalenceViolation { rule, .. } if rule == "bogus-message"
    )));
    let fetch = out.report.function("fetch").unwrap();
    assert!(fetch.rejected.iter().any(|r| r.rule == "bogus-message"));
    assert!(!fetch.applied.contains(&"bogus-message"));
    // Everything else still simplified.
    assert!(!out.text.contains("rt_"));
}

#[test]
fn test_first_occurrence_replace_is_refused() {
    let catalog = standard_rules()
        .into_iter()
        .chain([WRONG_REPLACE])
        .fold(RuleCatalog::builder(), |b, r| b.register(r))
        .build();
    let out = Simplifier::default().with_catalog(catalog).compile(&samples::worker_strings());

    assert!(out.converged());
    assert!(!out.text.contains(".replace("), "{}", out.text);
    assert!(out.text.contains(r#".replaceAll("-", "_")"#), "{}", out.text);
    let helper = out.report.function("sanitizeEnvVar").unwrap();
    assert!(helper.rejected.iter().any(|r| r.rule == "wrong-replace"));
    assert!(!helper.applied.contains(&"wrong-replace"));
}

#[test]
fn test_rule_cycle_falls_back_to_the_input() {
    let config = EngineConfig {
        max_passes: 4,
        ..EngineConfig::default()
    };
    let catalog = RuleCatalog::builder().register(PING_PONG).build();
    let simplifier = Simplifier::new(config).with_catalog(catalog);
    let unit = tier1_handler();

    let out = simplifier.compile(&unit);
    assert!(!out.converged());
    assert_eq!(out.report.passes, 4);
    assert_eq!(out.text, emit_program(&unit));
    assert!(matches!(
        &out.errors[..],
        [SimplifyError::NonConvergence { unit, passes: 4 }] if unit == "plain"
    ));
    assert!(out.errors[0].is_fatal());

    // The discarded run's applications are not credited to the output.
    assert!(out.report.functions.iter().all(|f| f.applied.is_empty()));
    assert_eq!(out.report.totals.applied, 0);
    assert_eq!(out.report.totals.discarded, out.report.passes as usize);

    assert!(matches!(
        simplifier.simplify(&unit),
        Err(SimplifyError::NonConvergence { passes: 4, .. })
    ));
}

#[test]
fn test_sanitizer_agrees_before_and_after() {
    let helpers = HelperCatalog::standard();
    let limits = Limits {
        step_budget: 10_000,
        max_call_depth: 16,
    };
    let original = samples::worker_strings();
    let simplified = Simplifier::default().simplify(&original).unwrap();
    for program in [&original, &simplified] {
        let value = Interpreter::new(program, &helpers, limits)
            .call_entry("sanitizeEnvVar", vec![Value::str("openai-key")])
            .unwrap();
        assert_eq!(value.to_js_string(), "OPENAI_KEY");
    }
}

#[test]
fn test_tier1_handler_barely_changes() {
    let unit = tier1_handler();
    let out = Simplifier::default().compile(&unit);
    let f = out.report.function("fetch").unwrap();
    assert_eq!(f.tier, Tier::Tier1);
    assert!(f.detected.is_empty());
    let change = f.size_before.change_to(&f.size_after);
    assert!(change.abs() <= 0.10, "size changed by {:.1}%", change * 100.0);
    assert!(out.errors.is_empty());
}
