use super::*;
use crate::config::EngineConfig;
use crate::ir::builder::IrBuilder;
use crate::ir::{BinOp, DeclKind};
use crate::runtime::HelperCatalog;

fn apply_in(rule: &RewriteRule, node: &Node, config: &EngineConfig, request: Option<&str>) -> Option<Node> {
    let helpers = HelperCatalog::standard();
    let ctx = RuleContext {
        helpers: &helpers,
        config,
        request,
    };
    rule.apply(node, &ctx)
}

fn apply_with(rule: &RewriteRule, node: &Node, config: &EngineConfig) -> Option<Node> {
    apply_in(rule, node, config, Some("request"))
}

fn apply(rule: &RewriteRule, node: &Node) -> Option<Node> {
    apply_with(rule, node, &EngineConfig::default())
}

#[track_caller]
fn assert_rewrites(rule: &RewriteRule, node: &Node, expected: &Node) {
    match apply(rule, node) {
        Some(out) => assert!(
            out.same_shape(expected),
            "{}: got {:#?}\nexpected {:#?}",
            rule.name,
            out.kind,
            expected.kind
        ),
        None => panic!("{} did not fire on {:#?}", rule.name, node.kind),
    }
}

// ─── Wrappers ──────────────────────────────────────────────────────

#[test]
fn test_identity_helpers_unwrap() {
    let x = IrBuilder::new();
    let boxed = x.call_named("rt_box", vec![x.field(x.ident("request"), "method")]);
    assert_rewrites(&TRIVIAL_WRAPPER_UNWRAP, &boxed, &x.field(x.ident("request"), "method"));

    let two_args = x.call_named("rt_unbox", vec![x.ident("a"), x.ident("b")]);
    assert!(apply(&TRIVIAL_WRAPPER_UNWRAP, &two_args).is_none());
    let awaited = x.call_with(x.ident("rt_box"), vec![x.ident("a")], crate::ir::CallStyle::Plain, true);
    assert!(apply(&TRIVIAL_WRAPPER_UNWRAP, &awaited).is_none());
}

#[test]
fn test_reflective_lookup_needs_literal_key() {
    let x = IrBuilder::new();
    let lookup = x.call_named("rt_get_field", vec![x.ident("body"), x.str("url")]);
    assert_rewrites(&REFLECTIVE_FIELD_ACCESS, &lookup, &x.field(x.ident("body"), "url"));

    let dynamic = x.call_named("rt_get_field", vec![x.ident("body"), x.ident("key")]);
    assert!(apply(&REFLECTIVE_FIELD_ACCESS, &dynamic).is_none());
}

#[test]
fn test_case_fold_on_normalized_methods_only() {
    let x = IrBuilder::new();
    let method = || x.field(x.ident("request"), "method");
    let folded = x.call_named("rt_eq_ignore_case", vec![method(), x.str("post")]);
    assert_rewrites(&METHOD_CASE_NORMALIZE, &folded, &x.strict_eq(method(), x.str("POST")));

    let swapped = x.call_named("rt_eq_ignore_case", vec![x.str("Get"), method()]);
    assert_rewrites(&METHOD_CASE_NORMALIZE, &swapped, &x.strict_eq(method(), x.str("GET")));

    // The runtime leaves extension methods as sent.
    let patch = x.call_named("rt_eq_ignore_case", vec![method(), x.str("patch")]);
    assert!(apply(&METHOD_CASE_NORMALIZE, &patch).is_none());
    let header = x.call_named("rt_eq_ignore_case", vec![x.ident("kind"), x.str("post")]);
    assert!(apply(&METHOD_CASE_NORMALIZE, &header).is_none());
}

#[test]
fn test_case_fold_leaves_body_fields_alone() {
    let x = IrBuilder::new();
    let body_method = x.call_named(
        "rt_eq_ignore_case",
        vec![x.field(x.ident("body"), "method"), x.str("post")],
    );
    assert!(apply(&METHOD_CASE_NORMALIZE, &body_method).is_none());

    // Outside an entry handler nothing is known to be normalized.
    let request_method = x.call_named(
        "rt_eq_ignore_case",
        vec![x.field(x.ident("request"), "method"), x.str("post")],
    );
    let config = EngineConfig::default();
    assert!(apply_in(&METHOD_CASE_NORMALIZE, &request_method, &config, None).is_none());
    assert!(apply_in(&METHOD_CASE_NORMALIZE, &request_method, &config, Some("req")).is_none());
    assert!(apply_in(&METHOD_CASE_NORMALIZE, &request_method, &config, Some("request")).is_some());
}

// ─── Natives ───────────────────────────────────────────────────────

#[test]
fn test_replace_all_becomes_replace_all() {
    let x = IrBuilder::new();
    let call = x.call_named("rt_replace_all", vec![x.ident("s"), x.str("-"), x.str("_")]);
    let expected = x.method(x.ident("s"), "replaceAll", vec![x.str("-"), x.str("_")]);
    assert_rewrites(&NATIVE_METHOD_SPECIALIZATION, &call, &expected);

    let first = x.call_named("rt_replace_first", vec![x.ident("s"), x.str("-"), x.str("_")]);
    let expected = x.method(x.ident("s"), "replace", vec![x.str("-"), x.str("_")]);
    assert_rewrites(&NATIVE_METHOD_SPECIALIZATION, &first, &expected);
}

#[test]
fn test_replace_guard_rejects_patterns() {
    let x = IrBuilder::new();
    for (search, replacement) in [("-", "$&"), ("", "_")] {
        let call = x.call_named("rt_replace_all", vec![x.ident("s"), x.str(search), x.str(replacement)]);
        assert!(apply(&NATIVE_METHOD_SPECIALIZATION, &call).is_none(), "{:?}", (search, replacement));
    }
    let dynamic = x.call_named("rt_replace_all", vec![x.ident("s"), x.ident("a"), x.str("_")]);
    assert!(apply(&NATIVE_METHOD_SPECIALIZATION, &dynamic).is_none());
}

#[test]
fn test_ascii_upper_needs_ascii_literal() {
    let x = IrBuilder::new();
    let literal = x.call_named("rt_to_upper_ascii", vec![x.str("key")]);
    assert_rewrites(
        &NATIVE_METHOD_SPECIALIZATION,
        &literal,
        &x.method(x.str("key"), "toUpperCase", vec![]),
    );
    let variable = x.call_named("rt_to_upper_ascii", vec![x.ident("name")]);
    assert!(apply(&NATIVE_METHOD_SPECIALIZATION, &variable).is_none());
    let accented = x.call_named("rt_to_upper_ascii", vec![x.str("clé")]);
    assert!(apply(&NATIVE_METHOD_SPECIALIZATION, &accented).is_none());
}

#[test]
fn test_length_only_inside_zero_comparison() {
    let x = IrBuilder::new();
    let len = || x.call_named("rt_str_len", vec![x.ident("url")]);
    let empty = x.strict_eq(len(), x.num(0.0));
    let expected = x.strict_eq(x.field(x.ident("url"), "length"), x.num(0.0));
    assert_rewrites(&NATIVE_METHOD_SPECIALIZATION, &empty, &expected);

    let flipped = x.binary(BinOp::StrictNe, x.num(0.0), len());
    let expected = x.binary(BinOp::StrictNe, x.num(0.0), x.field(x.ident("url"), "length"));
    assert_rewrites(&NATIVE_METHOD_SPECIALIZATION, &flipped, &expected);

    // Byte length and UTF-16 length only agree on emptiness.
    assert!(apply(&NATIVE_METHOD_SPECIALIZATION, &len()).is_none());
    let three = x.strict_eq(len(), x.num(3.0));
    assert!(apply(&NATIVE_METHOD_SPECIALIZATION, &three).is_none());
}

#[test]
fn test_concat_needs_a_leading_string() {
    let x = IrBuilder::new();
    let call = x.call_named("rt_concat", vec![x.str("k="), x.ident("a"), x.ident("b")]);
    let expected = x.binary(
        BinOp::Add,
        x.binary(BinOp::Add, x.str("k="), x.ident("a")),
        x.ident("b"),
    );
    assert_rewrites(&NATIVE_METHOD_SPECIALIZATION, &call, &expected);

    // 1 + 2 would add numbers.
    let untyped = x.call_named("rt_concat", vec![x.ident("a"), x.ident("b"), x.str("!")]);
    assert!(apply(&NATIVE_METHOD_SPECIALIZATION, &untyped).is_none());
}

#[test]
fn test_to_json_becomes_stringify() {
    let x = IrBuilder::new();
    let call = x.call_named("rt_to_json", vec![x.ident("v")]);
    let expected = x.call(x.field(x.ident("JSON"), "stringify"), vec![x.ident("v")]);
    assert_rewrites(&NATIVE_METHOD_SPECIALIZATION, &call, &expected);
}

// ─── Folding ───────────────────────────────────────────────────────

fn stringify(x: &IrBuilder, arg: Node) -> Node {
    x.call(x.field(x.ident("JSON"), "stringify"), vec![arg])
}

#[test]
fn test_constant_records_fold_to_json_text() {
    let x = IrBuilder::new();
    let record = x.record(vec![("error", x.str("Missing url")), ("code", x.num(400.0)), ("skip", x.undefined())]);
    assert_rewrites(
        &CONSTANT_LITERAL_FOLDING,
        &stringify(&x, record),
        &x.str(r#"{"error":"Missing url","code":400}"#),
    );

    let dynamic = x.record(vec![("url", x.ident("url"))]);
    assert!(apply(&CONSTANT_LITERAL_FOLDING, &stringify(&x, dynamic)).is_none());
    assert!(apply(&CONSTANT_LITERAL_FOLDING, &stringify(&x, x.undefined())).is_none());
}

#[test]
fn test_fold_threshold_limits_text() {
    let x = IrBuilder::new();
    let call = stringify(&x, x.record(vec![("ok", x.bool(true))]));
    let tight = EngineConfig {
        fold_threshold: 8,
        ..EngineConfig::default()
    };
    assert!(apply_with(&CONSTANT_LITERAL_FOLDING, &call, &tight).is_none());
    assert!(apply(&CONSTANT_LITERAL_FOLDING, &call).is_some());
}

#[test]
fn test_adjacent_string_literals_join() {
    let x = IrBuilder::new();
    let pair = x.binary(BinOp::Add, x.str("a"), x.str("b"));
    assert_rewrites(&CONSTANT_LITERAL_FOLDING, &pair, &x.str("ab"));

    let tail = x.binary(BinOp::Add, x.binary(BinOp::Add, x.ident("k"), x.str("a")), x.str("b"));
    assert_rewrites(&CONSTANT_LITERAL_FOLDING, &tail, &x.binary(BinOp::Add, x.ident("k"), x.str("ab")));

    let numeric = x.binary(BinOp::Add, x.num(1.0), x.str("b"));
    assert!(apply(&CONSTANT_LITERAL_FOLDING, &numeric).is_none());
}

// ─── Staging ───────────────────────────────────────────────────────

#[test]
fn test_staged_returns_collapse_in_every_branch() {
    let x = IrBuilder::new();
    let staged = x.function(
        "f",
        &["a"],
        x.block(vec![
            x.declare(DeclKind::Var, "result", x.null()),
            x.if_(
                x.ident("a"),
                x.block(vec![x.assign(x.ident("result"), x.num(1.0)), x.ret(x.ident("result"))]),
                None,
            ),
            x.assign(x.ident("result"), x.num(2.0)),
            x.ret(x.ident("result")),
        ]),
    );
    let expected = x.function(
        "f",
        &["a"],
        x.block(vec![
            x.declare(DeclKind::Var, "result", x.null()),
            x.if_(x.ident("a"), x.block(vec![x.ret(x.num(1.0))]), None),
            x.ret(x.num(2.0)),
        ]),
    );
    assert_rewrites(&RETURN_STAGING_COLLAPSE, &staged, &expected);
}

#[test]
fn test_parameters_are_not_staging_variables() {
    let x = IrBuilder::new();
    let param = x.function(
        "f",
        &["a"],
        x.block(vec![x.assign(x.ident("a"), x.num(1.0)), x.ret(x.ident("a"))]),
    );
    assert!(apply(&RETURN_STAGING_COLLAPSE, &param).is_none());
}

// ─── Control flow ──────────────────────────────────────────────────

#[test]
fn test_else_after_return_flattens() {
    let x = IrBuilder::new();
    let cond = || x.strict_eq(x.ident("m"), x.str("GET"));
    let log = || x.call_named("log", vec![]);
    let nested = x.block(vec![x.if_(
        cond(),
        x.block(vec![x.ret(x.num(1.0))]),
        Some(x.block(vec![log(), x.ret(x.num(2.0))])),
    )]);
    let expected = x.block(vec![
        x.if_(cond(), x.block(vec![x.ret(x.num(1.0))]), None),
        log(),
        x.ret(x.num(2.0)),
    ]);
    assert_rewrites(&ELSE_AFTER_EXIT, &nested, &expected);
}

#[test]
fn test_exiting_else_becomes_inverted_guard() {
    let x = IrBuilder::new();
    let log = || x.call_named("log", vec![]);
    let nested = x.block(vec![
        x.if_(
            x.strict_eq(x.ident("m"), x.str("POST")),
            x.block(vec![log()]),
            Some(x.block(vec![x.ret(x.num(405.0))])),
        ),
        x.ret(x.num(200.0)),
    ]);
    let expected = x.block(vec![
        x.if_(
            x.binary(BinOp::StrictNe, x.ident("m"), x.str("POST")),
            x.block(vec![x.ret(x.num(405.0))]),
            None,
        ),
        log(),
        x.ret(x.num(200.0)),
    ]);
    assert_rewrites(&ELSE_AFTER_EXIT, &nested, &expected);
}

#[test]
fn test_flattening_refuses_name_clashes() {
    let x = IrBuilder::new();
    let clash = x.block(vec![
        x.declare(DeclKind::Let, "v", x.num(0.0)),
        x.if_(
            x.ident("c"),
            x.block(vec![x.ret(x.ident("v"))]),
            Some(x.block(vec![x.declare(DeclKind::Let, "v", x.num(1.0)), x.ret(x.ident("v"))])),
        ),
    ]);
    assert!(apply(&ELSE_AFTER_EXIT, &clash).is_none());
}

#[test]
fn test_shorter_dispatch_guard_moves_first() {
    let x = IrBuilder::new();
    let guard = |lit: &str, body: Vec<Node>| {
        x.if_(x.strict_eq(x.field(x.ident("request"), "method"), x.str(lit)), x.block(body), None)
    };
    let long = || vec![x.call_named("log", vec![x.str("get")]), x.ret(x.num(200.0))];
    let short = || vec![x.ret(x.num(204.0))];
    let block = x.block(vec![guard("GET", long()), guard("OPTIONS", short())]);
    let expected = x.block(vec![guard("OPTIONS", short()), guard("GET", long())]);
    assert_rewrites(&DISPATCH_GUARD_ORDER, &block, &expected);

    // Already ordered.
    assert!(apply(&DISPATCH_GUARD_ORDER, &expected).is_none());
}

// ─── Declarations ──────────────────────────────────────────────────

#[test]
fn test_dead_temporaries_go_but_calls_stay() {
    let x = IrBuilder::new();
    let block = x.block(vec![
        x.declare(DeclKind::Let, "unused", x.num(0.0)),
        x.ret(x.num(1.0)),
    ]);
    assert_rewrites(&DEAD_STORE_ELIMINATION, &block, &x.block(vec![x.ret(x.num(1.0))]));

    let effectful = x.block(vec![
        x.declare(DeclKind::Let, "r", x.call_named("fetch", vec![x.str("/")])),
        x.ret(x.num(1.0)),
    ]);
    let expected = x.block(vec![x.call_named("fetch", vec![x.str("/")]), x.ret(x.num(1.0))]);
    assert_rewrites(&DEAD_STORE_ELIMINATION, &effectful, &expected);
}

#[test]
fn test_unread_function_local_loses_every_store() {
    let x = IrBuilder::new();
    let f = x.function(
        "f",
        &["a"],
        x.block(vec![
            x.declare(DeclKind::Var, "result", x.null()),
            x.if_(x.ident("a"), x.assign(x.ident("result"), x.num(1.0)), None),
            x.ret(x.ident("a")),
        ]),
    );
    let expected = x.function(
        "f",
        &["a"],
        x.block(vec![x.if_(x.ident("a"), x.block(vec![]), None), x.ret(x.ident("a"))]),
    );
    assert_rewrites(&DEAD_STORE_ELIMINATION, &f, &expected);
}

#[test]
fn test_single_use_temporary_inlines_into_condition() {
    let x = IrBuilder::new();
    let block = x.block(vec![
        x.declare(DeclKind::Let, "tmp1", x.field(x.ident("request"), "method")),
        x.if_(
            x.strict_eq(x.ident("tmp1"), x.str("OPTIONS")),
            x.block(vec![x.ret(x.num(204.0))]),
            None,
        ),
    ]);
    let expected = x.block(vec![x.if_(
        x.strict_eq(x.field(x.ident("request"), "method"), x.str("OPTIONS")),
        x.block(vec![x.ret(x.num(204.0))]),
        None,
    )]);
    assert_rewrites(&SINGLE_USE_TEMPORARY_INLINE, &block, &expected);
}

#[test]
fn test_effectful_initializers_only_inline_as_the_whole_head() {
    let x = IrBuilder::new();
    let parse = || x.await_method(x.ident("request"), "json", vec![]);
    let whole = x.block(vec![x.declare(DeclKind::Const, "b", parse()), x.ret(x.ident("b"))]);
    assert_rewrites(&SINGLE_USE_TEMPORARY_INLINE, &whole, &x.block(vec![x.ret(parse())]));

    let nested = x.block(vec![
        x.declare(DeclKind::Const, "b", parse()),
        x.ret(x.field(x.ident("b"), "url")),
    ]);
    assert!(apply(&SINGLE_USE_TEMPORARY_INLINE, &nested).is_none());

    // Arguments are not evaluated first.
    let argument = x.block(vec![
        x.declare(DeclKind::Const, "k", x.method(x.str("a"), "toUpperCase", vec![])),
        x.ret(x.call_named("JSONify", vec![x.ident("k")])),
    ]);
    assert!(apply(&SINGLE_USE_TEMPORARY_INLINE, &argument).is_none());
}

#[test]
fn test_let_without_reassignment_becomes_const() {
    let x = IrBuilder::new();
    let block = x.block(vec![
        x.declare(DeclKind::Let, "a", x.num(1.0)),
        x.declare(DeclKind::Let, "b", x.num(2.0)),
        x.assign(x.ident("b"), x.num(3.0)),
        x.ret(x.binary(BinOp::Add, x.ident("a"), x.ident("b"))),
    ]);
    let expected = x.block(vec![
        x.declare(DeclKind::Const, "a", x.num(1.0)),
        x.declare(DeclKind::Let, "b", x.num(2.0)),
        x.assign(x.ident("b"), x.num(3.0)),
        x.ret(x.binary(BinOp::Add, x.ident("a"), x.ident("b"))),
    ]);
    assert_rewrites(&CONST_PROMOTION, &block, &expected);
}
