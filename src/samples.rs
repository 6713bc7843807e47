//! Scaffolded IR of the benchmark handlers, shaped the way the front end
//! emits it: boxed values, a staged `result` variable, reflective lookups
//! and generic string helpers.

use crate::ir::builder::{IrBuilder, ProgramBuilder};
use crate::ir::{BinOp, DeclKind, Node, Program};
use crate::span::Span;

pub const NAMES: [&str; 4] = ["worker_minimal", "worker_strings", "worker_async", "worker_boundary"];

pub fn by_name(name: &str) -> Option<Program> {
    match name {
        "worker_minimal" => Some(worker_minimal()),
        "worker_strings" => Some(worker_strings()),
        "worker_async" => Some(worker_async()),
        "worker_boundary" => Some(worker_boundary()),
        _ => None,
    }
}

pub fn all() -> Vec<Program> {
    vec![worker_minimal(), worker_strings(), worker_async(), worker_boundary()]
}

// ─── Shared shapes ─────────────────────────────────────────────────

fn status(x: &IrBuilder, code: f64) -> Node {
    x.record(vec![("status", x.num(code))])
}

/// `result = new Response(body, { status }); return result;`
fn staged_response(x: &IrBuilder, body: Node, code: f64) -> Vec<Node> {
    vec![
        x.assign(x.ident("result"), x.construct("Response", vec![body, status(x, code)])),
        x.ret(x.ident("result")),
    ]
}

fn error_json(x: &IrBuilder, message: &str) -> Node {
    x.call_named("rt_to_json", vec![x.record(vec![("error", x.str(message))])])
}

fn staged_result(x: &IrBuilder) -> Node {
    x.declare(DeclKind::Var, "result", x.null())
}

/// Span of source line `n` in sample file `file`.
fn line(x: &IrBuilder, file: u16, n: u32) -> &IrBuilder {
    x.at(Span::new(file, n * 64, n * 64 + 63))
}

// ─── Samples ───────────────────────────────────────────────────────

/// Tier 2: one OPTIONS guard and a constant JSON response.
pub fn worker_minimal() -> Program {
    let x = IrBuilder::new();
    line(&x, 1, 1);
    let mut body = vec![staged_result(&x)];
    line(&x, 1, 2);
    body.push(x.declare(DeclKind::Let, "unused", x.call_named("rt_box", vec![x.num(0.0)])));
    line(&x, 1, 3);
    let is_options = x.call_named(
        "rt_eq_str",
        vec![
            x.call_named("rt_get_field", vec![x.ident("request"), x.str("method")]),
            x.str("OPTIONS"),
        ],
    );
    body.push(x.if_(is_options, x.block(staged_response(&x, x.str(""), 204.0)), None));
    line(&x, 1, 6);
    let ok = x.call_named("rt_to_json", vec![x.record(vec![("ok", x.bool(true))])]);
    body.extend(staged_response(&x, ok, 200.0));

    ProgramBuilder::new("worker_minimal")
        .decl(x.function("fetch", &["request", "env"], x.block(body)))
        .entry("fetch")
        .finish()
}

/// Tier 2: a sanitizing helper built from generic string helpers and a
/// handler concatenating its result into JSON text by hand.
pub fn worker_strings() -> Program {
    let x = IrBuilder::new();
    line(&x, 2, 1);
    let sanitize = x.function(
        "sanitizeEnvVar",
        &["name"],
        x.block(vec![
            staged_result(&x),
            x.declare(DeclKind::Let, "tmp1", x.call_named("rt_to_upper", vec![x.ident("name")])),
            x.declare(
                DeclKind::Let,
                "tmp2",
                x.call_named("rt_replace_all", vec![x.ident("tmp1"), x.str("-"), x.str("_")]),
            ),
            x.assign(
                x.ident("result"),
                x.call_named("rt_replace_all", vec![x.ident("tmp2"), x.str("."), x.str("_")]),
            ),
            x.ret(x.ident("result")),
        ]),
    );

    line(&x, 2, 8);
    let mut body = vec![staged_result(&x)];
    let is_options = x.call_named(
        "rt_eq_str",
        vec![
            x.call_named("rt_get_field", vec![x.ident("request"), x.str("method")]),
            x.str("OPTIONS"),
        ],
    );
    line(&x, 2, 10);
    body.push(x.if_(is_options, x.block(staged_response(&x, x.str(""), 204.0)), None));
    line(&x, 2, 13);
    body.push(x.declare(
        DeclKind::Let,
        "envKey",
        x.call_named("sanitizeEnvVar", vec![x.str("openai-key")]),
    ));
    line(&x, 2, 14);
    let inner = x.call_named("rt_concat", vec![x.str("{\"env_key\":\""), x.ident("envKey")]);
    body.push(x.declare(
        DeclKind::Let,
        "msg",
        x.call_named("rt_concat", vec![inner, x.str("\"}")]),
    ));
    line(&x, 2, 15);
    body.extend(staged_response(&x, x.ident("msg"), 200.0));

    ProgramBuilder::new("worker_strings")
        .decl(sanitize)
        .decl(x.function("fetch", &["request", "env"], x.block(body)))
        .entry("fetch")
        .finish()
}

/// Tier 3: method dispatch through a case-folding helper, nested
/// `if/else` with staged returns in every branch, and request body parsing.
pub fn worker_async() -> Program {
    let x = IrBuilder::new();
    line(&x, 3, 1);
    let mut body = vec![staged_result(&x)];
    line(&x, 3, 2);
    body.push(x.declare(DeclKind::Let, "unused", x.call_named("rt_box", vec![x.num(0.0)])));
    line(&x, 3, 3);
    body.push(x.declare(
        DeclKind::Let,
        "tmp1",
        x.call_named("rt_box", vec![x.field(x.ident("request"), "method")]),
    ));

    line(&x, 3, 10);
    let missing_url = x.binary(
        BinOp::StrictEq,
        x.call_named("rt_str_len", vec![x.ident("url")]),
        x.num(0.0),
    );
    line(&x, 3, 11);
    let reject_missing = x.block(staged_response(&x, error_json(&x, "Missing url"), 400.0));
    line(&x, 3, 14);
    let mut accept = vec![x.declare(
        DeclKind::Let,
        "envKey",
        x.call_named("rt_to_upper", vec![x.str("OPENAI_KEY")]),
    )];
    line(&x, 3, 15);
    accept.push(x.declare(
        DeclKind::Let,
        "resp",
        x.call_named(
            "rt_to_json",
            vec![x.record(vec![
                ("ok", x.bool(true)),
                ("url", x.ident("url")),
                ("key_env", x.ident("envKey")),
            ])],
        ),
    ));
    line(&x, 3, 16);
    accept.extend(staged_response(&x, x.ident("resp"), 200.0));

    line(&x, 3, 7);
    let post = x.block(vec![
        x.declare(
            DeclKind::Let,
            "body",
            x.call_named("rt_box", vec![x.await_method(x.ident("request"), "json", vec![])]),
        ),
        x.declare(
            DeclKind::Let,
            "url",
            x.call_named(
                "rt_unbox",
                vec![x.call_named("rt_get_field", vec![x.ident("body"), x.str("url")])],
            ),
        ),
        x.if_(missing_url, reject_missing, Some(x.block(accept))),
    ]);
    line(&x, 3, 19);
    let not_allowed = x.block(staged_response(&x, error_json(&x, "Method not allowed"), 405.0));
    line(&x, 3, 6);
    let is_post = x.call_named(
        "rt_eq_ignore_case",
        vec![
            x.call_named("rt_get_field", vec![x.ident("request"), x.str("method")]),
            x.str("post"),
        ],
    );
    let dispatch = x.if_(is_post, post, Some(not_allowed));

    line(&x, 3, 4);
    let is_options = x.call_named("rt_eq_str", vec![x.ident("tmp1"), x.str("OPTIONS")]);
    let preflight = x.block(staged_response(&x, x.str(""), 204.0));
    body.push(x.if_(is_options, preflight, Some(x.block(vec![dispatch]))));

    ProgramBuilder::new("worker_async")
        .decl(x.async_function("fetch", &["request", "env"], x.block(body)))
        .entry("fetch")
        .finish()
}

/// Tier 3: the handler body sits behind an async error-conversion
/// boundary, which no rule rewrites.
pub fn worker_boundary() -> Program {
    let x = IrBuilder::new();
    line(&x, 4, 1);
    let handle = x.async_function(
        "handle",
        &["request", "env"],
        x.block(vec![
            x.declare(
                DeclKind::Let,
                "body",
                x.call_named("rt_box", vec![x.await_method(x.ident("request"), "json", vec![])]),
            ),
            x.ret(x.construct(
                "Response",
                vec![
                    x.call_named(
                        "rt_to_json",
                        vec![x.record(vec![(
                            "echo",
                            x.call_named("rt_get_field", vec![x.ident("body"), x.str("url")]),
                        )])],
                    ),
                    status(&x, 200.0),
                ],
            )),
        ]),
    );
    line(&x, 4, 6);
    let fetch = x.async_function(
        "fetch",
        &["request", "env"],
        x.block(vec![x.ret(x.call_named(
            "rt_async_boundary",
            vec![x.ident("handle"), x.ident("request"), x.ident("env")],
        ))]),
    );

    ProgramBuilder::new("worker_boundary")
        .decl(handle)
        .decl(fetch)
        .entry("fetch")
        .finish()
}
