use crate::equiv::interp::{request, Flow, Interpreter, Limits};
use crate::equiv::value::Value;
use crate::equiv::EquivalenceChecker;
use crate::runtime::HelperCatalog;
use crate::*;

const LIMITS: Limits = Limits {
    step_budget: 20_000,
    max_call_depth: 64,
};

fn fetch(program: &Program, method: &str, body: &str) -> Result<Value, Flow> {
    let helpers = HelperCatalog::standard();
    Interpreter::new(program, &helpers, LIMITS).call_entry("fetch", vec![request(method, body), Value::Env])
}

fn response(program: &Program, method: &str, body: &str) -> (u16, String) {
    match fetch(program, method, body) {
        Ok(Value::Response { status, body }) => (status, body),
        other => panic!("{} {}: expected a response, got {:?}", method, body, other),
    }
}

#[test]
fn test_async_worker_compresses() {
    let original = samples::worker_async();
    let out = Simplifier::default().compile(&original);
    assert!(out.converged(), "{:?}", out.errors);
    assert!(out.errors.is_empty(), "{:?}", out.errors);

    let lines = emit::OutputSize::of(&out.text).lines;
    assert!(lines <= 40, "{} lines:\n{}", lines, out.text);
    assert!(lines < out.report.totals.size_before.lines);
    assert!(!out.text.contains("rt_"), "{}", out.text);
    assert!(!out.text.contains("result"), "{}", out.text);
    assert!(out.text.contains(r#"if (request.method === "OPTIONS") {"#), "{}", out.text);
    assert!(out.text.contains(r#""POST""#), "{}", out.text);
    assert!(out.text.contains("await request.json()"), "{}", out.text);
    assert!(out.text.contains(r#"'{"error":"Missing url"}'"#), "{}", out.text);
    assert!(out.text.ends_with("export default { fetch };\n"));

    let fetch_report = out.report.function("fetch").unwrap();
    assert_eq!(fetch_report.tier, Tier::Tier3);
    assert_eq!(fetch_report.tier_after, Tier::Tier1);
}

#[test]
fn test_async_worker_keeps_behavior() {
    let original = samples::worker_async();
    let simplified = Simplifier::default().simplify(&original).unwrap();
    for program in [&original, &simplified] {
        assert_eq!(response(program, "OPTIONS", ""), (204, String::new()));
        assert_eq!(
            response(program, "GET", ""),
            (405, r#"{"error":"Method not allowed"}"#.to_string())
        );
        assert_eq!(
            response(program, "POST", r#"{"url":""}"#),
            (400, r#"{"error":"Missing url"}"#.to_string())
        );
        let (status, body) = response(program, "POST", r#"{"url":"http://x"}"#);
        assert_eq!(status, 200);
        assert!(body.contains(r#""ok":true"#));
        assert!(body.contains(r#""url":"http://x""#));
        assert!(body.contains(r#""key_env":"OPENAI_KEY""#));
        assert!(matches!(fetch(program, "POST", "{"), Err(Flow::Throw(_))));
    }

    let checker = EquivalenceChecker::new(&EngineConfig::default(), &HelperCatalog::standard());
    assert!(checker.check(&original, &simplified).is_equivalent());
}

#[test]
fn test_minimal_worker() {
    let out = Simplifier::default().compile(&samples::worker_minimal());
    insta::assert_snapshot!(out.text, @r#"
    function fetch(request, env) {
      if (request.method === "OPTIONS") {
        return new Response("", { status: 204 });
      }
      return new Response('{"ok":true}', { status: 200 });
    }

    export default { fetch };
    "#);
}

#[test]
fn test_strings_worker_uses_natives() {
    let out = Simplifier::default().compile(&samples::worker_strings());
    assert!(out.errors.is_empty(), "{:?}", out.errors);
    assert!(out
        .text
        .contains(r#"return name.toUpperCase().replaceAll("-", "_").replaceAll(".", "_");"#));
    assert!(out.text.contains(r#"'{"env_key":"' + envKey + '"}'"#), "{}", out.text);
    assert_eq!(
        response(&out.program, "POST", ""),
        (200, r#"{"env_key":"OPENAI_KEY"}"#.to_string())
    );
}

#[test]
fn test_async_boundary_is_reported_unsupported() {
    let out = Simplifier::default().compile(&samples::worker_boundary());
    assert!(out.converged());
    assert!(out.text.contains("rt_async_boundary(handle, request, env)"));
    assert!(out.errors.iter().any(|e| matches!(
        e,
        SimplifyError::UnsupportedPattern { function, pattern, .. }
            if function == "fetch" && pattern == "async-error-conversion"
    )));
    assert!(out.errors.iter().all(|e| !e.is_fatal()));
    assert!(out.diagnostics().iter().all(|d| !d.is_error()));
    assert_eq!(out.report.tier, Tier::Tier3);
    assert_eq!(out.report.warnings.len(), out.errors.len());

    // The boundary turns a malformed body into a 500 before and after.
    assert_eq!(response(&samples::worker_boundary(), "POST", "{").0, 500);
    assert_eq!(response(&out.program, "POST", "{").0, 500);
}

#[test]
fn test_compile_all_keeps_input_order() {
    let simplifier = Simplifier::default();
    let units = samples::all();
    let outputs = simplifier.compile_all(&units);
    let names: Vec<&str> = outputs.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, samples::NAMES.to_vec());
    for (unit, out) in units.iter().zip(&outputs) {
        assert_eq!(out.text, simplifier.compile(unit).text);
    }
}

#[test]
fn test_front_end_errors_pass_through() {
    let diag = diagnostic::Diagnostic::error("unexpected token".to_string(), span::Span::dummy());
    match Simplifier::default().compile_result(Err(vec![diag])) {
        Err(SimplifyError::Parse(diags)) => assert_eq!(diags[0].message, "unexpected token"),
        other => panic!("expected parse passthrough, got {:?}", other.map(|o| o.name)),
    }
    let ok = Simplifier::default().compile_result(Ok(samples::worker_minimal()));
    assert!(ok.is_ok_and(|o| o.errors.is_empty()));
}

#[test]
fn test_discovered_config_is_used() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("jsinn.toml"), "[simplify]\nmax_passes = 1\n").unwrap();
    let nested = dir.path().join("src");
    std::fs::create_dir(&nested).unwrap();
    let simplifier = Simplifier::discover(&nested).unwrap();
    assert_eq!(simplifier.config().max_passes, 1);

    let out = simplifier.compile(&samples::worker_async());
    assert!(!out.converged());
    assert!(matches!(
        out.errors[0],
        SimplifyError::NonConvergence { passes: 1, .. }
    ));
    assert_eq!(out.text, emit_program(&samples::worker_async()));
}

#[test]
fn test_body_field_named_method_keeps_case_folding() {
    let x = IrBuilder::new();
    let handler = x.async_function(
        "fetch",
        &["request", "env"],
        x.block(vec![
            x.declare(ir::DeclKind::Const, "body", x.await_method(x.ident("request"), "json", vec![])),
            x.if_(
                x.call_named(
                    "rt_eq_ignore_case",
                    vec![x.field(x.ident("body"), "method"), x.str("post")],
                ),
                x.block(vec![x.ret(x.construct("Response", vec![x.str("yes")]))]),
                None,
            ),
            x.ret(x.construct("Response", vec![x.str("no")])),
        ]),
    );
    let unit = ProgramBuilder::new("body_method").decl(handler).entry("fetch").finish();

    let out = Simplifier::default().compile(&unit);
    let fetch_report = out.report.function("fetch").unwrap();
    assert!(!fetch_report.applied.contains(&"method-case-normalize"), "{}", out.text);
    assert!(!out.text.contains(r#"body.method === "POST""#), "{}", out.text);
    for program in [&unit, &out.program] {
        assert_eq!(response(program, "POST", r#"{"method":"post"}"#), (200, "yes".to_string()));
        assert_eq!(response(program, "POST", r#"{"method":"get"}"#), (200, "no".to_string()));
    }
}
