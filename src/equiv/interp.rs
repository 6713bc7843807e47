//! Reference interpreter for the IR.
//!
//! Executes a program against one request fixture with JavaScript value
//! semantics for the subset the front end produces. Runtime helpers run
//! their documented contracts; anything the interpreter does not model is
//! a capability call, recorded with its rendered arguments and answered
//! with an opaque value. `await` on a non-promise is the identity, so
//! async functions run synchronously.

use std::collections::HashMap;
use std::rc::Rc;

use super::value::{Builtin, Closure, RequestData, ScopeId, Value};
use crate::ir::{BinOp, CallStyle, DeclKind, FunctionDef, Literal, Node, NodeKind, Program};
use crate::runtime::HelperCatalog;

/// Non-local exits of evaluation.
#[derive(Clone, Debug)]
pub enum Flow {
    Return(Value),
    /// The message is kept for debugging; observations ignore it.
    Throw(String),
    /// Step budget or call depth exhausted.
    Budget,
}

type Exec<T> = Result<T, Flow>;

fn throw<T>(message: impl Into<String>) -> Exec<T> {
    Err(Flow::Throw(message.into()))
}

#[derive(Clone, Copy, Debug)]
pub struct Limits {
    pub step_budget: u64,
    pub max_call_depth: u32,
}

#[derive(Clone, Debug)]
struct Slot {
    value: Value,
    constant: bool,
}

/// One lexical scope. Scopes live in an arena owned by the interpreter, so
/// closures refer to their defining scope by id and outlive the call that
/// created them.
#[derive(Default)]
struct Scope {
    parent: Option<ScopeId>,
    vars: HashMap<String, Slot>,
}

/// One activation: the innermost scope, and the function scope that `var`
/// and nested function declarations land in.
#[derive(Clone, Copy)]
struct Frame {
    current: ScopeId,
    function: ScopeId,
}

impl Frame {
    fn at(scope: ScopeId) -> Self {
        Self {
            current: scope,
            function: scope,
        }
    }
}

pub struct Interpreter<'p> {
    helpers: &'p HelperCatalog,
    functions: HashMap<String, Rc<FunctionDef>>,
    program: &'p Program,
    scopes: Vec<Scope>,
    limits: Limits,
    steps: u64,
    depth: u32,
    effects: Vec<String>,
    opaque_seq: u32,
}

impl<'p> Interpreter<'p> {
    pub fn new(program: &'p Program, helpers: &'p HelperCatalog, limits: Limits) -> Self {
        let functions = program
            .functions()
            .map(|def| (def.name.clone(), Rc::new(def.clone())))
            .collect();
        Self {
            helpers,
            functions,
            program,
            scopes: vec![Scope::default()],
            limits,
            steps: 0,
            depth: 0,
            effects: Vec::new(),
            opaque_seq: 0,
        }
    }

    /// Capability calls made so far, in order.
    pub fn effects(&self) -> &[String] {
        &self.effects
    }

    /// Run top-level statements, then call `name` with `args`.
    pub fn call_entry(&mut self, name: &str, args: Vec<Value>) -> Exec<Value> {
        let program = self.program;
        let mut globals = Frame::at(ScopeId::GLOBAL);
        for decl in &program.decls {
            if !matches!(decl.kind, NodeKind::FunctionDef(_)) {
                self.exec(&mut globals, decl)?;
            }
        }
        match self.functions.get(name).cloned() {
            Some(def) => self.call_function(&def, ScopeId::GLOBAL, args),
            None => throw(format!("ReferenceError: {} is not defined", name)),
        }
    }

    fn tick(&mut self) -> Exec<()> {
        self.steps += 1;
        if self.steps > self.limits.step_budget {
            Err(Flow::Budget)
        } else {
            Ok(())
        }
    }

    fn call_function(&mut self, def: &Rc<FunctionDef>, env: ScopeId, args: Vec<Value>) -> Exec<Value> {
        if self.depth >= self.limits.max_call_depth {
            return Err(Flow::Budget);
        }
        self.depth += 1;
        let mut frame = Frame::at(self.open_scope(env));
        let mut args = args.into_iter();
        for param in &def.params {
            self.declare(&frame, DeclKind::Let, param, args.next().unwrap_or(Value::Undefined));
        }
        let result = self.exec(&mut frame, &def.body);
        self.depth -= 1;
        match result {
            Ok(()) => Ok(Value::Undefined),
            Err(Flow::Return(value)) => Ok(value),
            Err(other) => Err(other),
        }
    }

    fn call_closure(&mut self, closure: &Closure, args: Vec<Value>) -> Exec<Value> {
        self.call_function(&closure.def, closure.env, args)
    }

    // ─── Scopes ────────────────────────────────────────────────────

    fn open_scope(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent: Some(parent),
            vars: HashMap::new(),
        });
        id
    }

    fn declare(&mut self, frame: &Frame, kind: DeclKind, name: &str, value: Value) {
        let target = if kind.is_block_scoped() {
            frame.current
        } else {
            frame.function
        };
        if let Some(scope) = self.scopes.get_mut(target.index()) {
            scope.vars.insert(
                name.to_string(),
                Slot {
                    value,
                    constant: kind == DeclKind::Const,
                },
            );
        }
    }

    /// Scope holding `name`, searched outwards from `from`.
    fn resolve(&self, from: ScopeId, name: &str) -> Option<ScopeId> {
        let mut next = Some(from);
        while let Some(id) = next {
            let scope = self.scopes.get(id.index())?;
            if scope.vars.contains_key(name) {
                return Some(id);
            }
            next = scope.parent;
        }
        None
    }

    fn get(&self, from: ScopeId, name: &str) -> Option<&Value> {
        let id = self.resolve(from, name)?;
        self.scopes.get(id.index())?.vars.get(name).map(|slot| &slot.value)
    }

    fn slot_mut(&mut self, from: ScopeId, name: &str) -> Option<&mut Slot> {
        let id = self.resolve(from, name)?;
        self.scopes.get_mut(id.index())?.vars.get_mut(name)
    }

    // ─── Statements ────────────────────────────────────────────────

    fn exec(&mut self, frame: &mut Frame, stmt: &Node) -> Exec<()> {
        self.tick()?;
        match &stmt.kind {
            NodeKind::Block(stmts) => {
                let outer = frame.current;
                frame.current = self.open_scope(outer);
                let mut result = Ok(());
                for s in stmts {
                    result = self.exec(frame, s);
                    if result.is_err() {
                        break;
                    }
                }
                frame.current = outer;
                result
            }
            NodeKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(frame, expr)?,
                    None => Value::Undefined,
                };
                Err(Flow::Return(value))
            }
            NodeKind::Conditional {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval(frame, cond)?.truthy() {
                    self.exec(frame, then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.exec(frame, else_branch)
                } else {
                    Ok(())
                }
            }
            NodeKind::FunctionDef(def) => {
                let value = self.function_value(frame, def);
                self.declare(frame, DeclKind::Var, &def.name, value);
                Ok(())
            }
            _ => self.eval(frame, stmt).map(|_| ()),
        }
    }

    /// A closure over the innermost scope of `frame`.
    fn function_value(&self, frame: &Frame, def: &FunctionDef) -> Value {
        let def = match self.functions.get(&def.name) {
            Some(shared) if **shared == *def => shared.clone(),
            _ => Rc::new(def.clone()),
        };
        Value::Function(Closure {
            def,
            env: frame.current,
        })
    }

    // ─── Expressions ───────────────────────────────────────────────

    fn eval(&mut self, frame: &mut Frame, expr: &Node) -> Exec<Value> {
        self.tick()?;
        match &expr.kind {
            NodeKind::Literal(lit) => self.literal(frame, lit),
            NodeKind::Identifier(name) => self.lookup(frame, name),
            NodeKind::BinaryOp { op, lhs, rhs } => {
                let left = self.eval(frame, lhs)?;
                match op {
                    BinOp::And if !left.truthy() => Ok(left),
                    BinOp::Or if left.truthy() => Ok(left),
                    BinOp::And | BinOp::Or => self.eval(frame, rhs),
                    _ => {
                        let right = self.eval(frame, rhs)?;
                        Ok(binary(*op, &left, &right))
                    }
                }
            }
            NodeKind::Call {
                callee, args, style, ..
            } => self.call(frame, callee, args, *style),
            NodeKind::Conditional {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval(frame, cond)?.truthy() {
                    self.eval(frame, then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.eval(frame, else_branch)
                } else {
                    Ok(Value::Undefined)
                }
            }
            NodeKind::FieldAccess { object, field } => {
                let object = self.eval(frame, object)?;
                get_property(&object, field)
            }
            NodeKind::Assignment { decl, target, value } => self.assign(frame, *decl, target, value),
            NodeKind::FunctionDef(def) => Ok(self.function_value(frame, def)),
            NodeKind::Block(_) | NodeKind::Return(_) => throw("SyntaxError: statement in expression position"),
        }
    }

    fn literal(&mut self, frame: &mut Frame, lit: &Literal) -> Exec<Value> {
        Ok(match lit {
            Literal::Null => Value::Null,
            Literal::Undefined => Value::Undefined,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Number(n) => Value::Number(*n),
            Literal::Str(s) => Value::Str(s.clone()),
            Literal::Record(fields) => {
                let object = Value::object(Vec::with_capacity(fields.len()));
                for (key, node) in fields {
                    let value = self.eval(frame, node)?;
                    set_property(&object, key, value)?;
                }
                object
            }
        })
    }

    fn lookup(&self, frame: &Frame, name: &str) -> Exec<Value> {
        if let Some(value) = self.get(frame.current, name) {
            return Ok(value.clone());
        }
        if let Some(def) = self.functions.get(name) {
            return Ok(Value::Function(Closure {
                def: def.clone(),
                env: ScopeId::GLOBAL,
            }));
        }
        Ok(match name {
            "undefined" => Value::Undefined,
            "NaN" => Value::Number(f64::NAN),
            "Infinity" => Value::Number(f64::INFINITY),
            "JSON" => Value::Builtin(Builtin::Json),
            "console" => Value::Builtin(Builtin::Console),
            "Response" => Value::Builtin(Builtin::Response),
            _ => return throw(format!("ReferenceError: {} is not defined", name)),
        })
    }

    fn assign(&mut self, frame: &mut Frame, decl: Option<DeclKind>, target: &Node, value: &Node) -> Exec<Value> {
        match (&target.kind, decl) {
            (NodeKind::Identifier(name), Some(kind)) => {
                let value = self.eval(frame, value)?;
                self.declare(frame, kind, name, value.clone());
                Ok(value)
            }
            (NodeKind::Identifier(name), None) => {
                let value = self.eval(frame, value)?;
                match self.slot_mut(frame.current, name) {
                    Some(slot) if slot.constant => throw("TypeError: assignment to constant variable"),
                    Some(slot) => {
                        slot.value = value.clone();
                        Ok(value)
                    }
                    None => throw(format!("ReferenceError: {} is not defined", name)),
                }
            }
            (NodeKind::FieldAccess { object, field }, None) => {
                let object = self.eval(frame, object)?;
                let value = self.eval(frame, value)?;
                set_property(&object, field, value.clone())?;
                Ok(value)
            }
            _ => throw("SyntaxError: invalid assignment target"),
        }
    }

    fn eval_args(&mut self, frame: &mut Frame, args: &[Node]) -> Exec<Vec<Value>> {
        args.iter().map(|a| self.eval(frame, a)).collect()
    }

    // ─── Calls ─────────────────────────────────────────────────────

    fn call(&mut self, frame: &mut Frame, callee: &Node, args: &[Node], style: CallStyle) -> Exec<Value> {
        if style == CallStyle::New {
            let args = self.eval_args(frame, args)?;
            return match callee.as_ident() {
                Some("Response") => construct_response(&args),
                Some(name) => Ok(self.capability(&format!("new {}", name), &args)),
                None => throw("TypeError: not a constructor"),
            };
        }
        match &callee.kind {
            NodeKind::FieldAccess { object, field } => {
                let receiver = self.eval(frame, object)?;
                let args = self.eval_args(frame, args)?;
                self.call_method(&receiver, field, args)
            }
            NodeKind::Identifier(name) if self.get(frame.current, name).is_none() => {
                let args = self.eval_args(frame, args)?;
                if let Some(def) = self.functions.get(name).cloned() {
                    self.call_function(&def, ScopeId::GLOBAL, args)
                } else if self.helpers.is_helper(name) {
                    self.call_helper(name, args)
                } else {
                    Ok(self.capability(name, &args))
                }
            }
            _ => {
                let function = self.eval(frame, callee)?;
                let args = self.eval_args(frame, args)?;
                match function {
                    Value::Function(f) => self.call_closure(&f, args),
                    other => throw(format!("TypeError: {} is not a function", other.type_name())),
                }
            }
        }
    }

    fn call_method(&mut self, receiver: &Value, method: &str, args: Vec<Value>) -> Exec<Value> {
        match receiver {
            Value::Str(s) => string_method(s, method, &args),
            Value::Request(request) => match method {
                "json" => parse_json(&request.body),
                "text" => Ok(Value::Str(request.body.clone())),
                _ => Ok(self.capability(&format!("request.{}", method), &args)),
            },
            Value::Builtin(Builtin::Json) => match method {
                "stringify" => stringify(args.first().unwrap_or(&Value::Undefined)),
                "parse" => parse_json(&args.first().unwrap_or(&Value::Undefined).to_js_string()),
                _ => throw(format!("TypeError: JSON.{} is not a function", method)),
            },
            Value::Builtin(Builtin::Console) => Ok(self.capability(&format!("console.{}", method), &args)),
            Value::Binding(path) => Ok(self.capability(&format!("env.{}.{}", path, method), &args)),
            Value::Opaque(id) => Ok(self.capability(&format!("{}.{}", id, method), &args)),
            Value::Undefined | Value::Null => throw(format!(
                "TypeError: cannot read properties of {} (reading '{}')",
                receiver.type_name(),
                method
            )),
            _ => match get_property(receiver, method)? {
                Value::Function(f) => self.call_closure(&f, args),
                _ => throw(format!("TypeError: {} is not a function", method)),
            },
        }
    }

    fn call_helper(&mut self, name: &str, args: Vec<Value>) -> Exec<Value> {
        let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Undefined);
        match name {
            "rt_box" | "rt_unbox" => Ok(arg(0)),
            "rt_get_field" => get_property(&arg(0), &arg(1).to_js_string()),
            "rt_eq_ignore_case" => Ok(Value::Bool(
                arg(0).to_js_string().to_uppercase() == arg(1).to_js_string().to_uppercase(),
            )),
            "rt_to_upper" => Ok(Value::Str(expect_str(&arg(0))?.to_uppercase())),
            "rt_to_upper_ascii" => Ok(Value::Str(expect_str(&arg(0))?.to_ascii_uppercase())),
            "rt_to_lower" => Ok(Value::Str(expect_str(&arg(0))?.to_lowercase())),
            "rt_replace_all" | "rt_replace_first" => {
                let (s, from, to) = (arg(0), arg(1), arg(2));
                let (s, from, to) = (expect_str(&s)?, expect_str(&from)?, expect_str(&to)?);
                Ok(Value::Str(if name == "rt_replace_all" {
                    s.replace(from, to)
                } else {
                    s.replacen(from, to, 1)
                }))
            }
            "rt_to_json" => stringify(&arg(0)),
            "rt_concat" => Ok(Value::Str(args.iter().map(Value::to_js_string).collect())),
            "rt_eq_str" => Ok(Value::Bool(arg(0).strict_eq(&arg(1)))),
            "rt_str_len" => Ok(Value::Number(expect_str(&arg(0))?.len() as f64)),
            "rt_async_boundary" => match arg(0) {
                Value::Function(f) => match self.call_closure(&f, args.into_iter().skip(1).collect()) {
                    Err(Flow::Throw(_)) => Ok(Value::Response {
                        status: 500,
                        body: r#"{"error":"Internal error"}"#.to_string(),
                    }),
                    other => other,
                },
                other => throw(format!("TypeError: {} is not a function", other.type_name())),
            },
            _ => throw(format!("TypeError: no contract for helper {}", name)),
        }
    }

    /// Record an unmodeled call and answer with a fresh opaque value.
    fn capability(&mut self, name: &str, args: &[Value]) -> Value {
        let rendered: Vec<String> = args.iter().map(Value::render).collect();
        self.effects.push(format!("{}({})", name, rendered.join(", ")));
        self.opaque_seq += 1;
        Value::Opaque(format!("{}#{}", name, self.opaque_seq))
    }
}

// ─── Operators ─────────────────────────────────────────────────────

fn binary(op: BinOp, left: &Value, right: &Value) -> Value {
    match op {
        BinOp::Add => match (left, right) {
            (Value::Str(_), _) | (_, Value::Str(_)) => {
                Value::Str(format!("{}{}", left.to_js_string(), right.to_js_string()))
            }
            (Value::Object(_) | Value::Array(_), _) | (_, Value::Object(_) | Value::Array(_)) => {
                Value::Str(format!("{}{}", left.to_js_string(), right.to_js_string()))
            }
            _ => Value::Number(left.to_number() + right.to_number()),
        },
        BinOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinOp::StrictEq => Value::Bool(left.strict_eq(right)),
        BinOp::StrictNe => Value::Bool(!left.strict_eq(right)),
        BinOp::LooseEq => Value::Bool(left.loose_eq(right)),
        BinOp::LooseNe => Value::Bool(!left.loose_eq(right)),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => Value::Bool(relational(op, left, right)),
        // Short-circuiting is handled by the caller.
        BinOp::And => {
            if left.truthy() {
                right.clone()
            } else {
                left.clone()
            }
        }
        BinOp::Or => {
            if left.truthy() {
                left.clone()
            } else {
                right.clone()
            }
        }
    }
}

fn relational(op: BinOp, left: &Value, right: &Value) -> bool {
    if let (Value::Str(a), Value::Str(b)) = (left, right) {
        let (a, b): (Vec<u16>, Vec<u16>) = (a.encode_utf16().collect(), b.encode_utf16().collect());
        return match op {
            BinOp::Lt => a < b,
            BinOp::Le => a <= b,
            BinOp::Gt => a > b,
            _ => a >= b,
        };
    }
    let (a, b) = (left.to_number(), right.to_number());
    match op {
        BinOp::Lt => a < b,
        BinOp::Le => a <= b,
        BinOp::Gt => a > b,
        _ => a >= b,
    }
}

// ─── Properties ────────────────────────────────────────────────────

fn get_property(object: &Value, key: &str) -> Exec<Value> {
    Ok(match object {
        Value::Undefined | Value::Null => {
            return throw(format!(
                "TypeError: cannot read properties of {} (reading '{}')",
                object.type_name(),
                key
            ))
        }
        Value::Str(s) => match key {
            "length" => Value::Number(s.encode_utf16().count() as f64),
            _ => Value::Undefined,
        },
        Value::Object(fields) => fields
            .borrow()
            .iter()
            .find(|(k, _)| k == key)
            .map_or(Value::Undefined, |(_, v)| v.clone()),
        Value::Array(items) => {
            let items = items.borrow();
            match key {
                "length" => Value::Number(items.len() as f64),
                _ => key
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or(Value::Undefined),
            }
        }
        Value::Request(request) => match key {
            "method" => Value::Str(request.method.clone()),
            "url" => Value::Str(request.url.clone()),
            _ => Value::Opaque(format!("request.{}", key)),
        },
        Value::Env => Value::Binding(key.to_string()),
        Value::Binding(path) => Value::Binding(format!("{}.{}", path, key)),
        Value::Response { status, body } => match key {
            "status" => Value::Number(*status as f64),
            "ok" => Value::Bool((200..300).contains(status)),
            "body" => Value::Str(body.clone()),
            _ => Value::Undefined,
        },
        Value::Opaque(id) => Value::Opaque(format!("{}.{}", id, key)),
        Value::Function(f) => match key {
            "name" => Value::Str(f.def.name.clone()),
            _ => Value::Undefined,
        },
        _ => Value::Undefined,
    })
}

fn set_property(object: &Value, key: &str, value: Value) -> Exec<()> {
    match object {
        Value::Undefined | Value::Null => throw(format!(
            "TypeError: cannot set properties of {} (setting '{}')",
            object.type_name(),
            key
        )),
        Value::Object(fields) => {
            let mut fields = fields.borrow_mut();
            match fields.iter_mut().find(|(k, _)| k == key) {
                Some((_, slot)) => *slot = value,
                None => fields.push((key.to_string(), value)),
            }
            Ok(())
        }
        // Writes to primitives and host objects are dropped silently.
        _ => Ok(()),
    }
}

// ─── Natives ───────────────────────────────────────────────────────

fn expect_str(value: &Value) -> Exec<&str> {
    match value {
        Value::Str(s) => Ok(s),
        other => throw(format!("TypeError: expected a string, got {}", other.type_name())),
    }
}

fn string_method(s: &str, method: &str, args: &[Value]) -> Exec<Value> {
    let arg = |i: usize| args.get(i).map_or_else(|| "undefined".to_string(), Value::to_js_string);
    Ok(match method {
        "toUpperCase" => Value::Str(s.to_uppercase()),
        "toLowerCase" => Value::Str(s.to_lowercase()),
        "trim" => Value::Str(s.trim().to_string()),
        "replace" | "replaceAll" => {
            if matches!(args.get(1), Some(Value::Function(_))) {
                return throw("TypeError: replacer functions are not supported");
            }
            Value::Str(replace_str(s, &arg(0), &arg(1), method == "replaceAll"))
        }
        "includes" => Value::Bool(s.contains(arg(0).as_str())),
        "startsWith" => Value::Bool(s.starts_with(arg(0).as_str())),
        "endsWith" => Value::Bool(s.ends_with(arg(0).as_str())),
        "toString" => Value::Str(s.to_string()),
        _ => return throw(format!("TypeError: s.{} is not a function", method)),
    })
}

/// `String.prototype.replace`/`replaceAll` with a string pattern,
/// including `$` substitution patterns in the replacement.
fn replace_str(s: &str, pattern: &str, replacement: &str, all: bool) -> String {
    let positions: Vec<usize> = if pattern.is_empty() {
        let boundaries = s.char_indices().map(|(i, _)| i).chain(std::iter::once(s.len()));
        if all {
            boundaries.collect()
        } else {
            vec![0]
        }
    } else if all {
        s.match_indices(pattern).map(|(i, _)| i).collect()
    } else {
        s.find(pattern).into_iter().collect()
    };
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for pos in positions {
        out.push_str(&s[last..pos]);
        let end = pos + pattern.len();
        out.push_str(&expand_replacement(replacement, pattern, &s[..pos], &s[end..]));
        last = end;
    }
    out.push_str(&s[last..]);
    out
}

fn expand_replacement(replacement: &str, matched: &str, before: &str, after: &str) -> String {
    let mut out = String::new();
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => out.push('$'),
            Some('&') => out.push_str(matched),
            Some('`') => out.push_str(before),
            Some('\'') => out.push_str(after),
            _ => {
                out.push('$');
                continue;
            }
        }
        chars.next();
    }
    out
}

fn stringify(value: &Value) -> Exec<Value> {
    match value.to_json() {
        Ok(Some(text)) => Ok(Value::Str(text)),
        Ok(None) => Ok(Value::Undefined),
        Err(message) => throw(format!("TypeError: {}", message)),
    }
}

fn parse_json(text: &str) -> Exec<Value> {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(json) => Ok(Value::from_json(&json)),
        Err(e) => throw(format!("SyntaxError: {}", e)),
    }
}

/// `new Response(body, init)`
fn construct_response(args: &[Value]) -> Exec<Value> {
    let body = match args.first() {
        None | Some(Value::Undefined | Value::Null) => String::new(),
        Some(other) => other.to_js_string(),
    };
    let status = match args.get(1) {
        Some(init @ Value::Object(_)) => match get_property(init, "status")? {
            Value::Undefined => 200.0,
            status => status.to_number(),
        },
        _ => 200.0,
    };
    if !(200.0..=599.0).contains(&status) || status.fract() != 0.0 {
        return throw(format!("RangeError: invalid status {}", status));
    }
    Ok(Value::Response {
        status: status as u16,
        body,
    })
}

/// The request value a handler receives for one fixture.
pub fn request(method: &str, body: &str) -> Value {
    Value::Request(Rc::new(RequestData {
        method: method.to_string(),
        url: "https://worker.test/".to_string(),
        body: body.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::{IrBuilder, ProgramBuilder};

    const LIMITS: Limits = Limits {
        step_budget: 10_000,
        max_call_depth: 16,
    };

    fn run(program: &Program, entry: &str, args: Vec<Value>) -> (Exec<Value>, Vec<String>) {
        let helpers = HelperCatalog::standard();
        let mut interp = Interpreter::new(program, &helpers, LIMITS);
        let result = interp.call_entry(entry, args);
        (result, interp.effects().to_vec())
    }

    fn single(x: &IrBuilder, name: &str, params: &[&str], body: Vec<Node>) -> Program {
        let mut p = ProgramBuilder::new("t");
        p.push_decl(x.function(name, params, x.block(body)));
        p.push_entry(name);
        p.finish()
    }

    #[test]
    fn test_replace_patterns() {
        assert_eq!(replace_str("a-b-c", "-", "_", true), "a_b_c");
        assert_eq!(replace_str("a-b-c", "-", "_", false), "a_b-c");
        assert_eq!(replace_str("ab", "", "-", true), "-a-b-");
        assert_eq!(replace_str("ab", "b", "[$&$$]", false), "a[b$]");
    }

    #[test]
    fn test_response_from_json_body() {
        let x = IrBuilder::new();
        let body = x.await_method(x.ident("request"), "json", vec![]);
        let program = single(
            &x,
            "fetch",
            &["request", "env"],
            vec![
                x.declare(DeclKind::Const, "body", body),
                x.ret(x.construct(
                    "Response",
                    vec![
                        x.call(
                            x.field(x.ident("JSON"), "stringify"),
                            vec![x.record(vec![("url", x.field(x.ident("body"), "url"))])],
                        ),
                        x.record(vec![("status", x.num(201.0))]),
                    ],
                )),
            ],
        );
        let (result, _) = run(&program, "fetch", vec![request("POST", r#"{"url":"http://x"}"#), Value::Env]);
        match result {
            Ok(Value::Response { status, body }) => {
                assert_eq!(status, 201);
                assert_eq!(body, r#"{"url":"http://x"}"#);
            }
            other => panic!("unexpected {:?}", other),
        }

        let (malformed, _) = run(&program, "fetch", vec![request("POST", "{"), Value::Env]);
        assert!(matches!(malformed, Err(Flow::Throw(_))));
    }

    #[test]
    fn test_capability_calls_are_recorded() {
        let x = IrBuilder::new();
        let program = single(
            &x,
            "fetch",
            &["request", "env"],
            vec![
                x.call(x.field(x.ident("console"), "log"), vec![x.str("hi")]),
                x.ret(x.method(x.field(x.ident("env"), "KV"), "get", vec![x.str("k")])),
            ],
        );
        let (result, effects) = run(&program, "fetch", vec![request("GET", ""), Value::Env]);
        assert!(matches!(result, Ok(Value::Opaque(_))));
        assert_eq!(effects, vec![r#"console.log("hi")"#, r#"env.KV.get("k")"#]);
    }

    #[test]
    fn test_helpers_follow_contracts() {
        let x = IrBuilder::new();
        let program = single(
            &x,
            "f",
            &["s"],
            vec![x.ret(x.call_named(
                "rt_concat",
                vec![
                    x.call_named("rt_str_len", vec![x.ident("s")]),
                    x.str(":"),
                    x.call_named("rt_replace_all", vec![x.ident("s"), x.str("é"), x.str("e")]),
                ],
            ))],
        );
        let (result, _) = run(&program, "f", vec![Value::str("été")]);
        assert!(matches!(result, Ok(Value::Str(s)) if s == "5:ete"));

        let (not_a_string, _) = run(&program, "f", vec![Value::Number(1.0)]);
        assert!(matches!(not_a_string, Err(Flow::Throw(_))));
    }

    #[test]
    fn test_async_boundary_converts_throws() {
        let x = IrBuilder::new();
        let mut p = ProgramBuilder::new("t");
        p.push_decl(x.async_function(
            "handle",
            &["request", "env"],
            x.block(vec![x.ret(x.await_method(x.ident("request"), "json", vec![]))]),
        ));
        p.push_decl(x.async_function(
            "fetch",
            &["request", "env"],
            x.block(vec![x.ret(x.call_named(
                "rt_async_boundary",
                vec![x.ident("handle"), x.ident("request"), x.ident("env")],
            ))]),
        ));
        p.push_entry("fetch");
        let program = p.finish();
        let (result, _) = run(&program, "fetch", vec![request("POST", "not json"), Value::Env]);
        assert!(matches!(result, Ok(Value::Response { status: 500, .. })));
    }

    #[test]
    fn test_step_budget_and_depth() {
        let x = IrBuilder::new();
        let program = single(&x, "loop", &[], vec![x.ret(x.call_named("loop", vec![]))]);
        let (result, _) = run(&program, "loop", vec![]);
        assert!(matches!(result, Err(Flow::Budget)));
    }

    #[test]
    fn test_nested_functions_close_over_outer_locals() {
        let x = IrBuilder::new();
        let program = single(
            &x,
            "fetch",
            &["request", "env"],
            vec![
                x.declare(DeclKind::Let, "k", x.str("v")),
                x.function("g", &[], x.block(vec![x.ret(x.ident("k"))])),
                x.assign(x.ident("k"), x.call_named("rt_concat", vec![x.ident("k"), x.str("w")])),
                x.ret(x.construct("Response", vec![x.call(x.ident("g"), vec![])])),
            ],
        );
        let (result, _) = run(&program, "fetch", vec![request("GET", ""), Value::Env]);
        assert!(matches!(result, Ok(Value::Response { status: 200, body }) if body == "vw"));
    }

    #[test]
    fn test_returned_closure_outlives_its_call() {
        let x = IrBuilder::new();
        let mut p = ProgramBuilder::new("t");
        p.push_decl(x.function(
            "make",
            &["prefix"],
            x.block(vec![
                x.function(
                    "tag",
                    &["s"],
                    x.block(vec![x.ret(x.binary(BinOp::Add, x.ident("prefix"), x.ident("s")))]),
                ),
                x.ret(x.ident("tag")),
            ]),
        ));
        p.push_decl(x.function(
            "f",
            &[],
            x.block(vec![
                x.declare(DeclKind::Const, "tag", x.call_named("make", vec![x.str("a:")])),
                x.ret(x.call(x.ident("tag"), vec![x.str("b")])),
            ]),
        ));
        p.push_entry("f");
        let (result, _) = run(&p.finish(), "f", vec![]);
        assert!(matches!(result, Ok(Value::Str(s)) if s == "a:b"));
    }

    #[test]
    fn test_const_reassignment_throws() {
        let x = IrBuilder::new();
        let program = single(
            &x,
            "f",
            &[],
            vec![
                x.declare(DeclKind::Const, "a", x.num(1.0)),
                x.assign(x.ident("a"), x.num(2.0)),
                x.ret(x.ident("a")),
            ],
        );
        let (result, _) = run(&program, "f", vec![]);
        assert!(matches!(result, Err(Flow::Throw(_))));
    }
}
