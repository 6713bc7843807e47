//! Deterministic JavaScript printer.
//!
//! Two-space indent, one statement per line, parentheses only where
//! operator precedence needs them. Record keys print in IR order. Output
//! depends on nothing but the IR, so emitting the same program twice gives
//! byte-identical text.


use serde::Serialize;

use crate::equiv::value::format_number;
use crate::ir::{CallStyle, FunctionDef, Literal, Node, NodeKind, Program};

// ─── Precedence levels ─────────────────────────────────────────────

const PREC_ASSIGN: u8 = 1;
const PREC_TERNARY: u8 = 2;
/// `await` and prefix operators.
const PREC_UNARY: u8 = 14;
const PREC_CALL: u8 = 17;
const PREC_PRIMARY: u8 = 20;

const INDENT: &str = "  ";

/// Size of emitted text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OutputSize {
    /// Non-blank lines.
    pub lines: usize,
    pub bytes: usize,
}

impl OutputSize {
    pub fn of(text: &str) -> Self {
        Self {
            lines: text.lines().filter(|l| !l.trim().is_empty()).count(),
            bytes: text.len(),
        }
    }

    /// Relative change from `self` to `after`, as a fraction of `self`.
    pub fn change_to(&self, after: &OutputSize) -> f64 {
        if self.bytes == 0 {
            return 0.0;
        }
        (after.bytes as f64 - self.bytes as f64) / self.bytes as f64
    }
}

/// Emit a whole program, with an `export default` object for its entries.
pub fn emit_program(program: &Program) -> String {
    let mut e = Emitter::new();
    let mut previous: Option<&Node> = None;
    for decl in &program.decls {
        if let Some(prev) = previous {
            if is_function(prev) || is_function(decl) {
                e.out.push('\n');
            }
        }
        e.stmt(decl);
        previous = Some(decl);
    }
    if !program.entries.is_empty() {
        if !program.decls.is_empty() {
            e.out.push('\n');
        }
        e.line(&format!("export default {{ {} }};", program.entries.join(", ")));
    }
    e.out
}

/// Emit one statement (a top-level declaration, for example).
pub fn emit_stmt(node: &Node) -> String {
    let mut e = Emitter::new();
    e.stmt(node);
    e.out
}

/// Emit an expression on a single line.
pub fn emit_expr(node: &Node) -> String {
    Emitter::new().expr(node, PREC_ASSIGN)
}

fn is_function(node: &Node) -> bool {
    matches!(node.kind, NodeKind::FunctionDef(_))
}

// ─── Printer ───────────────────────────────────────────────────────

struct Emitter {
    out: String,
    depth: usize,
}

impl Emitter {
    fn new() -> Self {
        Self {
            out: String::new(),
            depth: 0,
        }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn stmt(&mut self, node: &Node) {
        match &node.kind {
            NodeKind::Block(stmts) => {
                self.line("{");
                self.body(stmts);
                self.line("}");
            }
            NodeKind::Return(None) => self.line("return;"),
            NodeKind::Return(Some(value)) => {
                let text = format!("return {};", self.expr(value, PREC_ASSIGN));
                self.line(&text);
            }
            NodeKind::Conditional {
                cond,
                then_branch,
                else_branch,
            } => self.if_chain(cond, then_branch, else_branch.as_deref(), "if"),
            NodeKind::Assignment {
                decl: Some(kind),
                target,
                value,
            } => {
                let text = format!(
                    "{} {} = {};",
                    kind.as_str(),
                    self.expr(target, PREC_PRIMARY),
                    self.expr(value, PREC_ASSIGN)
                );
                self.line(&text);
            }
            NodeKind::FunctionDef(def) => {
                let header = signature(def);
                self.line(&format!("{} {{", header));
                self.body(block_of(&def.body));
                self.line("}");
            }
            _ => {
                let mut text = self.expr(node, PREC_ASSIGN);
                // A leading `{` or `function` would start a statement.
                if text.starts_with('{') || text.starts_with("function") || text.starts_with("async function") {
                    text = format!("({})", text);
                }
                self.line(&format!("{};", text));
            }
        }
    }

    fn body(&mut self, stmts: &[Node]) {
        self.depth += 1;
        for s in stmts {
            self.stmt(s);
        }
        self.depth -= 1;
    }

    /// `if (..) { .. } else if (..) { .. } else { .. }`
    fn if_chain(&mut self, cond: &Node, then_branch: &Node, else_branch: Option<&Node>, keyword: &str) {
        let head = format!("{} ({}) {{", keyword, self.expr(cond, PREC_ASSIGN));
        self.line(&head);
        self.body(block_of(then_branch));
        match else_branch.map(|e| &e.kind) {
            None => self.line("}"),
            Some(NodeKind::Conditional {
                cond,
                then_branch,
                else_branch,
            }) => self.if_chain(cond, then_branch, else_branch.as_deref(), "} else if"),
            Some(_) => {
                self.line("} else {");
                if let Some(else_branch) = else_branch {
                    self.body(block_of(else_branch));
                }
                self.line("}");
            }
        }
    }

    // ─── Expressions ───────────────────────────────────────────────

    /// Print `node`, parenthesized when it binds looser than `min`.
    fn expr(&mut self, node: &Node, min: u8) -> String {
        let (text, prec) = self.expr_inner(node);
        if prec < min {
            format!("({})", text)
        } else {
            text
        }
    }

    fn expr_inner(&mut self, node: &Node) -> (String, u8) {
        match &node.kind {
            NodeKind::Literal(lit) => self.literal(lit),
            NodeKind::Identifier(name) => (name.clone(), PREC_PRIMARY),
            NodeKind::BinaryOp { op, lhs, rhs } => {
                let p = op.precedence();
                let text = format!(
                    "{} {} {}",
                    self.expr(lhs, p),
                    op.as_str(),
                    self.expr(rhs, p + 1)
                );
                (text, p)
            }
            NodeKind::Call {
                callee,
                args,
                style,
                awaited,
            } => {
                let args: Vec<String> = args.iter().map(|a| self.expr(a, PREC_ASSIGN)).collect();
                let call = match style {
                    CallStyle::Plain => format!("{}({})", self.expr(callee, PREC_CALL), args.join(", ")),
                    // `new f()()` and `new a.b().C()` would bind the first
                    // argument list to `new`.
                    CallStyle::New if is_new_target(callee) => {
                        format!("new {}({})", self.expr(callee, PREC_CALL), args.join(", "))
                    }
                    CallStyle::New => format!("new ({})({})", self.expr(callee, PREC_ASSIGN), args.join(", ")),
                };
                if *awaited {
                    (format!("await {}", call), PREC_UNARY)
                } else {
                    (call, PREC_CALL)
                }
            }
            NodeKind::Conditional {
                cond,
                then_branch,
                else_branch,
            } => {
                let otherwise = match else_branch {
                    Some(e) => self.expr(e, PREC_TERNARY),
                    None => "undefined".to_string(),
                };
                let text = format!(
                    "{} ? {} : {}",
                    self.expr(cond, PREC_TERNARY + 1),
                    self.expr(then_branch, PREC_TERNARY),
                    otherwise
                );
                (text, PREC_TERNARY)
            }
            NodeKind::FieldAccess { object, field } => {
                let needs_parens = matches!(object.kind, NodeKind::Literal(Literal::Number(_)));
                let object = self.expr(object, PREC_CALL);
                let object = if needs_parens { format!("({})", object) } else { object };
                let text = if is_identifier(field) {
                    format!("{}.{}", object, field)
                } else {
                    format!("{}[{}]", object, quote(field))
                };
                (text, PREC_CALL)
            }
            NodeKind::Assignment { decl, target, value } => {
                let text = format!("{} = {}", self.expr(target, PREC_PRIMARY), self.expr(value, PREC_ASSIGN));
                match decl {
                    // Declarations have no expression form; print the statement.
                    Some(kind) => (format!("{} {}", kind.as_str(), text), 0),
                    None => (text, PREC_ASSIGN),
                }
            }
            NodeKind::FunctionDef(def) => {
                let mut nested = Emitter {
                    out: String::new(),
                    depth: self.depth,
                };
                nested.body(block_of(&def.body));
                let mut text = format!("{} {{\n{}", signature(def), nested.out);
                for _ in 0..self.depth {
                    text.push_str(INDENT);
                }
                text.push('}');
                (text, PREC_PRIMARY)
            }
            NodeKind::Block(_) | NodeKind::Return(_) => {
                let mut nested = Emitter {
                    out: String::new(),
                    depth: 0,
                };
                nested.stmt(node);
                (nested.out.trim_end().to_string(), 0)
            }
        }
    }

    fn literal(&mut self, lit: &Literal) -> (String, u8) {
        match lit {
            Literal::Null => ("null".to_string(), PREC_PRIMARY),
            Literal::Undefined => ("undefined".to_string(), PREC_PRIMARY),
            Literal::Bool(b) => (b.to_string(), PREC_PRIMARY),
            Literal::Number(v) if *v < 0.0 => (format_number(*v), PREC_UNARY),
            Literal::Number(v) => (format_number(*v), PREC_PRIMARY),
            Literal::Str(s) => (quote(s), PREC_PRIMARY),
            Literal::Record(fields) if fields.is_empty() => ("{}".to_string(), PREC_PRIMARY),
            Literal::Record(fields) => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|(k, v)| {
                        let key = if is_identifier(k) { k.clone() } else { quote(k) };
                        format!("{}: {}", key, self.expr(v, PREC_ASSIGN))
                    })
                    .collect();
                (format!("{{ {} }}", parts.join(", ")), PREC_PRIMARY)
            }
        }
    }
}

/// Callees `new` takes without parentheses: a name or a member chain of
/// names.
fn is_new_target(node: &Node) -> bool {
    match &node.kind {
        NodeKind::Identifier(_) => true,
        NodeKind::FieldAccess { object, .. } => is_new_target(object),
        _ => false,
    }
}

fn signature(def: &FunctionDef) -> String {
    format!(
        "{}function {}({})",
        if def.is_async { "async " } else { "" },
        def.name,
        def.params.join(", ")
    )
}

fn block_of(node: &Node) -> &[Node] {
    match &node.kind {
        NodeKind::Block(stmts) => stmts,
        _ => std::slice::from_ref(node),
    }
}

/// Whether `name` can be written bare as a property name.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// JavaScript string literal: double quotes unless the text contains `"`
/// and no `'`.
pub fn quote(s: &str) -> String {
    let delim = if s.contains('"') && !s.contains('\'') { '\'' } else { '"' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(delim);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if c == delim => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push(delim);
    out
}
