//! Node builders for front ends.
//!
//! Every builder method returns a finished node carrying the builder's
//! current span and the next id. Ids are handed out in construction order,
//! so two front-end runs over the same source produce identical ids.

use std::cell::Cell;

use super::{BinOp, CallStyle, DeclKind, FunctionDef, Literal, Node, NodeId, NodeKind, Program};
use crate::span::Span;


pub struct IrBuilder {
    next_id: Cell<u32>,
    span: Cell<Span>,
}

impl Default for IrBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IrBuilder {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Start numbering at `first_id`, e.g. to continue a partially built program.
    pub fn starting_at(first_id: u32) -> Self {
        Self {
            next_id: Cell::new(first_id),
            span: Cell::new(Span::dummy()),
        }
    }

    /// Attach `span` to every node built from here on.
    pub fn at(&self, span: Span) -> &Self {
        self.span.set(span);
        self
    }

    pub fn current_span(&self) -> Span {
        self.span.get()
    }

    fn node(&self, kind: NodeKind) -> Node {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        Node::with_id(NodeId(id), kind, self.span.get())
    }

    // ─── Literals and names ───────────────────────────────────────

    pub fn null(&self) -> Node {
        self.node(NodeKind::Literal(Literal::Null))
    }

    pub fn undefined(&self) -> Node {
        self.node(NodeKind::Literal(Literal::Undefined))
    }

    pub fn bool(&self, value: bool) -> Node {
        self.node(NodeKind::Literal(Literal::Bool(value)))
    }

    pub fn num(&self, value: f64) -> Node {
        self.node(NodeKind::Literal(Literal::Number(value)))
    }

    pub fn str(&self, value: &str) -> Node {
        self.node(NodeKind::Literal(Literal::Str(value.to_string())))
    }

    /// Record literal; keys keep the given order.
    pub fn record(&self, fields: Vec<(&str, Node)>) -> Node {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        self.node(NodeKind::Literal(Literal::Record(fields)))
    }

    pub fn ident(&self, name: &str) -> Node {
        self.node(NodeKind::Identifier(name.to_string()))
    }

    // ─── Expressions ──────────────────────────────────────────────

    pub fn binary(&self, op: BinOp, lhs: Node, rhs: Node) -> Node {
        self.node(NodeKind::BinaryOp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn strict_eq(&self, lhs: Node, rhs: Node) -> Node {
        self.binary(BinOp::StrictEq, lhs, rhs)
    }

    pub fn call_with(&self, callee: Node, args: Vec<Node>, style: CallStyle, awaited: bool) -> Node {
        self.node(NodeKind::Call {
            callee: Box::new(callee),
            args,
            style,
            awaited,
        })
    }

    pub fn call(&self, callee: Node, args: Vec<Node>) -> Node {
        self.call_with(callee, args, CallStyle::Plain, false)
    }

    /// Call of a bare name, e.g. a runtime helper.
    pub fn call_named(&self, name: &str, args: Vec<Node>) -> Node {
        let callee = self.ident(name);
        self.call(callee, args)
    }

    /// `object.method(args)`
    pub fn method(&self, object: Node, method: &str, args: Vec<Node>) -> Node {
        let callee = self.field(object, method);
        self.call(callee, args)
    }

    /// `await object.method(args)`
    pub fn await_method(&self, object: Node, method: &str, args: Vec<Node>) -> Node {
        let callee = self.field(object, method);
        self.call_with(callee, args, CallStyle::Plain, true)
    }

    /// `new Name(args)`
    pub fn construct(&self, name: &str, args: Vec<Node>) -> Node {
        let callee = self.ident(name);
        self.call_with(callee, args, CallStyle::New, false)
    }

    pub fn field(&self, object: Node, field: &str) -> Node {
        self.node(NodeKind::FieldAccess {
            object: Box::new(object),
            field: field.to_string(),
        })
    }

    // ─── Statements ───────────────────────────────────────────────

    pub fn if_(&self, cond: Node, then_branch: Node, else_branch: Option<Node>) -> Node {
        self.node(NodeKind::Conditional {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        })
    }

    pub fn block(&self, stmts: Vec<Node>) -> Node {
        self.node(NodeKind::Block(stmts))
    }

    pub fn ret(&self, value: Node) -> Node {
        self.node(NodeKind::Return(Some(Box::new(value))))
    }

    pub fn ret_void(&self) -> Node {
        self.node(NodeKind::Return(None))
    }

    pub fn assign(&self, target: Node, value: Node) -> Node {
        self.node(NodeKind::Assignment {
            decl: None,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    pub fn declare(&self, kind: DeclKind, name: &str, value: Node) -> Node {
        let target = self.ident(name);
        self.node(NodeKind::Assignment {
            decl: Some(kind),
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    pub fn function(&self, name: &str, params: &[&str], body: Node) -> Node {
        self.function_def(name, params, body, false)
    }

    pub fn async_function(&self, name: &str, params: &[&str], body: Node) -> Node {
        self.function_def(name, params, body, true)
    }

    fn function_def(&self, name: &str, params: &[&str], body: Node, is_async: bool) -> Node {
        let body = if matches!(body.kind, NodeKind::Block(_)) {
            body
        } else {
            self.block(vec![body])
        };
        self.node(NodeKind::FunctionDef(FunctionDef {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            body: Box::new(body),
            is_async,
        }))
    }
}

/// Incremental construction of a `Program`.
pub struct ProgramBuilder {
    program: Program,
}

impl ProgramBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            program: Program::new(name),
        }
    }

    pub fn decl(mut self, node: Node) -> Self {
        self.push_decl(node);
        self
    }

    pub fn entry(mut self, name: &str) -> Self {
        self.push_entry(name);
        self
    }

    pub fn push_decl(&mut self, node: Node) {
        self.program.decls.push(node);
    }

    pub fn push_entry(&mut self, name: &str) {
        if !self.program.is_entry(name) {
            self.program.entries.push(name.to_string());
        }
    }

    pub fn finish(self) -> Program {
        self.program
    }
}
