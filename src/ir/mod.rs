//! Intermediate representation shared by every stage of the simplifier.
//!
//! The front end hands over a `Program` built from ten node kinds. Every
//! stage after that reads the same tree:
//!
//! ```text
//! Program → classify → rewrite (⇄ equiv) → emit
//! ```
//!
//! Nodes are plain owned values. A rewrite never edits a node in place; it
//! builds a replacement and the engine swaps it in at a path.

pub mod builder;
pub mod visit;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::span::Span;

pub use builder::{IrBuilder, ProgramBuilder};
pub use visit::NodePath;

// ─── Identity ──────────────────────────────────────────────────────

/// Stable node identity used to diff IR before and after rewriting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Placeholder carried by nodes a rule synthesized; the engine replaces
    /// it with a fresh id before the node enters the tree.
    pub const PENDING: NodeId = NodeId(u32::MAX);

    pub fn is_pending(self) -> bool {
        self == Self::PENDING
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pending() {
            write!(f, "#pending")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

/// Hands out ids above every id already present in a program.
#[derive(Clone, Debug)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn starting_at(next: u32) -> Self {
        Self { next }
    }

    pub fn after(program: &Program) -> Self {
        Self::starting_at(program.max_id().map_or(0, |id| id.0 + 1))
    }

    pub fn fresh(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

/// Structural digest of a node, ignoring ids and spans.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

// ─── Node kinds ────────────────────────────────────────────────────

/// Binary operators, named after their JavaScript spelling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    StrictEq,
    StrictNe,
    LooseEq,
    LooseNe,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::StrictEq => "===",
            BinOp::StrictNe => "!==",
            BinOp::LooseEq => "==",
            BinOp::LooseNe => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }

    /// JavaScript operator precedence (higher binds tighter).
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 3,
            BinOp::And => 4,
            BinOp::StrictEq | BinOp::StrictNe | BinOp::LooseEq | BinOp::LooseNe => 8,
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 9,
            BinOp::Add | BinOp::Sub => 11,
            BinOp::Mul | BinOp::Div | BinOp::Rem => 12,
        }
    }

    /// Logical negation of an equality operator. Relational operators have
    /// no exact negation once NaN is involved, so they return `None`.
    pub fn negated(self) -> Option<BinOp> {
        match self {
            BinOp::StrictEq => Some(BinOp::StrictNe),
            BinOp::StrictNe => Some(BinOp::StrictEq),
            BinOp::LooseEq => Some(BinOp::LooseNe),
            BinOp::LooseNe => Some(BinOp::LooseEq),
            _ => None,
        }
    }

    pub fn is_equality(self) -> bool {
        self.negated().is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallStyle {
    Plain,
    /// `new Callee(args)`
    New,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclKind {
    Var,
    Let,
    Const,
}

impl DeclKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DeclKind::Var => "var",
            DeclKind::Let => "let",
            DeclKind::Const => "const",
        }
    }

    /// `let` and `const` are scoped to their block; `var` to its function.
    pub fn is_block_scoped(self) -> bool {
        !matches!(self, DeclKind::Var)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Undefined,
    Bool(bool),
    Number(f64),
    Str(String),
    /// Record construction. Field order is declaration order and survives
    /// every stage, since it shows up in generated JSON text.
    Record(Vec<(String, Node)>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    /// Always a `Block`.
    pub body: Box<Node>,
    pub is_async: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Literal(Literal),
    Identifier(String),
    BinaryOp {
        op: BinOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Call {
        callee: Box<Node>,
        args: Vec<Node>,
        style: CallStyle,
        awaited: bool,
    },
    /// `if` in statement position, `?:` in expression position.
    Conditional {
        cond: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Option<Box<Node>>,
    },
    Block(Vec<Node>),
    Return(Option<Box<Node>>),
    /// Plain assignment when `decl` is `None`, declaration otherwise.
    Assignment {
        decl: Option<DeclKind>,
        target: Box<Node>,
        value: Box<Node>,
    },
    FieldAccess {
        object: Box<Node>,
        field: String,
    },
    FunctionDef(FunctionDef),
}

/// Discriminant of `NodeKind`, used by the rule catalog for dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeTag {
    Literal,
    Identifier,
    BinaryOp,
    Call,
    Conditional,
    Block,
    Return,
    Assignment,
    FieldAccess,
    FunctionDef,
}

// ─── Node ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub span: Span,
    pub kind: NodeKind,
}

impl Node {
    /// A node with a pending id, as produced by rewrite rules.
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self {
            id: NodeId::PENDING,
            span,
            kind,
        }
    }

    pub fn with_id(id: NodeId, kind: NodeKind, span: Span) -> Self {
        Self { id, span, kind }
    }

    pub fn tag(&self) -> NodeTag {
        match &self.kind {
            NodeKind::Literal(_) => NodeTag::Literal,
            NodeKind::Identifier(_) => NodeTag::Identifier,
            NodeKind::BinaryOp { .. } => NodeTag::BinaryOp,
            NodeKind::Call { .. } => NodeTag::Call,
            NodeKind::Conditional { .. } => NodeTag::Conditional,
            NodeKind::Block(_) => NodeTag::Block,
            NodeKind::Return(_) => NodeTag::Return,
            NodeKind::Assignment { .. } => NodeTag::Assignment,
            NodeKind::FieldAccess { .. } => NodeTag::FieldAccess,
            NodeKind::FunctionDef(_) => NodeTag::FunctionDef,
        }
    }

    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Identifier(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_str_lit(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Literal(Literal::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&[Node]> {
        match &self.kind {
            NodeKind::Block(stmts) => Some(stmts),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionDef> {
        match &self.kind {
            NodeKind::FunctionDef(def) => Some(def),
            _ => None,
        }
    }

    /// Name of the helper or function this node calls, when the callee is a
    /// bare identifier.
    pub fn called_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Call { callee, .. } => callee.as_ident(),
            _ => None,
        }
    }

    /// Literal with no nested nodes (everything except records).
    pub fn is_scalar_literal(&self) -> bool {
        matches!(&self.kind, NodeKind::Literal(lit) if !matches!(lit, Literal::Record(_)))
    }

    /// Direct children in evaluation order.
    pub fn children(&self) -> Vec<&Node> {
        match &self.kind {
            NodeKind::Literal(Literal::Record(fields)) => fields.iter().map(|(_, v)| v).collect(),
            NodeKind::Literal(_) | NodeKind::Identifier(_) => Vec::new(),
            NodeKind::BinaryOp { lhs, rhs, .. } => vec![&**lhs, &**rhs],
            NodeKind::Call { callee, args, .. } => {
                let mut out = vec![&**callee];
                out.extend(args.iter());
                out
            }
            NodeKind::Conditional {
                cond,
                then_branch,
                else_branch,
            } => {
                let mut out = vec![&**cond, &**then_branch];
                if let Some(e) = else_branch {
                    out.push(&**e);
                }
                out
            }
            NodeKind::Block(stmts) => stmts.iter().collect(),
            NodeKind::Return(value) => value.iter().map(|v| &**v).collect(),
            NodeKind::Assignment { target, value, .. } => vec![&**target, &**value],
            NodeKind::FieldAccess { object, .. } => vec![&**object],
            NodeKind::FunctionDef(def) => vec![&*def.body],
        }
    }

    /// Mutable counterpart of `children`, same order.
    pub fn children_mut(&mut self) -> Vec<&mut Node> {
        match &mut self.kind {
            NodeKind::Literal(Literal::Record(fields)) => {
                fields.iter_mut().map(|(_, v)| v).collect()
            }
            NodeKind::Literal(_) | NodeKind::Identifier(_) => Vec::new(),
            NodeKind::BinaryOp { lhs, rhs, .. } => vec![&mut **lhs, &mut **rhs],
            NodeKind::Call { callee, args, .. } => {
                let mut out = vec![&mut **callee];
                out.extend(args.iter_mut());
                out
            }
            NodeKind::Conditional {
                cond,
                then_branch,
                else_branch,
            } => {
                let mut out = vec![&mut **cond, &mut **then_branch];
                if let Some(e) = else_branch {
                    out.push(&mut **e);
                }
                out
            }
            NodeKind::Block(stmts) => stmts.iter_mut().collect(),
            NodeKind::Return(value) => value.iter_mut().map(|v| &mut **v).collect(),
            NodeKind::Assignment { target, value, .. } => vec![&mut **target, &mut **value],
            NodeKind::FieldAccess { object, .. } => vec![&mut **object],
            NodeKind::FunctionDef(def) => vec![&mut *def.body],
        }
    }

    pub fn child_count(&self) -> usize {
        self.children().len()
    }

    /// Pre-order walk.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Node)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Number of nodes in this subtree.
    pub fn size(&self) -> usize {
        let mut n = 0;
        self.walk(&mut |_| n += 1);
        n
    }

    pub fn max_id(&self) -> Option<NodeId> {
        let mut max: Option<NodeId> = None;
        self.walk(&mut |n| {
            if !n.id.is_pending() && max.map_or(true, |m| n.id > m) {
                max = Some(n.id);
            }
        });
        max
    }

    /// Replace every pending id in this subtree with a fresh one.
    pub fn stamp_pending(&mut self, ids: &mut IdAllocator) {
        if self.id.is_pending() {
            self.id = ids.fresh();
        }
        for child in self.children_mut() {
            child.stamp_pending(ids);
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = blake3::Hasher::new();
        self.hash_structure(&mut hasher);
        Fingerprint(hasher.finalize().into())
    }

    /// Same structure, ignoring ids and spans.
    pub fn same_shape(&self, other: &Node) -> bool {
        self.fingerprint() == other.fingerprint()
    }

    fn hash_structure(&self, h: &mut blake3::Hasher) {
        fn text(h: &mut blake3::Hasher, s: &str) {
            h.update(&(s.len() as u64).to_le_bytes());
            h.update(s.as_bytes());
        }

        h.update(&[self.tag() as u8]);
        match &self.kind {
            NodeKind::Literal(lit) => match lit {
                Literal::Null => {
                    h.update(b"n");
                }
                Literal::Undefined => {
                    h.update(b"u");
                }
                Literal::Bool(b) => {
                    h.update(&[b'b', *b as u8]);
                }
                Literal::Number(v) => {
                    h.update(b"d");
                    h.update(&v.to_bits().to_le_bytes());
                }
                Literal::Str(s) => {
                    h.update(b"s");
                    text(h, s);
                }
                Literal::Record(fields) => {
                    h.update(b"r");
                    h.update(&(fields.len() as u64).to_le_bytes());
                    for (key, _) in fields {
                        text(h, key);
                    }
                }
            },
            NodeKind::Identifier(name) => text(h, name),
            NodeKind::BinaryOp { op, .. } => text(h, op.as_str()),
            NodeKind::Call { style, awaited, args, .. } => {
                h.update(&[*style as u8, *awaited as u8]);
                h.update(&(args.len() as u64).to_le_bytes());
            }
            NodeKind::Conditional { else_branch, .. } => {
                h.update(&[else_branch.is_some() as u8]);
            }
            NodeKind::Block(stmts) => {
                h.update(&(stmts.len() as u64).to_le_bytes());
            }
            NodeKind::Return(value) => {
                h.update(&[value.is_some() as u8]);
            }
            NodeKind::Assignment { decl, .. } => {
                let tag = decl.map_or(0u8, |d| d as u8 + 1);
                h.update(&[tag]);
            }
            NodeKind::FieldAccess { field, .. } => text(h, field),
            NodeKind::FunctionDef(def) => {
                text(h, &def.name);
                h.update(&[def.is_async as u8]);
                h.update(&(def.params.len() as u64).to_le_bytes());
                for p in &def.params {
                    text(h, p);
                }
            }
        }
        for child in self.children() {
            child.hash_structure(h);
        }
    }
}

// ─── Program ───────────────────────────────────────────────────────

/// One compilation unit: ordered top-level declarations plus the names of
/// exported handler entry points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub name: String,
    pub decls: Vec<Node>,
    pub entries: Vec<String>,
}

impl Program {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            decls: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Top-level function definitions in declaration order.
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.decls.iter().filter_map(Node::as_function)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions().find(|f| f.name == name)
    }

    pub fn is_entry(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e == name)
    }

    /// Name of the top-level function at `index`, if that decl is one.
    pub fn decl_name(&self, index: usize) -> Option<&str> {
        self.decls
            .get(index)
            .and_then(Node::as_function)
            .map(|f| f.name.as_str())
    }

    /// Request parameter of the entry handler at `index`. Helpers and
    /// non-function decls have none.
    pub fn request_param(&self, index: usize) -> Option<&str> {
        let def = self.decls.get(index).and_then(Node::as_function)?;
        if !self.is_entry(&def.name) {
            return None;
        }
        def.params.first().map(String::as_str)
    }

    pub fn max_id(&self) -> Option<NodeId> {
        self.decls.iter().filter_map(Node::max_id).max()
    }

    pub fn size(&self) -> usize {
        self.decls.iter().map(Node::size).sum()
    }
}
