//! Paths into a program and the read/write queries rules rely on.

use std::fmt;

use super::{Node, NodeKind, Program};

/// Address of a node: an index into `Program::decls`, then child indices
/// in the order `Node::children` returns them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(pub Vec<usize>);

impl NodePath {
    pub fn decl(index: usize) -> Self {
        Self(vec![index])
    }

    pub fn child(&self, index: usize) -> Self {
        let mut steps = self.0.clone();
        steps.push(index);
        Self(steps)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.len() <= 1 {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    pub fn decl_index(&self) -> usize {
        self.0.first().copied().unwrap_or(0)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", steps.join("/"))
    }
}

pub fn node_at<'a>(program: &'a Program, path: &NodePath) -> Option<&'a Node> {
    let (first, rest) = path.0.split_first()?;
    let mut node = program.decls.get(*first)?;
    for &i in rest {
        node = node.children().get(i).copied()?;
    }
    Some(node)
}

fn child_mut(node: &mut Node, index: usize) -> Option<&mut Node> {
    node.children_mut().into_iter().nth(index)
}

pub fn node_at_mut<'a>(program: &'a mut Program, path: &NodePath) -> Option<&'a mut Node> {
    let (first, rest) = path.0.split_first()?;
    let mut node = program.decls.get_mut(*first)?;
    for &i in rest {
        node = child_mut(node, i)?;
    }
    Some(node)
}

/// Swap the node at `path` for `replacement`, returning the old node.
pub fn replace_at(program: &mut Program, path: &NodePath, replacement: Node) -> Option<Node> {
    let slot = node_at_mut(program, path)?;
    Some(std::mem::replace(slot, replacement))
}

// ─── Variable queries ──────────────────────────────────────────────

/// Number of places that read `name`. Plain assignment targets do not
/// count; parameters of nested functions shadow the name.
pub fn reads_of(node: &Node, name: &str) -> usize {
    match &node.kind {
        NodeKind::Identifier(n) => (n == name) as usize,
        NodeKind::Assignment { target, value, .. } => {
            let target_reads = match &target.kind {
                NodeKind::Identifier(_) => 0,
                _ => reads_of(target, name),
            };
            target_reads + reads_of(value, name)
        }
        NodeKind::FunctionDef(def) if def.params.iter().any(|p| p == name) => 0,
        _ => node.children().into_iter().map(|c| reads_of(c, name)).sum(),
    }
}

/// Number of plain (non-declaring) assignments to `name`.
pub fn writes_to(node: &Node, name: &str) -> usize {
    let mut count = 0;
    node.walk(&mut |n| {
        if let NodeKind::Assignment {
            decl: None, target, ..
        } = &n.kind
        {
            if target.as_ident() == Some(name) {
                count += 1;
            }
        }
    });
    count
}

/// Number of declarations binding `name`: `var/let/const`, nested
/// function names and nested function parameters.
pub fn declarations_of(node: &Node, name: &str) -> usize {
    let mut count = 0;
    node.walk(&mut |n| match &n.kind {
        NodeKind::Assignment {
            decl: Some(_),
            target,
            ..
        } if target.as_ident() == Some(name) => count += 1,
        NodeKind::FunctionDef(def) => {
            if def.name == name {
                count += 1;
            }
            count += def.params.iter().filter(|p| *p == name).count();
        }
        _ => {}
    });
    count
}

/// Name bound by a `var/let/const` statement.
pub fn declared_name(stmt: &Node) -> Option<&str> {
    match &stmt.kind {
        NodeKind::Assignment {
            decl: Some(_),
            target,
            ..
        } => target.as_ident(),
        _ => None,
    }
}

/// Whether control can never fall off the end of `stmt`.
pub fn always_exits(stmt: &Node) -> bool {
    match &stmt.kind {
        NodeKind::Return(_) => true,
        NodeKind::Block(stmts) => stmts.iter().any(always_exits),
        NodeKind::Conditional {
            then_branch,
            else_branch: Some(else_branch),
            ..
        } => always_exits(then_branch) && always_exits(else_branch),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DeclKind, IrBuilder, ProgramBuilder};

    #[test]
    fn path_round_trip() {
        let x = IrBuilder::new();
        let ret = x.ret(x.ident("r"));
        let body = x.block(vec![x.declare(DeclKind::Let, "r", x.num(1.0)), ret]);
        let f = x.function("f", &[], body);
        let mut program = ProgramBuilder::new("p").decl(f).finish();

        // decl 0 → body (child 0) → statement 1 → return value (child 0)
        let path = NodePath(vec![0, 0, 1, 0]);
        assert_eq!(node_at(&program, &path).and_then(|n| n.as_ident()), Some("r"));

        let old = replace_at(&mut program, &path, x.num(2.0)).unwrap();
        assert_eq!(old.as_ident(), Some("r"));
        assert!(node_at(&program, &path).unwrap().is_scalar_literal());
        assert_eq!(path.parent(), Some(NodePath(vec![0, 0, 1])));
        assert_eq!(NodePath::decl(0).parent(), None);
    }

    #[test]
    fn reads_skip_assignment_targets_and_shadowing_params() {
        let x = IrBuilder::new();
        let inner = x.function("g", &["t"], x.block(vec![x.ret(x.ident("t"))]));
        let block = x.block(vec![
            x.assign(x.ident("t"), x.num(1.0)),
            x.assign(x.field(x.ident("t"), "k"), x.ident("t")),
            inner,
        ]);
        // `t.k = t` reads t twice (object and value); `t = 1` and `g(t)` do not.
        assert_eq!(reads_of(&block, "t"), 2);
        assert_eq!(writes_to(&block, "t"), 1);
        assert_eq!(declarations_of(&block, "t"), 1);
    }

    #[test]
    fn exits_through_both_branches() {
        let x = IrBuilder::new();
        let both = x.if_(
            x.ident("c"),
            x.block(vec![x.ret(x.num(1.0))]),
            Some(x.block(vec![x.ret(x.num(2.0))])),
        );
        let one = x.if_(x.ident("c"), x.block(vec![x.ret(x.num(1.0))]), None);
        assert!(always_exits(&both));
        assert!(!always_exits(&one));
        assert!(always_exits(&x.block(vec![one, both])));
    }
}
