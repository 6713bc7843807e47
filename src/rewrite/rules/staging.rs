//! `x = e; return x;` → `return e;` for function locals.

use super::{no_guard, synth};
use crate::classify::staged_name;
use crate::ir::visit::{declarations_of, reads_of, writes_to};
use crate::ir::{FunctionDef, Node, NodeKind, NodeTag};
use crate::rewrite::{RewriteRule, RuleContext};

pub const RETURN_STAGING_COLLAPSE: RewriteRule = RewriteRule {
    name: "return-staging-collapse",
    priority: 50,
    kinds: &[NodeTag::FunctionDef],
    matches: staging_matches,
    guard: no_guard,
    build: staging_build,
};

fn staging_matches(node: &Node, _: &RuleContext) -> bool {
    let Some(def) = node.as_function() else {
        return false;
    };
    let mut found = false;
    def.body.walk(&mut |n| {
        if let Some(stmts) = n.as_block() {
            found |= stmts
                .windows(2)
                .any(|w| collapsible(def, &w[0], &w[1]).is_some());
        }
    });
    found
}

/// The staged local, when the pair may collapse.
fn collapsible<'a>(def: &FunctionDef, stmt: &'a Node, next: &Node) -> Option<&'a str> {
    let name = staged_name(stmt, next)?;
    if def.params.iter().any(|p| p == name) || declarations_of(&def.body, name) == 0 {
        return None;
    }
    let NodeKind::Assignment { decl, .. } = &stmt.kind else {
        return None;
    };
    // Collapsing a declaration removes the binding; nothing else may use it.
    if decl.is_some()
        && (declarations_of(&def.body, name) != 1
            || writes_to(&def.body, name) != 0
            || reads_of(&def.body, name) != 1)
    {
        return None;
    }
    Some(name)
}

fn staging_build(node: &Node, _: &RuleContext) -> Option<Node> {
    let def = node.as_function()?;
    let body = collapse(def, &def.body);
    let mut out = node.clone();
    if let NodeKind::FunctionDef(new_def) = &mut out.kind {
        new_def.body = Box::new(body);
    }
    Some(out)
}

fn collapse(def: &FunctionDef, node: &Node) -> Node {
    let mut out = node.clone();
    if let NodeKind::Block(stmts) = &node.kind {
        let mut rebuilt = Vec::with_capacity(stmts.len());
        let mut i = 0;
        while i < stmts.len() {
            let next = stmts.get(i + 1);
            let staged = next.and_then(|next| collapsible(def, &stmts[i], next));
            match (staged, &stmts[i].kind) {
                (Some(_), NodeKind::Assignment { value, .. }) => {
                    let ret = synth(NodeKind::Return(Some(value.clone())), stmts[i + 1].span);
                    rebuilt.push(ret);
                    i += 2;
                }
                _ => {
                    rebuilt.push(stmts[i].clone());
                    i += 1;
                }
            }
        }
        out.kind = NodeKind::Block(rebuilt);
    }
    for child in out.children_mut() {
        *child = collapse(def, child);
    }
    out
}
