//! Fixture matrix and function probes for one unit.
//!
//! The plan is computed once from the scaffolded program and reused for
//! every candidate, so a rewrite cannot change what it is checked against.

use std::fmt;

use crate::ir::{Literal, Node, NodeKind, Program};

pub const METHODS: [&str; 4] = ["GET", "POST", "OPTIONS", "PUT"];

/// Field assumed required when nothing in the unit reads one.
pub const FALLBACK_FIELD: &str = "url";

/// Value given to every required field in the well-formed body.
pub const WELL_FORMED_VALUE: &str = "http://x";

/// Upper bound on string literals drawn from the unit for probes.
const POOL_CAP: usize = 6;
const POOL_MAX_LEN: usize = 64;

/// Literals this short are treated as separators and get a repeated input.
const SEPARATOR_MAX_CHARS: usize = 2;

const REPEATED_SEPARATORS: &str = "x-y-z.w.v_u_t x/y/z";

/// Names whose field reads are runtime surface, not body fields.
const HOST_OBJECTS: &[&str] = &["JSON", "console", "Response", "Math", "Object"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    Empty,
    WellFormed,
    Malformed,
    MissingField,
    BlankField,
}

impl BodyKind {
    pub const ALL: [BodyKind; 5] = [
        BodyKind::Empty,
        BodyKind::WellFormed,
        BodyKind::Malformed,
        BodyKind::MissingField,
        BodyKind::BlankField,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BodyKind::Empty => "empty",
            BodyKind::WellFormed => "well-formed",
            BodyKind::Malformed => "malformed",
            BodyKind::MissingField => "missing-field",
            BodyKind::BlankField => "blank-field",
        }
    }

    /// Request body text for this kind.
    pub fn body(self, fields: &[String]) -> String {
        let object = |value: &str| {
            let map: serde_json::Map<String, serde_json::Value> = fields
                .iter()
                .map(|f| (f.clone(), serde_json::Value::String(value.to_string())))
                .collect();
            serde_json::Value::Object(map).to_string()
        };
        match self {
            BodyKind::Empty => String::new(),
            BodyKind::WellFormed => object(WELL_FORMED_VALUE),
            BodyKind::Malformed => {
                let first = fields.first().map_or(FALLBACK_FIELD, String::as_str);
                format!("{{\"{}\":", first)
            }
            BodyKind::MissingField => "{}".to_string(),
            BodyKind::BlankField => object(""),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RequestFixture {
    pub entry: String,
    pub method: &'static str,
    pub kind: BodyKind,
    pub body: String,
}

impl fmt::Display for RequestFixture {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.entry, self.method, self.kind.name())
    }
}

/// Direct call of a non-entry function.
#[derive(Clone, Debug, PartialEq)]
pub struct Probe {
    pub function: String,
    pub args: Vec<String>,
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let args: Vec<String> = self.args.iter().map(|a| format!("{:?}", a)).collect();
        write!(f, "{}({})", self.function, args.join(", "))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FixturePlan {
    pub required_fields: Vec<String>,
    pub requests: Vec<RequestFixture>,
    pub probes: Vec<Probe>,
}

impl FixturePlan {
    pub fn build(program: &Program, configured_fields: &[String]) -> Self {
        let required_fields = if configured_fields.is_empty() {
            infer_required_fields(program)
        } else {
            configured_fields.to_vec()
        };

        let mut requests = Vec::new();
        for entry in &program.entries {
            for method in METHODS {
                for kind in BodyKind::ALL {
                    requests.push(RequestFixture {
                        entry: entry.clone(),
                        method,
                        kind,
                        body: kind.body(&required_fields),
                    });
                }
            }
        }

        let pool = string_pool(program);
        let mut probes = Vec::new();
        for def in program.functions().filter(|f| !program.is_entry(&f.name)) {
            if def.params.is_empty() {
                probes.push(Probe {
                    function: def.name.clone(),
                    args: Vec::new(),
                });
                continue;
            }
            for value in &pool {
                probes.push(Probe {
                    function: def.name.clone(),
                    args: vec![value.clone(); def.params.len()],
                });
            }
        }

        Self {
            required_fields,
            requests,
            probes,
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len() + self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Body fields the unit reads: `x.f` on a local other than the handler
/// parameters, and `rt_get_field(x, "f")` likewise.
pub fn infer_required_fields(program: &Program) -> Vec<String> {
    let mut excluded: Vec<&str> = HOST_OBJECTS.to_vec();
    for entry in &program.entries {
        if let Some(def) = program.function(entry) {
            excluded.extend(def.params.iter().map(String::as_str));
        }
    }
    let mut fields = Vec::new();
    for decl in &program.decls {
        collect_fields(decl, false, &excluded, &mut fields);
    }
    if fields.is_empty() {
        fields.push(FALLBACK_FIELD.to_string());
    }
    fields
}

fn collect_fields(node: &Node, is_callee: bool, excluded: &[&str], out: &mut Vec<String>) {
    let mut add = |object: &Node, field: &str| {
        let Some(name) = object.as_ident() else { return };
        if !excluded.contains(&name) && field != "length" && !out.iter().any(|f| f == field) {
            out.push(field.to_string());
        }
    };
    match &node.kind {
        NodeKind::FieldAccess { object, field } if !is_callee => add(object, field),
        NodeKind::Call { callee, args, .. } => {
            if callee.as_ident() == Some("rt_get_field") {
                if let (Some(object), Some(field)) = (args.first(), args.get(1).and_then(Node::as_str_lit)) {
                    add(object, field);
                }
            }
            collect_fields(callee, true, excluded, out);
            for arg in args {
                collect_fields(arg, false, excluded, out);
            }
            return;
        }
        _ => {}
    }
    for child in node.children() {
        collect_fields(child, false, excluded, out);
    }
}

/// Probe arguments: distinct short string literals of the unit, each
/// separator-like literal repeated inside a word, then the empty string and
/// a value with every common separator twice. Repeats are what tell a
/// first-occurrence replace from an all-occurrence one.
fn string_pool(program: &Program) -> Vec<String> {
    let mut literals: Vec<String> = Vec::new();
    for decl in &program.decls {
        decl.walk(&mut |n| {
            if let NodeKind::Literal(Literal::Str(s)) = &n.kind {
                if s.len() <= POOL_MAX_LEN && literals.len() < POOL_CAP && !literals.contains(s) {
                    literals.push(s.clone());
                }
            }
        });
    }
    let repeated: Vec<String> = literals
        .iter()
        .filter(|s| !s.is_empty() && s.chars().count() <= SEPARATOR_MAX_CHARS)
        .map(|sep| format!("a{0}b{0}c", sep))
        .collect();

    let mut pool = literals;
    for value in repeated.into_iter().chain(["".to_string(), REPEATED_SEPARATORS.to_string()]) {
        if !pool.contains(&value) {
            pool.push(value);
        }
    }
    pool
}
