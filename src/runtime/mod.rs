//! Contracts of the generic runtime helpers the front end emits.
//!
//! The front end compiles every source-level operation through a small set
//! of `rt_*` helpers with documented semantics. The classifier uses these
//! contracts to recognize scaffolding, rewrite rules use them to pick the
//! native JavaScript counterpart, and the reference interpreter executes
//! them when checking a scaffolded program.
//!
//! Helpers are opaque to the emitted program's host: their JavaScript
//! definitions ship with the runtime bindings, not with this crate.

use crate::ir::BinOp;

// ─── Types ─────────────────────────────────────────────────────────

/// What a helper does, as far as simplification is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HelperKind {
    /// Returns its single argument unchanged (`rt_box`, `rt_unbox`).
    Identity,
    /// Property lookup by name on an object or binding.
    ReflectiveLookup,
    /// Case-insensitive string comparison.
    CaseFold,
    /// Has a native JavaScript counterpart, subject to a guard.
    Native(NativeForm),
    /// Changes control flow at an async boundary. No rule rewrites these.
    Structural,
}

/// Native JavaScript form a helper call specializes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeForm {
    /// `args[0].method(args[1..])`
    Method(&'static str),
    /// `Object.method(args)`
    Static(&'static str, &'static str),
    /// `args[0] op args[1] op ...`
    Operator(BinOp),
    /// `args[0].length`; only used inside a comparison against `0`.
    Length,
}

/// Extra condition a native specialization needs before it is sound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeGuard {
    None,
    /// The first argument is a string literal made of ASCII characters.
    AsciiLiteral,
    /// The search argument is a non-empty string literal and the
    /// replacement a string literal without `$`.
    LiteralReplace,
    /// The first or second operand is a string literal.
    StringOperand,
    /// The call is compared against the number literal `0`.
    ZeroComparison,
}

#[derive(Clone, Copy, Debug)]
pub struct HelperContract {
    pub name: &'static str,
    pub kind: HelperKind,
    pub guard: NativeGuard,
    /// One-line description of the documented behavior.
    pub semantics: &'static str,
}

impl HelperContract {
    pub fn native(&self) -> Option<NativeForm> {
        match self.kind {
            HelperKind::Native(form) => Some(form),
            _ => None,
        }
    }
}

// ─── Catalog ───────────────────────────────────────────────────────

const STANDARD: &[HelperContract] = &[
    HelperContract {
        name: "rt_box",
        kind: HelperKind::Identity,
        guard: NativeGuard::None,
        semantics: "wrap a value in the generic value cell",
    },
    HelperContract {
        name: "rt_unbox",
        kind: HelperKind::Identity,
        guard: NativeGuard::None,
        semantics: "read a value out of the generic value cell",
    },
    HelperContract {
        name: "rt_get_field",
        kind: HelperKind::ReflectiveLookup,
        guard: NativeGuard::None,
        semantics: "property lookup by literal name; throws on null or undefined",
    },
    HelperContract {
        name: "rt_eq_ignore_case",
        kind: HelperKind::CaseFold,
        guard: NativeGuard::None,
        semantics: "string equality after Unicode upper-casing both sides",
    },
    HelperContract {
        name: "rt_to_upper",
        kind: HelperKind::Native(NativeForm::Method("toUpperCase")),
        guard: NativeGuard::None,
        semantics: "Unicode default upper-casing",
    },
    HelperContract {
        name: "rt_to_upper_ascii",
        kind: HelperKind::Native(NativeForm::Method("toUpperCase")),
        guard: NativeGuard::AsciiLiteral,
        semantics: "ASCII-only upper-casing",
    },
    HelperContract {
        name: "rt_to_lower",
        kind: HelperKind::Native(NativeForm::Method("toLowerCase")),
        guard: NativeGuard::None,
        semantics: "Unicode default lower-casing",
    },
    HelperContract {
        name: "rt_replace_all",
        kind: HelperKind::Native(NativeForm::Method("replaceAll")),
        guard: NativeGuard::LiteralReplace,
        semantics: "replace every non-overlapping occurrence, left to right",
    },
    HelperContract {
        name: "rt_replace_first",
        kind: HelperKind::Native(NativeForm::Method("replace")),
        guard: NativeGuard::LiteralReplace,
        semantics: "replace the first occurrence",
    },
    HelperContract {
        name: "rt_to_json",
        kind: HelperKind::Native(NativeForm::Static("JSON", "stringify")),
        guard: NativeGuard::None,
        semantics: "JSON text with insertion key order",
    },
    HelperContract {
        name: "rt_concat",
        kind: HelperKind::Native(NativeForm::Operator(BinOp::Add)),
        guard: NativeGuard::StringOperand,
        semantics: "convert each argument to a string and concatenate",
    },
    HelperContract {
        name: "rt_eq_str",
        kind: HelperKind::Native(NativeForm::Operator(BinOp::StrictEq)),
        guard: NativeGuard::None,
        semantics: "strict string equality",
    },
    HelperContract {
        name: "rt_str_len",
        kind: HelperKind::Native(NativeForm::Length),
        guard: NativeGuard::ZeroComparison,
        semantics: "length of the UTF-8 encoding",
    },
    HelperContract {
        name: "rt_async_boundary",
        kind: HelperKind::Structural,
        guard: NativeGuard::None,
        semantics: "call a function; a thrown exception becomes a 500 error response",
    },
];

/// Lookup table from helper name to contract.
#[derive(Clone, Debug)]
pub struct HelperCatalog {
    contracts: Vec<HelperContract>,
}

impl Default for HelperCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl HelperCatalog {
    pub fn standard() -> Self {
        Self {
            contracts: STANDARD.to_vec(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&HelperContract> {
        self.contracts.iter().find(|c| c.name == name)
    }

    pub fn is_helper(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn kind(&self, name: &str) -> Option<HelperKind> {
        self.get(name).map(|c| c.kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HelperContract> {
        self.contracts.iter()
    }
}
