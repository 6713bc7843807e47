//! jsinn: fixpoint simplification of scaffolded handler IR into idiomatic
//! JavaScript.
//!
//! A front end lowers each handler into the [`ir`] through [`IrBuilder`].
//! [`Simplifier`] then classifies every function, rewrites it to a fixpoint
//! under an equivalence oracle, and prints the result together with a
//! [`RewriteReport`].

pub mod api;
pub mod classify;
pub mod config;
pub mod diagnostic;
pub mod emit;
pub mod equiv;
pub mod error;
pub mod ir;
pub mod report;
pub mod rewrite;
pub mod runtime;
pub mod samples;
pub mod span;

pub use api::{Simplifier, UnitOutput};
pub use classify::{classify_function, classify_program, Classification, ScaffoldPattern, Tier};
pub use config::EngineConfig;
pub use diagnostic::Diagnostic;
pub use emit::emit_program;
pub use error::SimplifyError;
pub use ir::{IrBuilder, Node, Program, ProgramBuilder};
pub use report::RewriteReport;
pub use rewrite::{RewriteRule, RuleCatalog};
