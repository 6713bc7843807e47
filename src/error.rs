//! Error kinds of the simplification core.
//!
//! Only `NonConvergence` is fatal for a unit, and even then the caller gets
//! the last-known-safe scaffolded output. `EquivalenceViolation` and
//! `UnsupportedPattern` are recorded and never abort a compile.

use thiserror::Error;

use crate::diagnostic::Diagnostic;
use crate::ir::NodeId;
use crate::span::Span;

#[derive(Debug, Error)]
pub enum SimplifyError {
    /// Produced by the front end and handed through untouched.
    #[error("front end reported {} error(s)", .0.len())]
    Parse(Vec<Diagnostic>),

    #[error("unit `{unit}` did not converge within {passes} rewrite passes")]
    NonConvergence { unit: String, passes: u32 },

    #[error("rule `{rule}` rejected at node {node}: {reason}")]
    EquivalenceViolation {
        rule: String,
        node: NodeId,
        span: Span,
        reason: String,
    },

    #[error("no rule covers `{pattern}` in `{function}`; scaffold preserved")]
    UnsupportedPattern {
        function: String,
        pattern: String,
        span: Span,
    },

    #[error("config error: {0}")]
    Config(String),
}

impl SimplifyError {
    /// Whether this error stops the unit from emitting rewritten output.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::NonConvergence { .. })
    }

    /// Convert into a user-facing diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Parse(diags) => diags.first().cloned().unwrap_or_else(|| {
                Diagnostic::error("front end failed without diagnostics".to_string(), Span::dummy())
            }),
            Self::NonConvergence { .. } => Diagnostic::warning(self.to_string(), Span::dummy())
                .with_code("non-convergence")
                .with_note("the scaffolded form was emitted unchanged".to_string())
                .with_help("raise `max_passes` in jsinn.toml or report the rule cycle".to_string()),
            Self::EquivalenceViolation { span, .. } => {
                Diagnostic::warning(self.to_string(), *span)
                    .with_code("equivalence-violation")
                    .with_note("region left in its pre-rewrite form".to_string())
            }
            Self::UnsupportedPattern { span, .. } => {
                Diagnostic::warning(self.to_string(), *span).with_code("unsupported-pattern")
            }
            Self::Config(msg) => Diagnostic::error(msg.clone(), Span::dummy()).with_code("config"),
        }
    }
}
