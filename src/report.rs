//! Machine-readable rewrite reports for CI and benchmark tooling.
//!
//! One `RewriteReport` per unit: a `FunctionReport` for every top-level
//! function (entry handlers and helpers alike), unit totals, the pass count,
//! the convergence flag and the warnings raised while compiling.

use serde::Serialize;

use crate::classify::{Classification, ScaffoldPattern, Tier};
use crate::emit::{emit_stmt, OutputSize};
use crate::ir::Program;
use crate::rewrite::{RejectedRegion, RewriteOutcome};

/// Bumped whenever a field is renamed or removed.
pub const REPORT_VERSION: u32 = 1;

// ─── Data Structures ───────────────────────────────────────────────

#[derive(Clone, Debug, Serialize)]
pub struct FunctionReport {
    pub name: String,
    pub entry: bool,
    /// Tier of the scaffolded input.
    pub tier: Tier,
    /// Tier after rewriting.
    pub tier_after: Tier,
    pub detected: Vec<ScaffoldPattern>,
    /// Patterns still present in the output.
    pub residual: Vec<ScaffoldPattern>,
    pub size_before: OutputSize,
    pub size_after: OutputSize,
    /// Rule names in application order.
    pub applied: Vec<&'static str>,
    pub rejected: Vec<RejectedRegion>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Totals {
    pub functions: usize,
    pub size_before: OutputSize,
    pub size_after: OutputSize,
    pub applied: usize,
    /// Applications dropped with a run that fell back to the input.
    pub discarded: usize,
    pub rejected: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct RewriteReport {
    pub version: u32,
    pub unit: String,
    /// Highest input tier over all functions.
    pub tier: Tier,
    pub converged: bool,
    pub passes: u32,
    pub functions: Vec<FunctionReport>,
    pub totals: Totals,
    pub warnings: Vec<String>,
}

// ─── Construction ──────────────────────────────────────────────────

impl RewriteReport {
    /// Assemble the report of one compile. `before` and `after` are the
    /// classifications of `original` and of `outcome.program`.
    pub fn build(
        original: &Program,
        outcome: &RewriteOutcome,
        before: &[(String, Classification)],
        after: &[(String, Classification)],
        warnings: Vec<String>,
    ) -> Self {
        let mut functions = Vec::with_capacity(before.len());
        let mut totals = Totals::default();

        for (name, class) in before {
            let residual = after.iter().find(|(n, _)| n == name).map(|(_, c)| c);
            let size_before = function_size(original, name);
            let size_after = function_size(&outcome.program, name);
            let applied: Vec<&'static str> = outcome
                .applied
                .iter()
                .filter(|a| a.function.as_deref() == Some(name.as_str()))
                .map(|a| a.rule)
                .collect();
            let rejected: Vec<RejectedRegion> = outcome
                .rejected
                .iter()
                .filter(|r| r.function.as_deref() == Some(name.as_str()))
                .cloned()
                .collect();

            totals.functions += 1;
            totals.size_before = add(totals.size_before, size_before);
            totals.size_after = add(totals.size_after, size_after);
            totals.applied += applied.len();
            totals.rejected += rejected.len();

            functions.push(FunctionReport {
                name: name.clone(),
                entry: original.is_entry(name),
                tier: class.tier,
                tier_after: residual.map_or(Tier::Tier1, |c| c.tier),
                detected: class.patterns().into_iter().collect(),
                residual: residual.map_or_else(Vec::new, |c| c.patterns().into_iter().collect()),
                size_before,
                size_after,
                applied,
                rejected,
            });
        }
        // Unit-wide rejections, such as a failed whole-program re-check.
        totals.rejected += outcome.rejected.iter().filter(|r| r.function.is_none()).count();
        totals.discarded = outcome.discarded.len();

        Self {
            version: REPORT_VERSION,
            unit: original.name.clone(),
            tier: before.iter().map(|(_, c)| c.tier).max().unwrap_or(Tier::Tier1),
            converged: outcome.converged,
            passes: outcome.passes,
            functions,
            totals,
            warnings,
        }
    }

    pub fn function(&self, name: &str) -> Option<&FunctionReport> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable summary, one line per function.
    pub fn format_summary(&self) -> String {
        let mut out = format!(
            "{}: {} -> {} lines, {} rule(s) in {} pass(es){}\n",
            self.unit,
            self.totals.size_before.lines,
            self.totals.size_after.lines,
            self.totals.applied,
            self.passes,
            if self.converged {
                String::new()
            } else {
                format!(", fell back ({} discarded)", self.totals.discarded)
            }
        );
        for f in &self.functions {
            out.push_str(&format!(
                "  {:<20} {} -> {}  {:>3} -> {:>3} lines  {}\n",
                f.name,
                f.tier,
                f.tier_after,
                f.size_before.lines,
                f.size_after.lines,
                f.applied.join(", ")
            ));
        }
        out
    }
}

fn function_size(program: &Program, name: &str) -> OutputSize {
    program
        .decls
        .iter()
        .find(|d| d.as_function().is_some_and(|f| f.name == name))
        .map_or_else(OutputSize::default, |decl| OutputSize::of(&emit_stmt(decl)))
}

fn add(a: OutputSize, b: OutputSize) -> OutputSize {
    OutputSize {
        lines: a.lines + b.lines,
        bytes: a.bytes + b.bytes,
    }
}
