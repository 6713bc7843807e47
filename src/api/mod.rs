use std::collections::BTreeSet;
use std::path::Path;

use rayon::prelude::*;
use tracing::info;

use crate::classify::{classify_program, Classification, ScaffoldPattern};
use crate::config::EngineConfig;
use crate::diagnostic::{render_diagnostics, Diagnostic};
use crate::emit::emit_program;
use crate::error::SimplifyError;
use crate::ir::Program;
use crate::report::RewriteReport;
use crate::rewrite::{Engine, RewriteOutcome, RuleCatalog, COMPOSITION};
use crate::runtime::HelperCatalog;

#[cfg(test)]
mod tests;

/// Classify, rewrite and emit units against one shared rule catalog.
///
/// The simplifier holds no per-unit state, so one instance can compile any
/// number of units, in parallel through [`Simplifier::compile_all`].
#[derive(Clone, Debug)]
pub struct Simplifier {
    catalog: RuleCatalog,
    helpers: HelperCatalog,
    config: EngineConfig,
}

impl Default for Simplifier {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Result of compiling one unit. `text` is always valid output: the
/// simplified program, or the scaffolded input when rewriting gave up.
#[derive(Debug)]
pub struct UnitOutput {
    pub name: String,
    pub text: String,
    pub program: Program,
    pub report: RewriteReport,
    /// Non-fatal findings plus, at most, one `NonConvergence`.
    pub errors: Vec<SimplifyError>,
}

impl UnitOutput {
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.errors.iter().map(SimplifyError::to_diagnostic).collect()
    }

    /// Print diagnostics to stderr against the unit's front-end source.
    pub fn render(&self, filename: &str, source: &str) {
        render_diagnostics(&self.diagnostics(), filename, source);
    }

    pub fn converged(&self) -> bool {
        self.report.converged
    }
}

impl Simplifier {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            catalog: RuleCatalog::standard(),
            helpers: HelperCatalog::standard(),
            config,
        }
    }

    /// Use the nearest jsinn.toml above `start_dir`, or the defaults.
    pub fn discover(start_dir: &Path) -> Result<Self, SimplifyError> {
        Ok(Self::new(EngineConfig::discover(start_dir)?))
    }

    pub fn with_catalog(mut self, catalog: RuleCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn classify(&self, program: &Program) -> Vec<(String, Classification)> {
        classify_program(program, &self.helpers)
    }

    /// Rewrite `program` to its fixpoint.
    pub fn simplify(&self, program: &Program) -> Result<Program, SimplifyError> {
        let outcome = self.rewrite(program);
        if let Some(err) = failure(program, &outcome) {
            return Err(err);
        }
        Ok(outcome.program)
    }

    /// Full pipeline for one unit. Never fails: problems are carried in
    /// `errors` and the report.
    pub fn compile(&self, program: &Program) -> UnitOutput {
        let before = self.classify(program);
        let outcome = self.rewrite(program);
        let after = self.classify(&outcome.program);

        let mut errors = Vec::new();
        if let Some(err) = failure(program, &outcome) {
            errors.push(err);
        }
        errors.extend(outcome.rejected.iter().filter(|r| r.rule != COMPOSITION).map(|r| {
            SimplifyError::EquivalenceViolation {
                rule: r.rule.clone(),
                node: r.node,
                span: r.span,
                reason: r.reason.clone(),
            }
        }));
        if outcome.converged {
            errors.extend(unsupported(&after));
        }

        let text = emit_program(&outcome.program);
        let warnings = errors.iter().map(ToString::to_string).collect();
        let report = RewriteReport::build(program, &outcome, &before, &after, warnings);
        info!(
            unit = %program.name,
            tier = %report.tier,
            converged = report.converged,
            lines_before = report.totals.size_before.lines,
            lines_after = report.totals.size_after.lines,
            "unit compiled"
        );

        UnitOutput {
            name: program.name.clone(),
            text,
            program: outcome.program,
            report,
            errors,
        }
    }

    /// Compile a unit straight from the front end, passing its
    /// diagnostics through untouched.
    pub fn compile_result(&self, unit: Result<Program, Vec<Diagnostic>>) -> Result<UnitOutput, SimplifyError> {
        let program = unit.map_err(SimplifyError::Parse)?;
        Ok(self.compile(&program))
    }

    /// Compile independent units in parallel. Output order follows input.
    pub fn compile_all(&self, programs: &[Program]) -> Vec<UnitOutput> {
        programs.par_iter().map(|p| self.compile(p)).collect()
    }

    fn rewrite(&self, program: &Program) -> RewriteOutcome {
        Engine::new(&self.catalog, &self.helpers, &self.config).run(program)
    }
}

/// Why a run fell back to the scaffolded program, if it did.
fn failure(program: &Program, outcome: &RewriteOutcome) -> Option<SimplifyError> {
    if outcome.converged {
        return None;
    }
    match outcome.rejected.iter().rev().find(|r| r.rule == COMPOSITION) {
        Some(r) => Some(SimplifyError::EquivalenceViolation {
            rule: r.rule.clone(),
            node: r.node,
            span: r.span,
            reason: r.reason.clone(),
        }),
        None => Some(SimplifyError::NonConvergence {
            unit: program.name.clone(),
            passes: outcome.passes,
        }),
    }
}

/// One warning per scaffold pattern that survived rewriting.
fn unsupported(after: &[(String, Classification)]) -> Vec<SimplifyError> {
    let mut out = Vec::new();
    for (function, class) in after {
        let mut seen: BTreeSet<ScaffoldPattern> = BTreeSet::new();
        for d in &class.detections {
            if seen.insert(d.pattern) {
                out.push(SimplifyError::UnsupportedPattern {
                    function: function.clone(),
                    pattern: d.pattern.name().to_string(),
                    span: d.span,
                });
            }
        }
    }
    out
}
