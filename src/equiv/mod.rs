//! Semantic equivalence checker.
//!
//! A candidate program is equivalent to the scaffolded one when every
//! fixture of the plan produces the same observation: the outcome of the
//! call plus the ordered capability calls it made. Thrown exceptions are
//! compared as "threw" without their message. Exhausting the step budget
//! or call depth on either side is a mismatch.

pub mod fixture;
pub mod interp;
pub mod value;


use std::fmt;

use serde::Serialize;

pub use fixture::{BodyKind, FixturePlan, Probe, RequestFixture};
use interp::{Flow, Interpreter, Limits};
use value::Value;

use crate::config::EngineConfig;
use crate::ir::Program;
use crate::runtime::HelperCatalog;

/// How one fixture call ended.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Outcome {
    Response { status: u16, body: String },
    /// Any other returned value, rendered.
    Returned(String),
    Threw,
    BudgetExceeded,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Outcome::Response { status, body } => write!(f, "response {} {}", status, body),
            Outcome::Returned(value) => write!(f, "returned {}", value),
            Outcome::Threw => write!(f, "threw"),
            Outcome::BudgetExceeded => write!(f, "exceeded the step budget"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Observation {
    /// Fixture label, e.g. `fetch POST well-formed`.
    pub label: String,
    pub outcome: Outcome,
    pub effects: Vec<String>,
}

impl Observation {
    /// Why `self` (candidate) differs from `expected`, if it does.
    pub fn mismatch(&self, expected: &Observation) -> Option<String> {
        if matches!(self.outcome, Outcome::BudgetExceeded) || matches!(expected.outcome, Outcome::BudgetExceeded) {
            return Some(format!("{}: step budget exhausted", expected.label));
        }
        if self.outcome != expected.outcome {
            return Some(format!(
                "{}: expected {}, got {}",
                expected.label, expected.outcome, self.outcome
            ));
        }
        if self.effects != expected.effects {
            return Some(format!(
                "{}: capability calls changed from [{}] to [{}]",
                expected.label,
                expected.effects.join("; "),
                self.effects.join("; ")
            ));
        }
        None
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Equivalent,
    Diverged(String),
}

impl Verdict {
    pub fn is_equivalent(&self) -> bool {
        matches!(self, Verdict::Equivalent)
    }
}

#[derive(Clone, Debug)]
pub struct EquivalenceChecker {
    helpers: HelperCatalog,
    limits: Limits,
    required_fields: Vec<String>,
}

impl EquivalenceChecker {
    pub fn new(config: &EngineConfig, helpers: &HelperCatalog) -> Self {
        Self {
            helpers: helpers.clone(),
            limits: Limits {
                step_budget: config.step_budget,
                max_call_depth: config.max_call_depth,
            },
            required_fields: config.required_fields.clone(),
        }
    }

    /// Fixtures for `program`, fixed for the rest of its rewriting.
    pub fn plan(&self, program: &Program) -> FixturePlan {
        FixturePlan::build(program, &self.required_fields)
    }

    /// Run every fixture of `plan` against `program`.
    pub fn observe(&self, plan: &FixturePlan, program: &Program) -> Vec<Observation> {
        let requests = plan.requests.iter().map(|fixture| {
            let args = vec![interp::request(fixture.method, &fixture.body), Value::Env];
            self.run(program, fixture.to_string(), &fixture.entry, args)
        });
        let probes = plan.probes.iter().map(|probe| {
            let args = probe.args.iter().map(|a| Value::str(a.as_str())).collect();
            self.run(program, probe.to_string(), &probe.function, args)
        });
        requests.chain(probes).collect()
    }

    /// Compare `candidate` against previously observed behavior.
    pub fn compare(&self, plan: &FixturePlan, baseline: &[Observation], candidate: &Program) -> Verdict {
        let observed = self.observe(plan, candidate);
        for (got, expected) in observed.iter().zip(baseline) {
            if let Some(reason) = got.mismatch(expected) {
                return Verdict::Diverged(reason);
            }
        }
        if observed.len() != baseline.len() {
            return Verdict::Diverged("fixture count changed".to_string());
        }
        Verdict::Equivalent
    }

    /// One-shot check of `after` against `before`.
    pub fn check(&self, before: &Program, after: &Program) -> Verdict {
        let plan = self.plan(before);
        let baseline = self.observe(&plan, before);
        self.compare(&plan, &baseline, after)
    }

    fn run(&self, program: &Program, label: String, function: &str, args: Vec<Value>) -> Observation {
        let mut interp = Interpreter::new(program, &self.helpers, self.limits);
        let outcome = match interp.call_entry(function, args) {
            Ok(Value::Response { status, body }) => Outcome::Response { status, body },
            Ok(value) => Outcome::Returned(value.render()),
            Err(Flow::Throw(_)) => Outcome::Threw,
            Err(Flow::Budget) => Outcome::BudgetExceeded,
            Err(Flow::Return(value)) => Outcome::Returned(value.render()),
        };
        Observation {
            label,
            outcome,
            effects: interp.effects().to_vec(),
        }
    }
}
