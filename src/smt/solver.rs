//! The MaxSMT backend interface.
//!
//! The pruners talk to solvers only through this trait, so a different
//! backend (an external SMT process, a native binding) can be swapped in
//! without touching the encodings.

use std::time::Instant;

use crate::model::Rat;

use super::expr::{Assertion, BoolVar, RealVar};

/// Outcome of a satisfiability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtOutcome {
    Sat,
    Unsat,
    Timeout,
}

/// Outcome of an optimization query over a single variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptOutcome {
    Value(Rat),
    Unbounded,
    Infeasible,
    Timeout,
}

/// A satisfying assignment.
#[derive(Debug, Clone, Default)]
pub struct SmtModel {
    reals: Vec<Rat>,
    bools: Vec<bool>,
}

impl SmtModel {
    pub fn new(reals: Vec<Rat>, bools: Vec<bool>) -> Self {
        Self { reals, bools }
    }

    pub fn real(&self, v: RealVar) -> Option<&Rat> {
        self.reals.get(v.0)
    }

    pub fn bool(&self, v: BoolVar) -> bool {
        self.bools.get(v.0).copied().unwrap_or(false)
    }
}

/// A weighted-MaxSMT backend over linear rational arithmetic with boolean
/// selectors. One instance serves one query; a fresh backend is created per
/// subproblem and dropped on exit.
pub trait MaxSmtBackend {
    fn fresh_real(&mut self, name: &str) -> RealVar;
    fn fresh_bool(&mut self, name: &str) -> BoolVar;

    fn add_hard(&mut self, assertion: Assertion);

    /// Soft-assert that a selector is chosen, with the given weight. The
    /// check maximizes the total weight of chosen selectors.
    fn add_soft(&mut self, selector: BoolVar, weight: u64);

    /// Solve, honoring a wall-clock deadline if one is given.
    fn check_with_deadline(&mut self, deadline: Option<Instant>) -> SmtOutcome;

    /// The model of the last successful check.
    fn model(&self) -> Option<&SmtModel>;

    /// Minimize a variable subject to the hard linear assertions. Soft
    /// assertions and selector implications are ignored.
    fn minimize(&mut self, var: RealVar, deadline: Option<Instant>) -> OptOutcome;

    /// Maximize a variable subject to the hard linear assertions.
    fn maximize(&mut self, var: RealVar, deadline: Option<Instant>) -> OptOutcome;
}
