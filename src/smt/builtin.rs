//! The built-in MaxSMT backend.
//!
//! Satisfiability of the linear fragment is decided exactly: equalities are
//! eliminated by Gaussian substitution, the residual inequalities by
//! Fourier–Motzkin, and a witness valuation is rebuilt by back-substitution.
//! The MaxSMT search is branch-and-bound over the soft selectors, trying
//! heavier selectors first and pruning on cardinality violations, linear
//! infeasibility, and the optimistic weight bound.

use std::time::Instant;

use num_traits::{Signed, Zero};

use crate::model::{rat, Rat};

use super::expr::{Assertion, BoolVar, Cmp, LinExpr, LinearAssertion, RealVar};
use super::solver::{MaxSmtBackend, OptOutcome, SmtModel, SmtOutcome};

/// Exact-rational MaxSMT solver for the pruner's assertion vocabulary.
#[derive(Default)]
pub struct BuiltinMaxSmt {
    real_names: Vec<String>,
    bool_names: Vec<String>,
    hard: Vec<Assertion>,
    soft: Vec<(BoolVar, u64)>,
    model: Option<SmtModel>,
}

impl BuiltinMaxSmt {
    pub fn new() -> Self {
        Self::default()
    }

    fn base_system(&self) -> LinearSystem {
        let mut system = LinearSystem::default();
        for assertion in &self.hard {
            if let Assertion::Linear(lin) = assertion {
                system.push(lin);
            }
        }
        system
    }

    /// Per-selector implied facts.
    fn implications(&self) -> Vec<Vec<LinearAssertion>> {
        let mut out = vec![Vec::new(); self.bool_names.len()];
        for assertion in &self.hard {
            if let Assertion::Implies(b, lin) = assertion {
                out[b.0].push(lin.clone());
            }
        }
        out
    }

    fn cardinalities(&self) -> Vec<(&[BoolVar], usize, CardKind)> {
        self.hard
            .iter()
            .filter_map(|a| match a {
                Assertion::AtMost(vs, k) => Some((vs.as_slice(), *k, CardKind::AtMost)),
                Assertion::AtLeast(vs, k) => Some((vs.as_slice(), *k, CardKind::AtLeast)),
                Assertion::Exactly(vs, k) => Some((vs.as_slice(), *k, CardKind::Exactly)),
                _ => None,
            })
            .collect()
    }

    fn covers(&self) -> Vec<(&[Vec<BoolVar>], usize)> {
        self.hard
            .iter()
            .filter_map(|a| match a {
                Assertion::CoverGroups(groups, k) => Some((groups.as_slice(), *k)),
                _ => None,
            })
            .collect()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CardKind {
    AtMost,
    AtLeast,
    Exactly,
}

impl MaxSmtBackend for BuiltinMaxSmt {
    fn fresh_real(&mut self, name: &str) -> RealVar {
        self.real_names.push(name.to_string());
        RealVar(self.real_names.len() - 1)
    }

    fn fresh_bool(&mut self, name: &str) -> BoolVar {
        self.bool_names.push(name.to_string());
        BoolVar(self.bool_names.len() - 1)
    }

    fn add_hard(&mut self, assertion: Assertion) {
        self.hard.push(assertion);
    }

    fn add_soft(&mut self, selector: BoolVar, weight: u64) {
        self.soft.push((selector, weight));
    }

    fn check_with_deadline(&mut self, deadline: Option<Instant>) -> SmtOutcome {
        self.model = None;
        let n_bools = self.bool_names.len();
        let n_reals = self.real_names.len();
        let implications = self.implications();
        let cardinalities = self.cardinalities();
        let covers = self.covers();

        let mut weights = vec![0u64; n_bools];
        for (b, w) in &self.soft {
            weights[b.0] = weights[b.0].saturating_add(*w);
        }

        // Heavier selectors first; index breaks ties for determinism.
        let mut order: Vec<usize> = (0..n_bools).collect();
        order.sort_by_key(|&i| (std::cmp::Reverse(weights[i]), i));

        let mut search = Search {
            order,
            weights,
            implications,
            cardinalities,
            covers,
            base: self.base_system(),
            n_reals,
            deadline,
            assignment: vec![None; n_bools],
            best: None,
            timed_out: false,
            nodes: 0,
        };
        search.dfs(0, 0);

        if let Some((_, bools, reals)) = search.best.take() {
            self.model = Some(SmtModel::new(reals, bools));
            SmtOutcome::Sat
        } else if search.timed_out {
            SmtOutcome::Timeout
        } else {
            SmtOutcome::Unsat
        }
    }

    fn model(&self) -> Option<&SmtModel> {
        self.model.as_ref()
    }

    fn minimize(&mut self, var: RealVar, deadline: Option<Instant>) -> OptOutcome {
        if out_of_time(deadline) {
            return OptOutcome::Timeout;
        }
        match self.base_system().bounds_of(var, self.real_names.len()) {
            Bounds::Infeasible => OptOutcome::Infeasible,
            Bounds::Range { lower: Some(v), .. } => OptOutcome::Value(v),
            Bounds::Range { lower: None, .. } => OptOutcome::Unbounded,
        }
    }

    fn maximize(&mut self, var: RealVar, deadline: Option<Instant>) -> OptOutcome {
        if out_of_time(deadline) {
            return OptOutcome::Timeout;
        }
        match self.base_system().bounds_of(var, self.real_names.len()) {
            Bounds::Infeasible => OptOutcome::Infeasible,
            Bounds::Range { upper: Some(v), .. } => OptOutcome::Value(v),
            Bounds::Range { upper: None, .. } => OptOutcome::Unbounded,
        }
    }
}

fn out_of_time(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

/// Branch-and-bound state.
struct Search<'a> {
    order: Vec<usize>,
    weights: Vec<u64>,
    implications: Vec<Vec<LinearAssertion>>,
    cardinalities: Vec<(&'a [BoolVar], usize, CardKind)>,
    covers: Vec<(&'a [Vec<BoolVar>], usize)>,
    base: LinearSystem,
    n_reals: usize,
    deadline: Option<Instant>,
    assignment: Vec<Option<bool>>,
    /// Best `(weight, bools, reals)` found so far.
    best: Option<(u64, Vec<bool>, Vec<Rat>)>,
    timed_out: bool,
    nodes: u64,
}

impl Search<'_> {
    fn dfs(&mut self, depth: usize, weight: u64) {
        self.nodes += 1;
        if self.timed_out {
            return;
        }
        if self.nodes % 64 == 0 && out_of_time(self.deadline) {
            self.timed_out = true;
            return;
        }

        // Optimistic bound: everything unassigned could still be chosen.
        let remaining: u64 = self.order[depth..]
            .iter()
            .map(|&i| self.weights[i])
            .sum();
        if let Some((best_weight, _, _)) = &self.best {
            if weight + remaining <= *best_weight {
                return;
            }
        }

        if depth == self.order.len() {
            if !self.cardinalities_final_ok() || !self.covers_final_ok() {
                return;
            }
            if let Some(reals) = self.active_system().feasible(self.n_reals) {
                let bools: Vec<bool> = self
                    .assignment
                    .iter()
                    .map(|b| b.unwrap_or(false))
                    .collect();
                let improved = match &self.best {
                    Some((best_weight, _, _)) => weight > *best_weight,
                    None => true,
                };
                if improved {
                    self.best = Some((weight, bools, reals));
                }
            }
            return;
        }

        let var = self.order[depth];
        for choice in [true, false] {
            self.assignment[var] = Some(choice);
            let ok = self.cardinalities_partial_ok()
                && self.covers_partial_ok()
                && (!choice || self.active_system().feasible(self.n_reals).is_some());
            if ok {
                let w = if choice { self.weights[var] } else { 0 };
                self.dfs(depth + 1, weight + w);
            }
            self.assignment[var] = None;
            if self.timed_out {
                return;
            }
        }
    }

    /// The linear system induced by the current partial assignment: the base
    /// facts plus the implications of every selector already chosen.
    fn active_system(&self) -> LinearSystem {
        let mut system = self.base.clone();
        for (i, assigned) in self.assignment.iter().enumerate() {
            if *assigned == Some(true) {
                for lin in &self.implications[i] {
                    system.push(lin);
                }
            }
        }
        system
    }

    fn cardinalities_partial_ok(&self) -> bool {
        self.cardinalities.iter().all(|(vars, k, kind)| {
            let chosen = vars
                .iter()
                .filter(|v| self.assignment[v.0] == Some(true))
                .count();
            let open = vars.iter().filter(|v| self.assignment[v.0].is_none()).count();
            match kind {
                CardKind::AtMost => chosen <= *k,
                CardKind::AtLeast => chosen + open >= *k,
                CardKind::Exactly => chosen <= *k && chosen + open >= *k,
            }
        })
    }

    fn cardinalities_final_ok(&self) -> bool {
        self.cardinalities.iter().all(|(vars, k, kind)| {
            let chosen = vars
                .iter()
                .filter(|v| self.assignment[v.0] == Some(true))
                .count();
            match kind {
                CardKind::AtMost => chosen <= *k,
                CardKind::AtLeast => chosen >= *k,
                CardKind::Exactly => chosen == *k,
            }
        })
    }

    fn covers_partial_ok(&self) -> bool {
        self.covers.iter().all(|(groups, k)| {
            let reachable = groups
                .iter()
                .filter(|g| {
                    g.iter()
                        .any(|v| self.assignment[v.0].unwrap_or(true))
                })
                .count();
            reachable >= *k
        })
    }

    fn covers_final_ok(&self) -> bool {
        self.covers.iter().all(|(groups, k)| {
            let covered = groups
                .iter()
                .filter(|g| g.iter().any(|v| self.assignment[v.0] == Some(true)))
                .count();
            covered >= *k
        })
    }
}

/// Result of a variable-bounds query.
enum Bounds {
    Infeasible,
    Range {
        lower: Option<Rat>,
        upper: Option<Rat>,
    },
}

/// A conjunction of linear facts: equalities `expr = 0` and inequalities
/// `expr ≤ 0`.
#[derive(Debug, Clone, Default)]
struct LinearSystem {
    eqs: Vec<LinExpr>,
    ineqs: Vec<LinExpr>,
}

/// One Gaussian substitution step: `var := expr`.
struct EqStep {
    var: RealVar,
    expr: LinExpr,
}

/// One Fourier–Motzkin step: `max(lowers) ≤ var ≤ min(uppers)` in terms of
/// the variables still alive after this step.
struct FmStep {
    var: RealVar,
    lowers: Vec<LinExpr>,
    uppers: Vec<LinExpr>,
}

impl LinearSystem {
    fn push(&mut self, assertion: &LinearAssertion) {
        match assertion.cmp {
            Cmp::Eq => self.eqs.push(assertion.expr.clone()),
            Cmp::Le => self.ineqs.push(assertion.expr.clone()),
            Cmp::Ge => self.ineqs.push(assertion.expr.scaled(&rat(-1))),
        }
    }

    /// Decide feasibility and produce a witness valuation.
    fn feasible(&self, n_reals: usize) -> Option<Vec<Rat>> {
        let (eq_steps, fm_steps, consistent) = self.eliminate(None);
        if !consistent {
            return None;
        }
        Some(reconstruct(n_reals, &eq_steps, &fm_steps))
    }

    /// Exact lower and upper bounds of one variable over the feasible region.
    fn bounds_of(&self, target: RealVar, n_reals: usize) -> Bounds {
        let (eq_steps, fm_steps, consistent) = self.eliminate(Some(target));
        if !consistent {
            return Bounds::Infeasible;
        }

        // If the target was pinned by an equality chain, its value is read
        // off a witness.
        if eq_steps.iter().any(|s| s.var == target) {
            let values = reconstruct(n_reals, &eq_steps, &fm_steps);
            let v = values[target.0].clone();
            return Bounds::Range {
                lower: Some(v.clone()),
                upper: Some(v),
            };
        }

        // Otherwise the final Fourier–Motzkin step eliminated the target;
        // its bound expressions are constants by then.
        match fm_steps.iter().find(|s| s.var == target) {
            Some(step) => {
                let lower = step
                    .lowers
                    .iter()
                    .map(|e| e.constant_part().clone())
                    .max();
                let upper = step
                    .uppers
                    .iter()
                    .map(|e| e.constant_part().clone())
                    .min();
                Bounds::Range { lower, upper }
            }
            None => Bounds::Range {
                lower: None,
                upper: None,
            },
        }
    }

    /// Run the elimination pipeline. When `last` is given, that variable is
    /// eliminated after every other, so its final bounds are constant.
    /// Returns the substitution trail, the Fourier–Motzkin trail, and whether
    /// the system is consistent.
    fn eliminate(&self, last: Option<RealVar>) -> (Vec<EqStep>, Vec<FmStep>, bool) {
        let mut eqs = self.eqs.clone();
        let mut ineqs = self.ineqs.clone();
        let mut eq_steps: Vec<EqStep> = Vec::new();

        // Gaussian substitution over the equalities.
        while let Some(pos) = eqs.iter().position(|e| !e.is_constant()) {
            let eq = eqs.swap_remove(pos);
            // Prefer a pivot that is not the protected variable.
            let pivot = eq
                .vars()
                .find(|v| Some(*v) != last)
                .or_else(|| eq.vars().next())
                .expect("non-constant expression has a variable");
            let coeff = eq.coeff_of(pivot).cloned().expect("pivot coefficient");
            // pivot = -(eq - coeff·pivot) / coeff
            let rest = eq.clone().plus_term(pivot, -coeff.clone());
            let replacement = rest.scaled(&(-coeff.recip()));
            for e in eqs.iter_mut() {
                *e = e.substitute(pivot, &replacement);
            }
            for e in ineqs.iter_mut() {
                *e = e.substitute(pivot, &replacement);
            }
            eq_steps.push(EqStep {
                var: pivot,
                expr: replacement,
            });
        }
        if eqs.iter().any(|e| !e.constant_part().is_zero()) {
            return (eq_steps, Vec::new(), false);
        }

        // Fourier–Motzkin over the inequalities.
        let mut fm_steps: Vec<FmStep> = Vec::new();
        loop {
            ineqs.retain(|e| !e.is_constant() || e.constant_part().is_positive());
            if ineqs.iter().any(|e| e.is_constant()) {
                // A positive constant ≤ 0 remained.
                return (eq_steps, fm_steps, false);
            }
            dedupe(&mut ineqs);

            let mut alive: Vec<RealVar> = ineqs.iter().flat_map(|e| e.vars()).collect();
            alive.sort();
            alive.dedup();
            let candidates: Vec<RealVar> = alive
                .iter()
                .copied()
                .filter(|v| Some(*v) != last)
                .collect();
            let pick = if candidates.is_empty() {
                // Only the protected variable remains.
                alive.first().copied()
            } else {
                // Cheapest elimination first.
                candidates.into_iter().min_by_key(|v| {
                    let ups = ineqs
                        .iter()
                        .filter(|e| e.coeff_of(*v).is_some_and(|c| c.is_positive()))
                        .count();
                    let downs = ineqs
                        .iter()
                        .filter(|e| e.coeff_of(*v).is_some_and(|c| c.is_negative()))
                        .count();
                    (ups * downs, v.0)
                })
            };
            let Some(var) = pick else {
                break;
            };

            let mut lowers = Vec::new();
            let mut uppers = Vec::new();
            let mut rest = Vec::new();
            for e in ineqs.drain(..) {
                match e.coeff_of(var).cloned() {
                    // c·v + r ≤ 0 with c > 0: v ≤ −r/c.
                    Some(c) if c.is_positive() => {
                        let bound = e.plus_term(var, -c.clone()).scaled(&(-c.recip()));
                        uppers.push(bound);
                    }
                    // c·v + r ≤ 0 with c < 0: v ≥ −r/c.
                    Some(c) => {
                        let bound = e.plus_term(var, -c.clone()).scaled(&(-c.recip()));
                        lowers.push(bound);
                    }
                    None => rest.push(e),
                }
            }
            for lo in &lowers {
                for hi in &uppers {
                    // lo ≤ v ≤ hi requires lo − hi ≤ 0.
                    rest.push(lo.clone().sub(hi));
                }
            }
            ineqs = rest;
            fm_steps.push(FmStep { var, lowers, uppers });
        }
        (eq_steps, fm_steps, true)
    }
}

fn dedupe(ineqs: &mut Vec<LinExpr>) {
    let mut seen = std::collections::HashSet::new();
    ineqs.retain(|e| {
        let key = format!("{:?}", normalize(e));
        seen.insert(key)
    });
}

/// Scale so the leading coefficient is ±1, giving a canonical form for
/// duplicate detection.
fn normalize(e: &LinExpr) -> LinExpr {
    match e.terms().next() {
        Some((_, c)) => {
            let scale = c.abs().recip();
            e.scaled(&scale)
        }
        None => e.clone(),
    }
}

/// Rebuild a witness valuation by walking the Fourier–Motzkin trail and then
/// the substitution trail backwards. Unconstrained variables read as zero.
fn reconstruct(n_reals: usize, eq_steps: &[EqStep], fm_steps: &[FmStep]) -> Vec<Rat> {
    let mut values = vec![rat(0); n_reals];
    for step in fm_steps.iter().rev() {
        let lower = step.lowers.iter().map(|e| e.eval(&values)).max();
        let upper = step.uppers.iter().map(|e| e.eval(&values)).min();
        let value = match (lower, upper) {
            (Some(lo), Some(hi)) => (&lo + &hi) / rat(2),
            (Some(lo), None) => lo,
            (None, Some(hi)) => hi,
            (None, None) => rat(0),
        };
        values[step.var.0] = value;
    }
    for step in eq_steps.iter().rev() {
        values[step.var.0] = step.expr.eval(&values);
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ratio;

    fn eq(lhs: LinExpr, rhs: LinExpr) -> Assertion {
        Assertion::Linear(LinearAssertion::eq(lhs, &rhs))
    }

    #[test]
    fn test_feasible_equalities_witness() {
        let mut solver = BuiltinMaxSmt::new();
        let x = solver.fresh_real("x");
        let y = solver.fresh_real("y");
        // x + y = 10, x − y = 4  →  x = 7, y = 3
        solver.add_hard(eq(
            LinExpr::var(x).plus_term(y, rat(1)),
            LinExpr::constant(rat(10)),
        ));
        solver.add_hard(eq(
            LinExpr::var(x).plus_term(y, rat(-1)),
            LinExpr::constant(rat(4)),
        ));
        assert_eq!(solver.check_with_deadline(None), SmtOutcome::Sat);
        let model = solver.model().unwrap();
        assert_eq!(model.real(x), Some(&rat(7)));
        assert_eq!(model.real(y), Some(&rat(3)));
    }

    #[test]
    fn test_unsat_detected() {
        let mut solver = BuiltinMaxSmt::new();
        let x = solver.fresh_real("x");
        solver.add_hard(eq(LinExpr::var(x), LinExpr::constant(rat(1))));
        solver.add_hard(eq(LinExpr::var(x), LinExpr::constant(rat(2))));
        assert_eq!(solver.check_with_deadline(None), SmtOutcome::Unsat);
        assert!(solver.model().is_none());
    }

    #[test]
    fn test_inequalities_and_witness() {
        let mut solver = BuiltinMaxSmt::new();
        let x = solver.fresh_real("x");
        let y = solver.fresh_real("y");
        // 2 ≤ x ≤ 5, y = 2x
        solver.add_hard(Assertion::Linear(LinearAssertion::ge(
            LinExpr::var(x),
            &LinExpr::constant(rat(2)),
        )));
        solver.add_hard(Assertion::Linear(LinearAssertion::le(
            LinExpr::var(x),
            &LinExpr::constant(rat(5)),
        )));
        solver.add_hard(eq(LinExpr::var(y), LinExpr::var(x).scaled(&rat(2))));
        assert_eq!(solver.check_with_deadline(None), SmtOutcome::Sat);
        let model = solver.model().unwrap();
        let x_val = model.real(x).unwrap().clone();
        assert!(rat(2) <= x_val && x_val <= rat(5));
        assert_eq!(model.real(y).unwrap(), &(&x_val * &rat(2)));
    }

    #[test]
    fn test_maxsmt_prefers_heavier_selector() {
        let mut solver = BuiltinMaxSmt::new();
        let x = solver.fresh_real("x");
        let heavy = solver.fresh_bool("heavy");
        let light = solver.fresh_bool("light");
        // The two selectors pin x to incompatible values.
        solver.add_hard(Assertion::Implies(
            heavy,
            LinearAssertion::eq(LinExpr::var(x), &LinExpr::constant(rat(1))),
        ));
        solver.add_hard(Assertion::Implies(
            light,
            LinearAssertion::eq(LinExpr::var(x), &LinExpr::constant(rat(2))),
        ));
        solver.add_soft(heavy, 10);
        solver.add_soft(light, 3);
        assert_eq!(solver.check_with_deadline(None), SmtOutcome::Sat);
        let model = solver.model().unwrap();
        assert!(model.bool(heavy));
        assert!(!model.bool(light));
        assert_eq!(model.real(x), Some(&rat(1)));
    }

    #[test]
    fn test_maxsmt_takes_compatible_pair_over_single() {
        let mut solver = BuiltinMaxSmt::new();
        let x = solver.fresh_real("x");
        let lone = solver.fresh_bool("lone");
        let pair_a = solver.fresh_bool("pair_a");
        let pair_b = solver.fresh_bool("pair_b");
        solver.add_hard(Assertion::Implies(
            lone,
            LinearAssertion::eq(LinExpr::var(x), &LinExpr::constant(rat(0))),
        ));
        solver.add_hard(Assertion::Implies(
            pair_a,
            LinearAssertion::ge(LinExpr::var(x), &LinExpr::constant(rat(5))),
        ));
        solver.add_hard(Assertion::Implies(
            pair_b,
            LinearAssertion::ge(LinExpr::var(x), &LinExpr::constant(rat(6))),
        ));
        solver.add_soft(lone, 8);
        solver.add_soft(pair_a, 5);
        solver.add_soft(pair_b, 5);
        assert_eq!(solver.check_with_deadline(None), SmtOutcome::Sat);
        let model = solver.model().unwrap();
        assert!(model.bool(pair_a) && model.bool(pair_b));
        assert!(!model.bool(lone));
    }

    #[test]
    fn test_cardinality_exactly() {
        let mut solver = BuiltinMaxSmt::new();
        let a = solver.fresh_bool("a");
        let b = solver.fresh_bool("b");
        let c = solver.fresh_bool("c");
        solver.add_hard(Assertion::Exactly(vec![a, b, c], 2));
        solver.add_soft(a, 1);
        solver.add_soft(b, 2);
        solver.add_soft(c, 3);
        assert_eq!(solver.check_with_deadline(None), SmtOutcome::Sat);
        let model = solver.model().unwrap();
        let chosen = [a, b, c].iter().filter(|v| model.bool(**v)).count();
        assert_eq!(chosen, 2);
        assert!(model.bool(b) && model.bool(c));
    }

    #[test]
    fn test_bounds_queries() {
        let mut solver = BuiltinMaxSmt::new();
        let w = solver.fresh_real("w");
        let half = solver.fresh_real("half");
        solver.add_hard(Assertion::Linear(LinearAssertion::ge(
            LinExpr::var(w),
            &LinExpr::constant(rat(100)),
        )));
        solver.add_hard(Assertion::Linear(LinearAssertion::le(
            LinExpr::var(w),
            &LinExpr::constant(rat(300)),
        )));
        solver.add_hard(eq(LinExpr::var(half), LinExpr::var(w).scaled(&ratio(1, 2))));
        assert_eq!(solver.minimize(half, None), OptOutcome::Value(rat(50)));
        assert_eq!(solver.maximize(half, None), OptOutcome::Value(rat(150)));
        assert_eq!(solver.maximize(w, None), OptOutcome::Value(rat(300)));
    }

    #[test]
    fn test_unbounded_direction() {
        let mut solver = BuiltinMaxSmt::new();
        let x = solver.fresh_real("x");
        solver.add_hard(Assertion::Linear(LinearAssertion::ge(
            LinExpr::var(x),
            &LinExpr::constant(rat(0)),
        )));
        assert_eq!(solver.minimize(x, None), OptOutcome::Value(rat(0)));
        assert_eq!(solver.maximize(x, None), OptOutcome::Unbounded);
    }
}
