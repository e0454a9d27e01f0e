//! Linear-arithmetic assertions over exact rational variables.
//!
//! The vocabulary is deliberately small: linear comparisons, selector
//! implications, and cardinality over selectors. That is everything the
//! pruning encodings emit, and it keeps the built-in backend honest.

use std::collections::BTreeMap;

use num_traits::Zero;

use crate::model::{rat, Rat};

/// A rational-valued solver variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RealVar(pub usize);

/// A boolean selector variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoolVar(pub usize);

/// A linear expression `Σ coeff·var + constant` with exact coefficients.
/// Terms are kept sorted and zero coefficients dropped, so representations
/// are canonical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinExpr {
    terms: BTreeMap<RealVar, Rat>,
    constant: Rat,
}

impl LinExpr {
    pub fn zero() -> Self {
        Self {
            terms: BTreeMap::new(),
            constant: rat(0),
        }
    }

    pub fn constant(value: Rat) -> Self {
        Self {
            terms: BTreeMap::new(),
            constant: value,
        }
    }

    pub fn var(v: RealVar) -> Self {
        Self::zero().plus_term(v, rat(1))
    }

    pub fn plus_term(mut self, v: RealVar, coeff: Rat) -> Self {
        let entry = self.terms.entry(v).or_insert_with(|| rat(0));
        *entry = &*entry + &coeff;
        if entry.is_zero() {
            self.terms.remove(&v);
        }
        self
    }

    pub fn plus_constant(mut self, value: &Rat) -> Self {
        self.constant = &self.constant + value;
        self
    }

    pub fn add(mut self, other: &LinExpr) -> Self {
        for (v, c) in &other.terms {
            self = self.plus_term(*v, c.clone());
        }
        self.constant = &self.constant + &other.constant;
        self
    }

    pub fn sub(self, other: &LinExpr) -> Self {
        self.add(&other.scaled(&rat(-1)))
    }

    pub fn scaled(&self, factor: &Rat) -> Self {
        if factor.is_zero() {
            return Self::zero();
        }
        Self {
            terms: self
                .terms
                .iter()
                .map(|(v, c)| (*v, c * factor))
                .collect(),
            constant: &self.constant * factor,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn constant_part(&self) -> &Rat {
        &self.constant
    }

    pub fn coeff_of(&self, v: RealVar) -> Option<&Rat> {
        self.terms.get(&v)
    }

    pub fn vars(&self) -> impl Iterator<Item = RealVar> + '_ {
        self.terms.keys().copied()
    }

    pub fn terms(&self) -> impl Iterator<Item = (RealVar, &Rat)> {
        self.terms.iter().map(|(v, c)| (*v, c))
    }

    /// Evaluate under a full valuation; missing variables read as zero.
    pub fn eval(&self, values: &[Rat]) -> Rat {
        let mut out = self.constant.clone();
        for (v, c) in &self.terms {
            if let Some(val) = values.get(v.0) {
                out = out + c * val;
            }
        }
        out
    }

    /// Replace `v` with the expression `replacement`.
    pub fn substitute(&self, v: RealVar, replacement: &LinExpr) -> Self {
        match self.terms.get(&v) {
            None => self.clone(),
            Some(coeff) => {
                let coeff = coeff.clone();
                let mut out = self.clone();
                out.terms.remove(&v);
                out.add(&replacement.scaled(&coeff))
            }
        }
    }
}

/// Comparison of a linear expression against zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Le,
    Ge,
}

/// `expr cmp 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearAssertion {
    pub expr: LinExpr,
    pub cmp: Cmp,
}

impl LinearAssertion {
    /// `lhs cmp rhs`, normalized to `lhs − rhs cmp 0`.
    pub fn compare(lhs: LinExpr, cmp: Cmp, rhs: &LinExpr) -> Self {
        Self {
            expr: lhs.sub(rhs),
            cmp,
        }
    }

    pub fn eq(lhs: LinExpr, rhs: &LinExpr) -> Self {
        Self::compare(lhs, Cmp::Eq, rhs)
    }

    pub fn le(lhs: LinExpr, rhs: &LinExpr) -> Self {
        Self::compare(lhs, Cmp::Le, rhs)
    }

    pub fn ge(lhs: LinExpr, rhs: &LinExpr) -> Self {
        Self::compare(lhs, Cmp::Ge, rhs)
    }

    pub fn holds(&self, values: &[Rat]) -> bool {
        let v = self.expr.eval(values);
        match self.cmp {
            Cmp::Eq => v.is_zero(),
            Cmp::Le => v <= rat(0),
            Cmp::Ge => v >= rat(0),
        }
    }
}

/// A hard assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assertion {
    /// Unconditional linear fact.
    Linear(LinearAssertion),
    /// The linear fact applies whenever the selector is chosen.
    Implies(BoolVar, LinearAssertion),
    /// At most `k` of the selectors may be chosen.
    AtMost(Vec<BoolVar>, usize),
    /// At least `k` of the selectors must be chosen.
    AtLeast(Vec<BoolVar>, usize),
    /// Exactly `k` of the selectors must be chosen.
    Exactly(Vec<BoolVar>, usize),
    /// At least `k` of the groups must contain a chosen selector.
    CoverGroups(Vec<Vec<BoolVar>>, usize),
}
