//! Exact learners: the simple learner requires every example to agree on the
//! parameters exactly; the heuristic learner additionally scores candidates
//! by arithmetic plausibility.

use num_traits::{Signed, Zero};
use tracing::debug;

use crate::learn::math::sb_depth;
use crate::learn::LearningConfig;
use crate::model::{rat, Constraint, ConstraintCandidate, Rat, ViewTree};

/// Learner that accepts a template only when all examples agree exactly.
pub struct SimpleLearner<'a> {
    examples: &'a [ViewTree],
}

impl<'a> SimpleLearner<'a> {
    pub fn new(examples: &'a [ViewTree]) -> Self {
        Self { examples }
    }

    pub fn learn_template(&self, template: &Constraint) -> Vec<ConstraintCandidate> {
        match exact_parameters(self.examples, template) {
            Some((a, b)) => {
                let candidate = template.subst(a, Some(b), self.examples.len());
                vec![ConstraintCandidate::new(candidate, 1.0)]
            }
            None => Vec::new(),
        }
    }
}

/// Simple learner plus a plausibility score: offsets beyond `max_offset` are
/// dropped, multipliers are weighted by their Stern–Brocot depth.
pub struct HeuristicLearner<'a> {
    examples: &'a [ViewTree],
    config: &'a LearningConfig,
}

impl<'a> HeuristicLearner<'a> {
    pub fn new(examples: &'a [ViewTree], config: &'a LearningConfig) -> Self {
        Self { examples, config }
    }

    pub fn learn_template(&self, template: &Constraint) -> Vec<ConstraintCandidate> {
        let Some((a, b)) = exact_parameters(self.examples, template) else {
            return Vec::new();
        };
        if b.abs() > rat(self.config.max_offset) {
            debug!(template = %template, "offset beyond cap, dropping");
            return Vec::new();
        }
        let score = match &a {
            Some(a) if !template.kind.is_add_only_form() => {
                let depth = sb_depth(a) as f64;
                (-(depth - self.config.expected_depth as f64).abs()).exp()
            }
            _ => 1.0,
        };
        let candidate = template.subst(a, Some(b), self.examples.len());
        vec![ConstraintCandidate::new(candidate, score)]
    }
}

/// Solve the template's form exactly from the examples. Returns `None` when
/// the examples disagree or the system is degenerate (the template is
/// falsified).
fn exact_parameters(examples: &[ViewTree], template: &Constraint) -> Option<(Option<Rat>, Rat)> {
    let mut pairs = Vec::with_capacity(examples.len());
    for tree in examples {
        let y = tree.find_anchor(&template.y_id)?.value;
        let x = match &template.x_id {
            Some(x_id) => Some(tree.find_anchor(x_id)?.value),
            None => None,
        };
        pairs.push((x, y));
    }

    let kind = template.kind;
    if kind.is_constant_form() {
        let b = pairs[0].1.clone();
        return pairs.iter().all(|(_, y)| *y == b).then_some((None, b));
    }
    if kind.is_add_only_form() {
        let b = &pairs[0].1 - pairs[0].0.as_ref()?;
        return pairs
            .iter()
            .all(|(x, y)| y - x.as_ref().unwrap() == b)
            .then_some((None, b));
    }
    if kind.is_mul_only_form() {
        let x0 = pairs[0].0.clone()?;
        if x0.is_zero() {
            return None;
        }
        let a = &pairs[0].1 / &x0;
        let consistent = pairs.iter().all(|(x, y)| {
            let x = x.as_ref().unwrap();
            !x.is_zero() && y / x == a
        });
        return consistent.then_some((Some(a), rat(0)));
    }

    // General form: two distinct x values pin the line; every remaining
    // example must land on it.
    if pairs.len() < 2 {
        return None;
    }
    let (x0, y0) = (pairs[0].0.clone()?, pairs[0].1.clone());
    let (x1, y1) = pairs
        .iter()
        .skip(1)
        .find(|(x, _)| x.as_ref() != Some(&x0))
        .map(|(x, y)| (x.clone().unwrap(), y.clone()))?;
    let a = (&y1 - &y0) / (&x1 - &x0);
    let b = &y0 - &(&a * &x0);
    let consistent = pairs.iter().all(|(x, y)| {
        let x = x.as_ref().unwrap();
        *y == &(&a * x) + &b
    });
    consistent.then_some((Some(a), b))
}
