//! Shared MaxSMT encoding pieces: candidate pre-filtering, per-axis
//! splitting, anchor variables, geometry and containment axioms, and
//! constraint translation.

use std::collections::HashMap;

use num_traits::Signed;

use crate::model::{
    rat, AnchorId, Attribute, Constraint, ConstraintCandidate, ConstraintKind, Op, ViewId,
    ViewTree, PRIORITY_STRONG,
};
use crate::prune::conformance::Conformance;
use crate::smt::{Assertion, Cmp, LinExpr, LinearAssertion, MaxSmtBackend, RealVar};

/// Candidates split by the axis their anchors live on.
#[derive(Debug, Default)]
pub struct AxisCandidates {
    pub horizontal: Vec<ConstraintCandidate>,
    pub vertical: Vec<ConstraintCandidate>,
}

/// Prepare a candidate pool for per-axis solving:
/// complementary bound pairs are merged into equalities, stray bounds are
/// kept only where no equality covers the anchor, and cross-axis kinds are
/// dropped (the per-axis queries cannot host them).
pub fn prepare_candidates(cands: &[ConstraintCandidate]) -> AxisCandidates {
    let mut combined = combine_bounds(cands);
    combined.retain(|c| {
        !matches!(
            c.constraint.kind,
            ConstraintKind::SizeAspectRatio | ConstraintKind::SizeAspectRatioGeneral
        )
    });

    let mut out = AxisCandidates::default();
    for cand in combined {
        if cand.constraint.is_horizontal() {
            out.horizontal.push(cand);
        } else {
            out.vertical.push(cand);
        }
    }
    out
}

/// Merge `≤`/`≥` bound pairs on the same anchor into a single equality when
/// the bounds nearly touch; drop the bounds that an equality already covers.
fn combine_bounds(cands: &[ConstraintCandidate]) -> Vec<ConstraintCandidate> {
    let mut out: Vec<ConstraintCandidate> = Vec::new();
    let mut merged_anchors: Vec<AnchorId> = Vec::new();

    let bound_of = |c: &ConstraintCandidate| c.constraint.kind == ConstraintKind::SizeConstantBound;
    let equality_anchors: Vec<&AnchorId> = cands
        .iter()
        .filter(|c| !bound_of(c) && c.constraint.op == Op::Eq)
        .map(|c| &c.constraint.y_id)
        .collect();

    for cand in cands.iter().filter(|c| bound_of(c)) {
        if cand.constraint.op != Op::Ge {
            continue;
        }
        let partner = cands.iter().find(|other| {
            bound_of(other)
                && other.constraint.op == Op::Le
                && other.constraint.y_id == cand.constraint.y_id
        });
        if let Some(partner) = partner {
            let gap = (&partner.constraint.b - &cand.constraint.b).abs();
            if gap < rat(5) {
                let mid = (&partner.constraint.b + &cand.constraint.b) / rat(2);
                let mut merged = cand.constraint.clone();
                merged.kind = ConstraintKind::SizeConstant;
                merged.op = Op::Eq;
                merged.b = mid;
                merged.priority = PRIORITY_STRONG;
                out.push(ConstraintCandidate::new(merged, cand.score.max(partner.score)));
                merged_anchors.push(cand.constraint.y_id.clone());
            }
        }
    }

    for cand in cands {
        if bound_of(cand) {
            let anchor = &cand.constraint.y_id;
            let covered = merged_anchors.contains(anchor)
                || equality_anchors.iter().any(|a| *a == anchor);
            if covered {
                continue;
            }
        }
        out.push(cand.clone());
    }
    out
}

/// Integer soft weight of a candidate: scaled score plus a small nudge.
/// Constant equalities outrank their inequality-bound fallbacks, and size
/// determinations outrank the redundant second-edge offsets they compete
/// with under the exactly-two rule.
pub fn whole_score(cand: &ConstraintCandidate) -> u64 {
    let base = (cand.score.clamp(0.0, 1.0) * 1000.0).round() as u64;
    let nudge = match cand.constraint.kind {
        ConstraintKind::SizeConstant => 3,
        ConstraintKind::SizeRatio | ConstraintKind::SizeOffset => 2,
        ConstraintKind::SizeConstantBound => 0,
        _ => 1,
    };
    (base + nudge).max(1)
}

/// Emits assertions for one query, interning anchor variables per
/// conformance index.
pub struct QueryEncoder<'a, B: MaxSmtBackend> {
    backend: &'a mut B,
    vars: HashMap<(AnchorId, usize), RealVar>,
}

impl<'a, B: MaxSmtBackend> QueryEncoder<'a, B> {
    pub fn new(backend: &'a mut B) -> Self {
        Self {
            backend,
            vars: HashMap::new(),
        }
    }

    pub fn backend(&mut self) -> &mut B {
        self.backend
    }

    pub fn anchor_var(&mut self, id: &AnchorId, conf: usize) -> RealVar {
        if let Some(&v) = self.vars.get(&(id.clone(), conf)) {
            return v;
        }
        let v = self.backend.fresh_real(&format!("{}_{}", id, conf));
        self.vars.insert((id.clone(), conf), v);
        v
    }

    fn expr(&mut self, view: &str, attr: Attribute, conf: usize) -> LinExpr {
        LinExpr::var(self.anchor_var(&AnchorId::new(view, attr), conf))
    }

    /// Geometry axioms for one axis of the target boxes: the derived
    /// attributes tie to the edges, edges are ordered, and all values are
    /// non-negative.
    pub fn add_axis_axioms(
        &mut self,
        tree: &ViewTree,
        targets: &[ViewId],
        conf: usize,
        horizontal: bool,
    ) {
        for &id in targets {
            let name = tree.name(id).to_string();
            let (lo, hi, size, center) = if horizontal {
                (
                    Attribute::Left,
                    Attribute::Right,
                    Attribute::Width,
                    Attribute::CenterX,
                )
            } else {
                (
                    Attribute::Top,
                    Attribute::Bottom,
                    Attribute::Height,
                    Attribute::CenterY,
                )
            };
            let lo_e = self.expr(&name, lo, conf);
            let hi_e = self.expr(&name, hi, conf);
            let size_e = self.expr(&name, size, conf);
            let center_e = self.expr(&name, center, conf);

            // size = hi − lo
            self.backend.add_hard(Assertion::Linear(LinearAssertion::eq(
                size_e.clone(),
                &hi_e.clone().sub(&lo_e),
            )));
            // center = (lo + hi) / 2
            self.backend.add_hard(Assertion::Linear(LinearAssertion::eq(
                center_e.clone(),
                &lo_e.clone().add(&hi_e).scaled(&crate::model::ratio(1, 2)),
            )));
            // lo ≤ hi
            self.backend.add_hard(Assertion::Linear(LinearAssertion::le(
                lo_e.clone(),
                &hi_e,
            )));
            // Anchors stay in the non-negative quadrant.
            for e in [lo_e, hi_e, size_e, center_e] {
                self.backend.add_hard(Assertion::Linear(LinearAssertion::ge(
                    e,
                    &LinExpr::zero(),
                )));
            }
        }
    }

    /// Weak containment of every target inside its in-target parent.
    pub fn add_containment_axioms(
        &mut self,
        tree: &ViewTree,
        targets: &[ViewId],
        conf: usize,
        horizontal: bool,
    ) {
        for &id in targets {
            let Some(parent) = tree.parent(id) else {
                continue;
            };
            if !targets.contains(&parent) {
                continue;
            }
            let child = tree.name(id).to_string();
            let parent = tree.name(parent).to_string();
            let (lo, hi) = if horizontal {
                (Attribute::Left, Attribute::Right)
            } else {
                (Attribute::Top, Attribute::Bottom)
            };
            let c_lo = self.expr(&child, lo, conf);
            let p_lo = self.expr(&parent, lo, conf);
            self.backend
                .add_hard(Assertion::Linear(LinearAssertion::ge(c_lo, &p_lo)));
            let c_hi = self.expr(&child, hi, conf);
            let p_hi = self.expr(&parent, hi, conf);
            self.backend
                .add_hard(Assertion::Linear(LinearAssertion::le(c_hi, &p_hi)));
        }
    }

    /// Pin one axis of the focus view to the conformance rectangle.
    pub fn pin_focus(
        &mut self,
        tree: &ViewTree,
        focus: ViewId,
        conformance: &Conformance,
        conf: usize,
        horizontal: bool,
    ) {
        let name = tree.name(focus).to_string();
        let (lo, hi, lo_val, span) = if horizontal {
            (
                Attribute::Left,
                Attribute::Right,
                conformance.x.clone(),
                conformance.width.clone(),
            )
        } else {
            (
                Attribute::Top,
                Attribute::Bottom,
                conformance.y.clone(),
                conformance.height.clone(),
            )
        };
        let lo_e = self.expr(&name, lo, conf);
        self.backend.add_hard(Assertion::Linear(LinearAssertion::eq(
            lo_e,
            &LinExpr::constant(lo_val.clone()),
        )));
        let hi_e = self.expr(&name, hi, conf);
        self.backend.add_hard(Assertion::Linear(LinearAssertion::eq(
            hi_e,
            &LinExpr::constant(&lo_val + &span),
        )));
    }

    /// Translate `y op a·x + b` into the conformance-indexed variables.
    pub fn encode_constraint(&mut self, c: &Constraint, conf: usize) -> LinearAssertion {
        let y = LinExpr::var(self.anchor_var(&c.y_id, conf));
        let mut rhs = LinExpr::constant(c.b.clone());
        if let Some(x_id) = &c.x_id {
            let x = self.anchor_var(x_id, conf);
            rhs = rhs.plus_term(x, c.a.clone());
        }
        let cmp = match c.op {
            Op::Eq => Cmp::Eq,
            Op::Le => Cmp::Le,
            Op::Ge => Cmp::Ge,
        };
        LinearAssertion::compare(y, cmp, &rhs)
    }

}

/// The four anchors of a view on one axis.
pub fn axis_anchors(name: &str, horizontal: bool) -> [AnchorId; 4] {
    let attrs = if horizontal {
        Attribute::HORIZONTAL
    } else {
        Attribute::VERTICAL
    };
    attrs.map(|a| AnchorId::new(name, a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ratio;

    fn cand(kind: ConstraintKind, y: &str, op: Op, b: i64, score: f64) -> ConstraintCandidate {
        let mut c = Constraint::template(kind, y.parse().unwrap(), None);
        c.sample_count = 1;
        c.b = rat(b);
        c.op = op;
        ConstraintCandidate::new(c, score)
    }

    #[test]
    fn test_combine_bounds_merges_close_pair() {
        let cands = vec![
            cand(ConstraintKind::SizeConstantBound, "a.width", Op::Ge, 99, 0.8),
            cand(ConstraintKind::SizeConstantBound, "a.width", Op::Le, 101, 0.7),
        ];
        let out = combine_bounds(&cands);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].constraint.op, Op::Eq);
        assert_eq!(out[0].constraint.b, rat(100));
        assert_eq!(out[0].constraint.kind, ConstraintKind::SizeConstant);
    }

    #[test]
    fn test_stray_bound_kept_only_without_equality() {
        let stray = vec![cand(
            ConstraintKind::SizeConstantBound,
            "a.width",
            Op::Ge,
            50,
            0.5,
        )];
        assert_eq!(combine_bounds(&stray).len(), 1);

        let covered = vec![
            cand(ConstraintKind::SizeConstant, "a.width", Op::Eq, 60, 0.9),
            cand(ConstraintKind::SizeConstantBound, "a.width", Op::Ge, 50, 0.5),
        ];
        let out = combine_bounds(&covered);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].constraint.kind, ConstraintKind::SizeConstant);
    }

    #[test]
    fn test_prepare_drops_aspect_ratio_kinds() {
        let mut aspect = Constraint::template(
            ConstraintKind::SizeAspectRatio,
            "a.width".parse().unwrap(),
            Some("a.height".parse().unwrap()),
        );
        aspect.sample_count = 1;
        aspect.a = ratio(3, 2);
        let cands = vec![
            ConstraintCandidate::new(aspect, 1.0),
            cand(ConstraintKind::SizeConstant, "a.height", Op::Eq, 80, 1.0),
        ];
        let out = prepare_candidates(&cands);
        assert!(out.horizontal.is_empty());
        assert_eq!(out.vertical.len(), 1);
    }

    #[test]
    fn test_whole_score_ordering() {
        let constant = cand(ConstraintKind::SizeConstant, "a.width", Op::Eq, 100, 0.9);
        let bound = cand(ConstraintKind::SizeConstantBound, "a.width", Op::Ge, 100, 0.9);
        assert!(whole_score(&constant) > whole_score(&bound));
        let zero = cand(ConstraintKind::SizeConstant, "a.width", Op::Eq, 1, 0.0);
        assert!(whole_score(&zero) >= 1);
    }
}
