//! Hierarchical pruning: one MaxSMT subproblem per internal view.
//!
//! A worklist starts at the root with the configured conformance window.
//! Each focus view selects constraints for its immediate children, then the
//! feasible dimension range of every child is computed from the selection
//! and becomes the child's own conformance window.

use std::collections::VecDeque;
use std::time::Instant;

use tracing::{debug, warn};

use crate::model::{rat, AnchorId, Attribute, Constraint, ConstraintCandidate, ViewId, ViewTree};
use crate::prune::baseline::BaselinePruner;
use crate::prune::conformance::{conformance_range, Conformance, SizeBounds};
use crate::prune::encoding::QueryEncoder;
use crate::smt::{Assertion, MaxSmtBackend, OptOutcome};
use crate::CancelToken;

/// Worklist-driven pruner decomposed per parent view.
pub struct HierarchicalPruner<'a, B: MaxSmtBackend + Default> {
    examples: &'a [ViewTree],
    bounds: &'a SizeBounds,
    deadline: Option<Instant>,
    cancel: &'a CancelToken,
    _backend: std::marker::PhantomData<B>,
}

impl<'a, B: MaxSmtBackend + Default> HierarchicalPruner<'a, B> {
    pub fn new(
        examples: &'a [ViewTree],
        bounds: &'a SizeBounds,
        deadline: Option<Instant>,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            examples,
            bounds,
            deadline,
            cancel,
            _backend: std::marker::PhantomData,
        }
    }

    pub fn select(&self, cands: &[ConstraintCandidate]) -> Vec<Constraint> {
        let tree = &self.examples[0];
        let (min_conf, max_conf) = self.bounds.resolve(self.examples);

        let mut output: Vec<Constraint> = Vec::new();
        let mut worklist: VecDeque<(ViewId, Conformance, Conformance)> = VecDeque::new();
        worklist.push_back((ViewTree::ROOT, min_conf, max_conf));

        while let Some((focus, min_c, max_c)) = worklist.pop_front() {
            if self.cancel.is_cancelled() {
                debug!("cancellation requested, returning partial selection");
                break;
            }
            if tree.is_leaf(focus) {
                continue;
            }
            debug!(focus = tree.name(focus), "solving subproblem");

            let relevant = relevant_candidates(tree, focus, cands);
            let targets: Vec<ViewId> = std::iter::once(focus)
                .chain(tree.children(focus).iter().copied())
                .collect();
            let pruner: BaselinePruner<'_, B> = BaselinePruner::for_focus(
                self.examples,
                focus,
                targets,
                min_c.clone(),
                max_c.clone(),
                self.deadline,
            );
            let selected = pruner.select(&relevant);

            for &child in tree.children(focus) {
                if tree.is_leaf(child) {
                    continue;
                }
                let dims =
                    self.infer_child_confs(tree, focus, child, &selected, &min_c, &max_c);
                let (child_min, child_max) = dims.unwrap_or_else(|| {
                    warn!(
                        child = tree.name(child),
                        "child dimension inference failed, falling back to example extents"
                    );
                    example_extents(self.examples, tree.name(child))
                });
                worklist.push_back((child, child_min, child_max));
            }
            output.extend(selected);
        }

        output.sort_by_key(|c| c.to_string());
        output.dedup();
        output
    }

    /// Feasible dimension window of a child under the selected constraints:
    /// for each conformance of the focus window, minimize and maximize the
    /// child's position and size anchors, then take the envelope.
    fn infer_child_confs(
        &self,
        tree: &ViewTree,
        focus: ViewId,
        child: ViewId,
        selected: &[Constraint],
        min_c: &Conformance,
        max_c: &Conformance,
    ) -> Option<(Conformance, Conformance)> {
        let child_name = tree.name(child).to_string();
        let targets: Vec<ViewId> = std::iter::once(focus)
            .chain(tree.children(focus).iter().copied())
            .collect();

        // (attribute, horizontal axis) pairs forming a conformance.
        let queries = [
            (Attribute::Width, true),
            (Attribute::Height, false),
            (Attribute::Left, true),
            (Attribute::Top, false),
        ];
        let mut lows: Vec<Option<crate::model::Rat>> = vec![None; queries.len()];
        let mut highs: Vec<Option<crate::model::Rat>> = vec![None; queries.len()];

        for conf in conformance_range(min_c, max_c) {
            for (qi, (attribute, horizontal)) in queries.iter().enumerate() {
                let mut backend = B::default();
                let mut encoder = QueryEncoder::new(&mut backend);
                encoder.pin_focus(tree, focus, &conf, 0, *horizontal);
                encoder.add_axis_axioms(tree, &targets, 0, *horizontal);
                encoder.add_containment_axioms(tree, &targets, 0, *horizontal);
                for constraint in selected {
                    if constraint.is_horizontal() == *horizontal {
                        let assertion = encoder.encode_constraint(constraint, 0);
                        encoder.backend().add_hard(Assertion::Linear(assertion));
                    }
                }
                let var = encoder.anchor_var(&AnchorId::new(&child_name, *attribute), 0);

                match backend.minimize(var, self.deadline) {
                    OptOutcome::Value(v) => {
                        lows[qi] = Some(match lows[qi].take() {
                            Some(old) => old.min(v),
                            None => v,
                        });
                    }
                    OptOutcome::Unbounded => lows[qi] = Some(rat(0)),
                    OptOutcome::Infeasible | OptOutcome::Timeout => return None,
                }
                match backend.maximize(var, self.deadline) {
                    OptOutcome::Value(v) => {
                        highs[qi] = Some(match highs[qi].take() {
                            Some(old) => old.max(v),
                            None => v,
                        });
                    }
                    OptOutcome::Unbounded | OptOutcome::Infeasible | OptOutcome::Timeout => {
                        return None
                    }
                }
            }
        }

        let get = |slot: &Option<crate::model::Rat>| slot.clone();
        Some((
            Conformance::new(
                get(&lows[0])?,
                get(&lows[1])?,
                get(&lows[2])?,
                get(&lows[3])?,
            ),
            Conformance::new(
                get(&highs[0])?,
                get(&highs[1])?,
                get(&highs[2])?,
                get(&highs[3])?,
            ),
        ))
    }
}

/// Candidates in scope for a focus: the y anchor on an immediate child, the
/// x anchor (if any) on the focus itself or an immediate child.
fn relevant_candidates(
    tree: &ViewTree,
    focus: ViewId,
    cands: &[ConstraintCandidate],
) -> Vec<ConstraintCandidate> {
    let focus_name = tree.name(focus);
    let child_names: Vec<&str> = tree
        .children(focus)
        .iter()
        .map(|&c| tree.name(c))
        .collect();
    cands
        .iter()
        .filter(|cand| {
            let c = &cand.constraint;
            let y_ok = child_names.contains(&c.y_id.view.as_str());
            let x_ok = match &c.x_id {
                Some(x) => x.view == focus_name || child_names.contains(&x.view.as_str()),
                None => true,
            };
            y_ok && x_ok
        })
        .cloned()
        .collect()
}

/// Fallback conformance window of a view: its extents across the examples.
fn example_extents(examples: &[ViewTree], name: &str) -> (Conformance, Conformance) {
    let rects: Vec<_> = examples
        .iter()
        .filter_map(|t| t.find(name).map(|id| t.node(id).rect.clone()))
        .collect();
    let pick = |f: fn(&crate::model::Rect) -> crate::model::Rat, max: bool| {
        let mut vals: Vec<_> = rects.iter().map(f).collect();
        vals.sort();
        if max {
            vals.last().cloned().unwrap_or_else(|| rat(0))
        } else {
            vals.first().cloned().unwrap_or_else(|| rat(0))
        }
    };
    (
        Conformance::new(
            pick(|r| r.width(), false),
            pick(|r| r.height(), false),
            pick(|r| r.left.clone(), false),
            pick(|r| r.top.clone(), false),
        ),
        Conformance::new(
            pick(|r| r.width(), true),
            pick(|r| r.height(), true),
            pick(|r| r.left.clone(), true),
            pick(|r| r.top.clone(), true),
        ),
    )
}
