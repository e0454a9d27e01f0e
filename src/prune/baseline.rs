//! The baseline pruner: one MaxSMT selection over a set of target views.
//!
//! Used directly as the monolithic whole-tree pruner, and reused by the
//! hierarchical pruner for each per-parent subproblem. Horizontal and
//! vertical constraint systems never interact, so each axis is solved in its
//! own fresh backend.

use std::marker::PhantomData;
use std::time::Instant;

use tracing::{debug, warn};

use crate::model::{Constraint, ConstraintCandidate, ViewId, ViewTree};
use crate::prune::conformance::{conformance_range, Conformance, SizeBounds};
use crate::prune::encoding::{axis_anchors, prepare_candidates, whole_score, QueryEncoder};
use crate::smt::{Assertion, BoolVar, MaxSmtBackend, SmtOutcome};

/// A single-query pruner over a focus view and a set of target views.
pub struct BaselinePruner<'a, B: MaxSmtBackend + Default> {
    examples: &'a [ViewTree],
    min_conf: Conformance,
    max_conf: Conformance,
    focus: ViewId,
    targets: Vec<ViewId>,
    deadline: Option<Instant>,
    _backend: PhantomData<B>,
}

impl<'a, B: MaxSmtBackend + Default> BaselinePruner<'a, B> {
    /// Whole-tree pruner: the focus is the root and every view is a target.
    pub fn new(examples: &'a [ViewTree], bounds: &SizeBounds, deadline: Option<Instant>) -> Self {
        let (min_conf, max_conf) = bounds.resolve(examples);
        let targets = examples[0].ids().collect();
        Self {
            examples,
            min_conf,
            max_conf,
            focus: ViewTree::ROOT,
            targets,
            deadline,
            _backend: PhantomData,
        }
    }

    /// Subproblem pruner: one focus view with explicit targets and an
    /// explicit conformance window.
    pub fn for_focus(
        examples: &'a [ViewTree],
        focus: ViewId,
        targets: Vec<ViewId>,
        min_conf: Conformance,
        max_conf: Conformance,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            examples,
            min_conf,
            max_conf,
            focus,
            targets,
            deadline,
            _backend: PhantomData,
        }
    }

    /// Select a consistent, deterministic, maximal-score candidate subset.
    pub fn select(&self, cands: &[ConstraintCandidate]) -> Vec<Constraint> {
        let tree = &self.examples[0];
        let relevant: Vec<ConstraintCandidate> = cands
            .iter()
            .filter(|c| self.is_relevant(tree, &c.constraint))
            .cloned()
            .collect();
        if relevant.is_empty() {
            return Vec::new();
        }

        let axes = prepare_candidates(&relevant);
        let confs = conformance_range(&self.min_conf, &self.max_conf);

        let mut selected = self.solve_axis(tree, &axes.horizontal, true, &confs);
        selected.extend(self.solve_axis(tree, &axes.vertical, false, &confs));
        selected
    }

    /// A candidate is usable when its y anchor belongs to a non-focus target
    /// and its x anchor (if any) to any target.
    fn is_relevant(&self, tree: &ViewTree, c: &Constraint) -> bool {
        let in_targets = |name: &str| {
            tree.find(name)
                .is_some_and(|id| self.targets.contains(&id))
        };
        let y_ok = in_targets(&c.y_id.view) && c.y_id.view != tree.name(self.focus);
        let x_ok = match &c.x_id {
            Some(x) => in_targets(&x.view),
            None => true,
        };
        y_ok && x_ok
    }

    fn solve_axis(
        &self,
        tree: &ViewTree,
        cands: &[ConstraintCandidate],
        horizontal: bool,
        confs: &[Conformance],
    ) -> Vec<Constraint> {
        if cands.is_empty() {
            return Vec::new();
        }
        let mut backend = B::default();
        let mut encoder = QueryEncoder::new(&mut backend);

        // One selector per candidate, in candidate order.
        let selectors: Vec<BoolVar> = (0..cands.len())
            .map(|i| encoder.backend().fresh_bool(&format!("sel_{}", i)))
            .collect();

        for (conf_idx, conf) in confs.iter().enumerate() {
            encoder.pin_focus(tree, self.focus, conf, conf_idx, horizontal);
            encoder.add_axis_axioms(tree, &self.targets, conf_idx, horizontal);
            encoder.add_containment_axioms(tree, &self.targets, conf_idx, horizontal);
            for (cand, &sel) in cands.iter().zip(&selectors) {
                let assertion = encoder.encode_constraint(&cand.constraint, conf_idx);
                encoder.backend().add_hard(Assertion::Implies(sel, assertion));
            }
        }

        self.add_determinism(tree, &mut encoder, cands, &selectors, horizontal);
        self.add_linking(tree, &mut encoder, cands, &selectors);

        for (cand, &sel) in cands.iter().zip(&selectors) {
            encoder.backend().add_soft(sel, whole_score(cand));
        }

        match backend.check_with_deadline(self.deadline) {
            SmtOutcome::Sat => {
                let model = backend.model().expect("sat check has a model");
                let chosen: Vec<Constraint> = cands
                    .iter()
                    .zip(&selectors)
                    .filter(|(_, sel)| model.bool(**sel))
                    .map(|(c, _)| c.constraint.clone())
                    .collect();
                debug!(
                    focus = tree.name(self.focus),
                    horizontal,
                    candidates = cands.len(),
                    chosen = chosen.len(),
                    "axis selection complete"
                );
                chosen
            }
            SmtOutcome::Unsat => {
                warn!(
                    focus = tree.name(self.focus),
                    horizontal, "subproblem unsatisfiable, emitting empty selection"
                );
                Vec::new()
            }
            SmtOutcome::Timeout => {
                warn!(
                    focus = tree.name(self.focus),
                    horizontal, "subproblem deadline exhausted, emitting empty selection"
                );
                Vec::new()
            }
        }
    }

    /// Determinism: per anchor at most one active candidate, and per
    /// non-focus target exactly two determined anchors on the axis.
    fn add_determinism(
        &self,
        tree: &ViewTree,
        encoder: &mut QueryEncoder<'_, B>,
        cands: &[ConstraintCandidate],
        selectors: &[BoolVar],
        horizontal: bool,
    ) {
        for &target in &self.targets {
            if target == self.focus {
                continue;
            }
            let name = tree.name(target);
            let mut all_for_target: Vec<BoolVar> = Vec::new();
            for anchor in axis_anchors(name, horizontal) {
                let on_anchor: Vec<BoolVar> = cands
                    .iter()
                    .zip(selectors)
                    .filter(|(c, _)| c.constraint.y_id == anchor)
                    .map(|(_, &sel)| sel)
                    .collect();
                if on_anchor.is_empty() {
                    continue;
                }
                all_for_target.extend(&on_anchor);
                encoder.backend().add_hard(Assertion::AtMost(on_anchor, 1));
            }
            encoder
                .backend()
                .add_hard(Assertion::Exactly(all_for_target, 2));
        }
    }

    /// Linking: with two or more children in the query, at least two distinct
    /// children must be anchored to the focus itself, so the layout cannot
    /// drift as a rigid block.
    fn add_linking(
        &self,
        tree: &ViewTree,
        encoder: &mut QueryEncoder<'_, B>,
        cands: &[ConstraintCandidate],
        selectors: &[BoolVar],
    ) {
        for &parent in &self.targets {
            let children: Vec<ViewId> = tree
                .children(parent)
                .iter()
                .copied()
                .filter(|c| self.targets.contains(c))
                .collect();
            if children.len() < 2 {
                continue;
            }
            let parent_name = tree.name(parent);
            let groups: Vec<Vec<BoolVar>> = children
                .iter()
                .map(|&child| {
                    let child_name = tree.name(child);
                    cands
                        .iter()
                        .zip(selectors)
                        .filter(|(c, _)| {
                            c.constraint.y_id.view == child_name
                                && c.constraint
                                    .x_id
                                    .as_ref()
                                    .is_some_and(|x| x.view == parent_name)
                        })
                        .map(|(_, &sel)| sel)
                        .collect()
                })
                .collect();
            encoder.backend().add_hard(Assertion::CoverGroups(groups, 2));
        }
    }
}
