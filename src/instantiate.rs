//! Template instantiation: enumerate well-formed constraint sketches over
//! anchor pairs.
//!
//! The rules are relationship predicates over ordered anchor pairs `(y, x)`:
//! aspect ratios within a view, parent-relative size ratios, absolute sizes,
//! and visible offset/alignment pairs. Emission order is stable (preorder
//! views, fixed attribute order) so runs are reproducible.

use crate::model::{AnchorId, Attribute, Constraint, ConstraintKind, ViewId, ViewTree};
use crate::visibility::Visibility;

/// Enumerates constraint sketches for a set of isomorphic example trees.
pub struct Instantiator<'a> {
    examples: &'a [ViewTree],
    visibility: Visibility,
}

impl<'a> Instantiator<'a> {
    /// Build an instantiator over the examples, computing the union of their
    /// visibility relations.
    pub fn new(examples: &'a [ViewTree]) -> Self {
        Self {
            examples,
            visibility: Visibility::union_of(examples),
        }
    }

    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    /// Emit all sketches. Topology is read from the first example; examples
    /// are assumed isomorphic.
    pub fn instantiate(&self) -> Vec<Constraint> {
        let tree = &self.examples[0];
        let mut sketches = Vec::new();

        let anchors: Vec<(ViewId, Attribute)> = tree
            .ids()
            .flat_map(|id| Attribute::ALL.into_iter().map(move |attr| (id, attr)))
            .collect();

        for &(yv, ya) in &anchors {
            // Absolute size sketches: every size anchor gets one.
            if ya.is_size() {
                sketches.push(Constraint::template(
                    ConstraintKind::SizeConstant,
                    anchor_id(tree, yv, ya),
                    None,
                ));
            }

            for &(xv, xa) in &anchors {
                if let Some(kind) = self.classify(tree, yv, ya, xv, xa) {
                    sketches.push(Constraint::template(
                        kind,
                        anchor_id(tree, yv, ya),
                        Some(anchor_id(tree, xv, xa)),
                    ));
                }
            }
        }

        sketches
    }

    /// The rule table: which sketch kind, if any, an ordered anchor pair
    /// produces.
    fn classify(
        &self,
        tree: &ViewTree,
        yv: ViewId,
        ya: Attribute,
        xv: ViewId,
        xa: Attribute,
    ) -> Option<ConstraintKind> {
        let same_view = yv == xv;
        let parent = tree.is_parent_of(xv, yv);
        let sibling = tree.are_siblings(yv, xv);
        let same_attr = ya == xa;
        let both_size = ya.is_size() && xa.is_size();
        let both_pos = ya.is_position() && xa.is_position();
        let same_axis = (ya.is_horizontal() && xa.is_horizontal())
            || (ya.is_vertical() && xa.is_vertical());

        // Aspect ratio: width against height of the same view.
        if same_view && both_size && ya.is_horizontal() && xa.is_vertical() {
            return Some(ConstraintKind::SizeAspectRatio);
        }

        // Parent-relative size.
        if parent && both_size && same_axis {
            return Some(ConstraintKind::SizeRatio);
        }

        // Offset against the parent's matching edge, when unobstructed.
        if parent && both_pos && same_attr && self.pair_visible(tree, yv, ya, xv, xa) {
            return Some(ConstraintKind::PosLtrbOffset);
        }

        // Adjacency between siblings: dual edges facing each other.
        if sibling && both_pos && ya.is_dual_pair(xa) && self.pair_visible(tree, yv, ya, xv, xa) {
            return Some(ConstraintKind::PosLtrbOffset);
        }

        // Alignment between siblings: matching position attributes, with the
        // views mutually visible on the perpendicular axis.
        if sibling && both_pos && same_attr && self.cross_axis_visible(tree, yv, xv, ya) {
            return Some(ConstraintKind::PosLtrbOffset);
        }

        // Sibling-relative size rules are deliberately not part of the table;
        // they over-generate without improving coverage.
        None
    }

    fn pair_visible(
        &self,
        tree: &ViewTree,
        yv: ViewId,
        ya: Attribute,
        xv: ViewId,
        xa: Attribute,
    ) -> bool {
        self.visibility
            .edges_visible(&anchor_id(tree, yv, ya), &anchor_id(tree, xv, xa))
    }

    /// View-level visibility on the axis perpendicular to the attribute:
    /// alignment on a horizontal attribute needs the views stacked within
    /// sight vertically, and vice versa.
    fn cross_axis_visible(&self, tree: &ViewTree, yv: ViewId, xv: ViewId, attr: Attribute) -> bool {
        let a = tree.name(yv);
        let b = tree.name(xv);
        if attr.is_horizontal() {
            self.visibility.views_visible_v(a, b)
        } else {
            self.visibility.views_visible_h(a, b)
        }
    }
}

fn anchor_id(tree: &ViewTree, view: ViewId, attribute: Attribute) -> AnchorId {
    AnchorId::new(tree.name(view), attribute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Rect, ViewBuilder};

    fn sketch_strings(sketches: &[Constraint]) -> Vec<String> {
        sketches
            .iter()
            .map(|s| {
                let x = s
                    .x_id
                    .as_ref()
                    .map(|x| x.to_string())
                    .unwrap_or_else(|| "-".to_string());
                format!("{:?} {} {}", s.kind, s.y_id, x)
            })
            .collect()
    }

    fn header_tree() -> ViewTree {
        ViewBuilder::new("root", Rect::from_ints(0, 0, 800, 600))
            .with_child(ViewBuilder::new("header", Rect::from_ints(0, 0, 800, 80)))
            .build()
            .unwrap()
    }

    #[test]
    fn test_every_size_anchor_gets_a_constant_sketch() {
        let examples = [header_tree()];
        let sketches = Instantiator::new(&examples).instantiate();
        let strings = sketch_strings(&sketches);
        for name in ["root", "header"] {
            for attr in ["width", "height"] {
                let want = format!("SizeConstant {}.{} -", name, attr);
                assert!(strings.contains(&want), "missing {}", want);
            }
        }
    }

    #[test]
    fn test_parent_relative_size_and_aspect() {
        let examples = [header_tree()];
        let sketches = Instantiator::new(&examples).instantiate();
        let strings = sketch_strings(&sketches);
        assert!(strings.contains(&"SizeRatio header.width root.width".to_string()));
        assert!(strings.contains(&"SizeRatio header.height root.height".to_string()));
        // No cross-axis parent ratio.
        assert!(!strings.contains(&"SizeRatio header.width root.height".to_string()));
        assert!(strings.contains(&"SizeAspectRatio header.width header.height".to_string()));
        assert!(strings.contains(&"SizeAspectRatio root.width root.height".to_string()));
    }

    #[test]
    fn test_parent_offset_requires_visibility() {
        let examples = [header_tree()];
        let sketches = Instantiator::new(&examples).instantiate();
        let strings = sketch_strings(&sketches);
        // header.top touches root.top and is visible.
        assert!(strings.contains(&"PosLtrbOffset header.top root.top".to_string()));
        // header.bottom can see root.bottom across the empty body.
        assert!(strings.contains(&"PosLtrbOffset header.bottom root.bottom".to_string()));
    }

    #[test]
    fn test_sibling_adjacency_and_alignment() {
        let tree = ViewBuilder::new("root", Rect::from_ints(0, 0, 300, 100))
            .with_child(ViewBuilder::new("a", Rect::from_ints(0, 0, 100, 100)))
            .with_child(ViewBuilder::new("b", Rect::from_ints(100, 0, 200, 100)))
            .with_child(ViewBuilder::new("c", Rect::from_ints(200, 0, 300, 100)))
            .build()
            .unwrap();
        let examples = [tree];
        let sketches = Instantiator::new(&examples).instantiate();
        let strings = sketch_strings(&sketches);

        // Adjacency via dual edges.
        assert!(strings.contains(&"PosLtrbOffset b.left a.right".to_string()));
        assert!(strings.contains(&"PosLtrbOffset c.left b.right".to_string()));
        // Blocked pair produces nothing.
        assert!(!strings.contains(&"PosLtrbOffset c.left a.right".to_string()));

        // Alignment on the perpendicular axis: a and b see each other
        // horizontally, so their vertical attributes may align.
        assert!(strings.contains(&"PosLtrbOffset a.top b.top".to_string()));
        assert!(strings.contains(&"PosLtrbOffset b.bottom a.bottom".to_string()));
        // a and c are not mutually visible; no alignment sketch.
        assert!(!strings.contains(&"PosLtrbOffset a.top c.top".to_string()));

        // No sibling-relative size sketches.
        assert!(!strings.iter().any(|s| s.starts_with("SizeRatio a.width b")));
    }

    #[test]
    fn test_emission_is_stable() {
        let examples = [header_tree()];
        let first = sketch_strings(&Instantiator::new(&examples).instantiate());
        let second = sketch_strings(&Instantiator::new(&examples).instantiate());
        assert_eq!(first, second);
    }

    #[test]
    fn test_templates_have_kind_consistent_defaults() {
        let examples = [header_tree()];
        for sketch in Instantiator::new(&examples).instantiate() {
            assert_eq!(sketch.kind.has_x(), sketch.x_id.is_some());
            assert_eq!(sketch.sample_count, 0);
        }
    }
}
