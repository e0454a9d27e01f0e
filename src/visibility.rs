//! Sweep-line visibility: which edges can see each other without crossing
//! another view's edge.
//!
//! For every internal view, horizontal edges (tops and bottoms of its
//! children) are indexed by the x-interval they span and stabbed at each
//! child x-coordinate; adjacent hits along the sweep line are visible pairs.
//! The symmetric sweep over vertical edges produces horizontal adjacency.
//! Center edges of adjacent views are emitted beside each pair so that
//! center alignment can be instantiated later.

use std::collections::HashSet;

use crate::model::{AnchorId, Attribute, Rat, ViewId, ViewTree};

/// One indexed edge during a sweep.
struct SweepEdge {
    view: ViewId,
    attribute: Attribute,
    position: Rat,
    interval: (Rat, Rat),
    /// Sort rank: the owning view's center along the sweep axis.
    center: Rat,
}

/// A flat interval table with stab queries, keyed on the perpendicular axis
/// of the edges it holds. Intervals are half-open, so a sweep coordinate on
/// the far endpoint does not hit, and empty intervals (zero-area views)
/// never match.
struct IntervalTable {
    entries: Vec<SweepEdge>,
}

impl IntervalTable {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn insert(&mut self, edge: SweepEdge) {
        if edge.interval.0 < edge.interval.1 {
            self.entries.push(edge);
        }
    }

    fn stab(&self, at: &Rat) -> Vec<&SweepEdge> {
        self.entries
            .iter()
            .filter(|e| e.interval.0 <= *at && *at < e.interval.1)
            .collect()
    }
}

/// The visibility relation of one or more example trees: unordered edge
/// pairs, plus per-axis view-level aggregation used for sibling alignment.
#[derive(Debug, Default)]
pub struct Visibility {
    edge_pairs: HashSet<(AnchorId, AnchorId)>,
    h_visible_views: HashSet<(String, String)>,
    v_visible_views: HashSet<(String, String)>,
}

fn pair_key(a: AnchorId, b: AnchorId) -> (AnchorId, AnchorId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn name_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl Visibility {
    /// Compute the visibility relation of a single tree, recursing into
    /// every internal view.
    pub fn of_tree(tree: &ViewTree) -> Self {
        let mut vis = Visibility::default();
        for id in tree.ids() {
            if !tree.is_leaf(id) {
                vis.sweep_focus(tree, id);
            }
        }
        vis
    }

    /// Union of the visibility relations of all examples.
    pub fn union_of(examples: &[ViewTree]) -> Self {
        let mut out = Visibility::default();
        for tree in examples {
            let vis = Self::of_tree(tree);
            out.edge_pairs.extend(vis.edge_pairs);
            out.h_visible_views.extend(vis.h_visible_views);
            out.v_visible_views.extend(vis.v_visible_views);
        }
        out
    }

    pub fn edges_visible(&self, a: &AnchorId, b: &AnchorId) -> bool {
        self.edge_pairs
            .contains(&pair_key(a.clone(), b.clone()))
    }

    /// Whether two views see each other along the horizontal axis.
    pub fn views_visible_h(&self, a: &str, b: &str) -> bool {
        self.h_visible_views.contains(&name_key(a, b))
    }

    /// Whether two views see each other along the vertical axis.
    pub fn views_visible_v(&self, a: &str, b: &str) -> bool {
        self.v_visible_views.contains(&name_key(a, b))
    }

    pub fn len(&self) -> usize {
        self.edge_pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edge_pairs.is_empty()
    }

    /// All pairs in canonical order, sorted for reproducible output.
    pub fn sorted_pairs(&self) -> Vec<(AnchorId, AnchorId)> {
        let mut pairs: Vec<_> = self.edge_pairs.iter().cloned().collect();
        pairs.sort();
        pairs
    }

    /// One sweep over a focus view and its immediate children.
    fn sweep_focus(&mut self, tree: &ViewTree, focus: ViewId) {
        let children = tree.children(focus);

        let mut h_table = IntervalTable::new();
        let mut v_table = IntervalTable::new();
        for &child in children {
            let rect = &tree.node(child).rect;
            for attribute in [Attribute::Top, Attribute::Bottom] {
                h_table.insert(SweepEdge {
                    view: child,
                    attribute,
                    position: rect.attr(attribute),
                    interval: (rect.left.clone(), rect.right.clone()),
                    center: rect.center_y(),
                });
            }
            for attribute in [Attribute::Left, Attribute::Right] {
                v_table.insert(SweepEdge {
                    view: child,
                    attribute,
                    position: rect.attr(attribute),
                    interval: (rect.top.clone(), rect.bottom.clone()),
                    center: rect.center_x(),
                });
            }
        }

        let mut x_events: Vec<Rat> = Vec::new();
        let mut y_events: Vec<Rat> = Vec::new();
        for &id in std::iter::once(&focus).chain(children.iter()) {
            let rect = &tree.node(id).rect;
            x_events.push(rect.left.clone());
            x_events.push(rect.right.clone());
            y_events.push(rect.top.clone());
            y_events.push(rect.bottom.clone());
        }
        x_events.sort();
        x_events.dedup();
        y_events.sort();
        y_events.dedup();

        // Vertical lines through horizontal edges: vertical adjacency.
        for x in &x_events {
            let mut hits = h_table.stab(x);
            hits.sort_by(|a, b| (&a.center, &a.position).cmp(&(&b.center, &b.position)));
            let line: Vec<(ViewId, Attribute)> = std::iter::once((focus, Attribute::Top))
                .chain(hits.iter().map(|e| (e.view, e.attribute)))
                .chain(std::iter::once((focus, Attribute::Bottom)))
                .collect();
            self.emit_adjacent(tree, &line, Attribute::CenterY);
        }

        // Horizontal lines through vertical edges: horizontal adjacency.
        for y in &y_events {
            let mut hits = v_table.stab(y);
            hits.sort_by(|a, b| (&a.center, &a.position).cmp(&(&b.center, &b.position)));
            let line: Vec<(ViewId, Attribute)> = std::iter::once((focus, Attribute::Left))
                .chain(hits.iter().map(|e| (e.view, e.attribute)))
                .chain(std::iter::once((focus, Attribute::Right)))
                .collect();
            self.emit_adjacent(tree, &line, Attribute::CenterX);
        }
    }

    /// Emit every adjacent distinct-view pair along one sweep line, plus the
    /// corresponding center pair of the two views.
    fn emit_adjacent(&mut self, tree: &ViewTree, line: &[(ViewId, Attribute)], center: Attribute) {
        for window in line.windows(2) {
            let (v0, a0) = window[0];
            let (v1, a1) = window[1];
            if v0 == v1 {
                continue;
            }
            let n0 = tree.name(v0);
            let n1 = tree.name(v1);
            self.edge_pairs.insert(pair_key(
                AnchorId::new(n0, a0),
                AnchorId::new(n1, a1),
            ));
            self.edge_pairs.insert(pair_key(
                AnchorId::new(n0, center),
                AnchorId::new(n1, center),
            ));
            let views = name_key(n0, n1);
            if center == Attribute::CenterY {
                self.v_visible_views.insert(views);
            } else {
                self.h_visible_views.insert(views);
            }
        }
    }
}
