//! The view tree: an arena of named rectangles with parent/child links.
//!
//! The tree is the single owner of all geometry. Anchors and edges are cheap
//! value types derived on demand and keyed by `(view_name, attribute)`, so
//! nothing in the model holds a cyclic reference.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::attribute::Attribute;
use super::geometry::{Rat, Rect};

/// Index of a view inside its tree. Valid only for the tree that issued it.
pub type ViewId = usize;

/// Identifier of a single scalar anchor, e.g. `header.bottom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId {
    pub view: String,
    pub attribute: Attribute,
}

impl AnchorId {
    pub fn new(view: impl Into<String>, attribute: Attribute) -> Self {
        Self {
            view: view.into(),
            attribute,
        }
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.view, self.attribute)
    }
}

impl FromStr for AnchorId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (view, attr) = s
            .rsplit_once('.')
            .ok_or_else(|| format!("'{}' is not a valid anchor id", s))?;
        if view.is_empty() {
            return Err(format!("'{}' is not a valid anchor id", s));
        }
        Ok(AnchorId::new(view, attr.parse()?))
    }
}

/// A materialized anchor: identifier plus its value under one example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub id: AnchorId,
    pub value: Rat,
}

/// A 1-D segment of a view perpendicular to its attribute's axis, e.g.
/// `header.bottom` spans horizontally from `header.left` to `header.right`
/// at the bottom y-coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub anchor: AnchorId,
    pub position: Rat,
    pub interval: (Rat, Rat),
}

#[derive(Debug, Clone)]
pub struct ViewNode {
    pub name: String,
    pub rect: Rect,
    pub parent: Option<ViewId>,
    pub children: Vec<ViewId>,
}

/// An immutable view hierarchy. Nodes are stored in preorder, so the root is
/// always id 0 and iterating ids visits parents before children.
#[derive(Debug, Clone)]
pub struct ViewTree {
    nodes: Vec<ViewNode>,
    index: HashMap<String, ViewId>,
}

impl ViewTree {
    pub const ROOT: ViewId = 0;

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: ViewId) -> &ViewNode {
        &self.nodes[id]
    }

    pub fn root(&self) -> &ViewNode {
        &self.nodes[Self::ROOT]
    }

    /// Preorder ids of every view in the tree.
    pub fn ids(&self) -> impl Iterator<Item = ViewId> + '_ {
        0..self.nodes.len()
    }

    /// Ids of every view in the subtree rooted at `id`, preorder.
    pub fn subtree_ids(&self, id: ViewId) -> Vec<ViewId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            for &child in self.nodes[next].children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    pub fn find(&self, name: &str) -> Option<ViewId> {
        self.index.get(name).copied()
    }

    pub fn name(&self, id: ViewId) -> &str {
        &self.nodes[id].name
    }

    pub fn parent(&self, id: ViewId) -> Option<ViewId> {
        self.nodes[id].parent
    }

    pub fn children(&self, id: ViewId) -> &[ViewId] {
        &self.nodes[id].children
    }

    pub fn is_leaf(&self, id: ViewId) -> bool {
        self.nodes[id].children.is_empty()
    }

    /// Whether `child` is an immediate child of `parent`.
    pub fn is_parent_of(&self, parent: ViewId, child: ViewId) -> bool {
        self.nodes[child].parent == Some(parent)
    }

    /// Whether two distinct views share a parent.
    pub fn are_siblings(&self, a: ViewId, b: ViewId) -> bool {
        a != b && self.nodes[a].parent.is_some() && self.nodes[a].parent == self.nodes[b].parent
    }

    /// Value of an attribute of a view.
    pub fn value(&self, id: ViewId, attribute: Attribute) -> Rat {
        self.nodes[id].rect.attr(attribute)
    }

    pub fn anchor(&self, id: ViewId, attribute: Attribute) -> Anchor {
        Anchor {
            id: AnchorId::new(self.nodes[id].name.clone(), attribute),
            value: self.value(id, attribute),
        }
    }

    /// Look an anchor up by identifier, anywhere in the tree.
    pub fn find_anchor(&self, anchor_id: &AnchorId) -> Option<Anchor> {
        let id = self.find(&anchor_id.view)?;
        Some(self.anchor(id, anchor_id.attribute))
    }

    /// The edge carried by a position anchor. Size anchors have no edge.
    pub fn edge(&self, id: ViewId, attribute: Attribute) -> Option<Edge> {
        if !attribute.is_position() {
            return None;
        }
        let rect = &self.nodes[id].rect;
        let interval = if attribute.is_horizontal() {
            // Vertical segment: spans the view's y extent.
            (rect.top.clone(), rect.bottom.clone())
        } else {
            // Horizontal segment: spans the view's x extent.
            (rect.left.clone(), rect.right.clone())
        };
        Some(Edge {
            anchor: AnchorId::new(self.nodes[id].name.clone(), attribute),
            position: rect.attr(attribute),
            interval,
        })
    }

    /// Structural equality of hierarchies: same arity everywhere, and (when
    /// `include_names`) the same names in the same order.
    pub fn is_isomorphic(&self, other: &ViewTree, include_names: bool) -> bool {
        fn recurse(
            a: &ViewTree,
            ai: ViewId,
            b: &ViewTree,
            bi: ViewId,
            include_names: bool,
        ) -> bool {
            let an = a.node(ai);
            let bn = b.node(bi);
            if an.children.len() != bn.children.len() {
                return false;
            }
            if include_names && an.name != bn.name {
                return false;
            }
            an.children
                .iter()
                .zip(bn.children.iter())
                .all(|(&ac, &bc)| recurse(a, ac, b, bc, include_names))
        }
        recurse(self, Self::ROOT, other, Self::ROOT, include_names)
    }
}

/// Recursive description of a view used to construct a [`ViewTree`].
#[derive(Debug, Clone)]
pub struct ViewBuilder {
    pub name: String,
    pub rect: Rect,
    pub children: Vec<ViewBuilder>,
}

impl ViewBuilder {
    pub fn new(name: impl Into<String>, rect: Rect) -> Self {
        Self {
            name: name.into(),
            rect,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: ViewBuilder) -> Self {
        self.children.push(child);
        self
    }

    /// Build the arena tree, checking name uniqueness and rectangle
    /// well-formedness.
    pub fn build(self) -> Result<ViewTree, ViewTreeError> {
        let mut tree = ViewTree {
            nodes: Vec::new(),
            index: HashMap::new(),
        };
        fn push(
            tree: &mut ViewTree,
            builder: ViewBuilder,
            parent: Option<ViewId>,
        ) -> Result<ViewId, ViewTreeError> {
            if !builder.rect.is_well_formed() {
                return Err(ViewTreeError::MalformedRect { name: builder.name });
            }
            let id = tree.nodes.len();
            if tree.index.insert(builder.name.clone(), id).is_some() {
                return Err(ViewTreeError::DuplicateName { name: builder.name });
            }
            tree.nodes.push(ViewNode {
                name: builder.name,
                rect: builder.rect,
                parent,
                children: Vec::new(),
            });
            for child in builder.children {
                let child_id = push(tree, child, Some(id))?;
                tree.nodes[id].children.push(child_id);
            }
            Ok(id)
        }
        push(&mut tree, self, None)?;
        Ok(tree)
    }
}

/// Errors from view tree construction.
#[derive(Debug, thiserror::Error)]
pub enum ViewTreeError {
    #[error("duplicate view name '{name}'")]
    DuplicateName { name: String },

    #[error("view '{name}' has a malformed rectangle (left > right or top > bottom)")]
    MalformedRect { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::geometry::rat;

    fn sample_tree() -> ViewTree {
        ViewBuilder::new("root", Rect::from_ints(0, 0, 100, 100))
            .with_child(
                ViewBuilder::new("header", Rect::from_ints(0, 0, 100, 20))
                    .with_child(ViewBuilder::new("title", Rect::from_ints(5, 5, 50, 15))),
            )
            .with_child(ViewBuilder::new("body", Rect::from_ints(0, 20, 100, 100)))
            .build()
            .unwrap()
    }

    #[test]
    fn test_preorder_layout() {
        let tree = sample_tree();
        let names: Vec<_> = tree.ids().map(|id| tree.name(id).to_string()).collect();
        assert_eq!(names, ["root", "header", "title", "body"]);
        assert_eq!(tree.find("title"), Some(2));
        assert!(tree.is_parent_of(0, 1));
        assert!(tree.are_siblings(1, 3));
        assert!(!tree.are_siblings(1, 2));
    }

    #[test]
    fn test_anchor_lookup() {
        let tree = sample_tree();
        let anchor = tree.find_anchor(&"header.bottom".parse().unwrap()).unwrap();
        assert_eq!(anchor.value, rat(20));
    }

    #[test]
    fn test_edges_span_the_perpendicular_extent() {
        let tree = sample_tree();
        let header = tree.find("header").unwrap();
        let bottom = tree.edge(header, Attribute::Bottom).unwrap();
        assert_eq!(bottom.position, rat(20));
        assert_eq!(bottom.interval, (rat(0), rat(100)));
        let left = tree.edge(header, Attribute::Left).unwrap();
        assert_eq!(left.interval, (rat(0), rat(20)));
        assert!(tree.edge(header, Attribute::Width).is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let result = ViewBuilder::new("root", Rect::from_ints(0, 0, 10, 10))
            .with_child(ViewBuilder::new("root", Rect::from_ints(0, 0, 5, 5)))
            .build();
        assert!(matches!(result, Err(ViewTreeError::DuplicateName { .. })));
    }

    #[test]
    fn test_isomorphism() {
        let a = sample_tree();
        let b = sample_tree();
        assert!(a.is_isomorphic(&b, true));

        let c = ViewBuilder::new("root", Rect::from_ints(0, 0, 10, 10))
            .with_child(ViewBuilder::new("other", Rect::from_ints(0, 0, 5, 5)))
            .build()
            .unwrap();
        assert!(!a.is_isomorphic(&c, false));
    }

    #[test]
    fn test_anchor_id_round_trip() {
        let id: AnchorId = "main.center_x".parse().unwrap();
        assert_eq!(id.view, "main");
        assert_eq!(id.attribute, Attribute::CenterX);
        assert_eq!(id.to_string(), "main.center_x");
        assert!("nodot".parse::<AnchorId>().is_err());
    }
}
