//! Shared data model: attributes, exact-rational geometry, the view tree,
//! and constraints.

pub mod attribute;
pub mod constraint;
pub mod geometry;
pub mod view;

pub use attribute::Attribute;
pub use constraint::{
    normalize_multiplier, Constraint, ConstraintCandidate, ConstraintKind, ConstraintRecord, Op,
    Priority, PRIORITY_MEDIUM, PRIORITY_REQUIRED, PRIORITY_STRONG, PRIORITY_WEAK,
};
pub use geometry::{
    rat, rat_from_f64, rat_from_string, rat_round, rat_to_f64, rat_to_string, ratio, Rat, Rect,
};
pub use view::{Anchor, AnchorId, Edge, ViewBuilder, ViewId, ViewNode, ViewTree, ViewTreeError};
