//! Constraint evaluation via the kasuari Cassowary solver.
//!
//! This is the consumer side of synthesis: apply a selected constraint set
//! to a view-tree skeleton at a concrete root rectangle and read back the
//! solved geometry. Arithmetic here is floating point; the exact-rational
//! guarantee covers synthesis, not evaluation.

use std::collections::HashMap;

use kasuari::{Expression, Solver as KasuariSolver, Strength, Variable, WeightedRelation::*};
use thiserror::Error;

use crate::model::{
    rat_from_f64, rat_to_f64, AnchorId, Attribute, Constraint, Op, Rect, ViewBuilder, ViewId,
    ViewTree, ViewTreeError,
};

/// Errors from constraint evaluation.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("constraint '{constraint}' cannot be satisfied")]
    Unsatisfiable { constraint: String },

    #[error("constraint '{constraint}' references unknown view '{view}'")]
    UnknownView { constraint: String, view: String },

    #[error("solved geometry is malformed: {0}")]
    BadGeometry(#[from] ViewTreeError),

    #[error("solved value for '{anchor}' is not finite")]
    NonFiniteValue { anchor: String },
}

/// Wrapper owning the kasuari solver and the anchor-to-variable interning.
struct Evaluator {
    solver: KasuariSolver,
    variables: HashMap<AnchorId, Variable>,
}

impl Evaluator {
    fn new() -> Self {
        Self {
            solver: KasuariSolver::new(),
            variables: HashMap::new(),
        }
    }

    /// Base edge variable (left, top, right, bottom) of a view.
    fn edge_var(&mut self, view: &str, attribute: Attribute) -> Variable {
        let id = AnchorId::new(view, attribute);
        if let Some(&v) = self.variables.get(&id) {
            return v;
        }
        let v = Variable::new();
        self.variables.insert(id, v);
        v
    }

    /// Expression for any attribute, derived attributes expanded over the
    /// base edges.
    fn attr_expr(&mut self, view: &str, attribute: Attribute) -> Expression {
        match attribute {
            Attribute::Left | Attribute::Top | Attribute::Right | Attribute::Bottom => {
                self.edge_var(view, attribute).into()
            }
            Attribute::Width => {
                let l = self.edge_var(view, Attribute::Left);
                let r = self.edge_var(view, Attribute::Right);
                r - l
            }
            Attribute::Height => {
                let t = self.edge_var(view, Attribute::Top);
                let b = self.edge_var(view, Attribute::Bottom);
                b - t
            }
            Attribute::CenterX => {
                let l = self.edge_var(view, Attribute::Left);
                let r = self.edge_var(view, Attribute::Right);
                l * 0.5 + r * 0.5
            }
            Attribute::CenterY => {
                let t = self.edge_var(view, Attribute::Top);
                let b = self.edge_var(view, Attribute::Bottom);
                t * 0.5 + b * 0.5
            }
        }
    }

    fn add_required(
        &mut self,
        constraint: kasuari::Constraint,
        source: &str,
    ) -> Result<(), EvalError> {
        self.solver.add_constraint(constraint).map_err(|_| {
            EvalError::Unsatisfiable {
                constraint: source.to_string(),
            }
        })
    }
}

/// Apply a constraint set to the skeleton at a concrete root rectangle and
/// return the solved tree.
pub fn evaluate(
    skeleton: &ViewTree,
    root_rect: &Rect,
    constraints: &[Constraint],
) -> Result<ViewTree, EvalError> {
    let mut eval = Evaluator::new();
    let root_name = skeleton.root().name.clone();

    // The root is fixed outright.
    for (attribute, value) in [
        (Attribute::Left, &root_rect.left),
        (Attribute::Top, &root_rect.top),
        (Attribute::Right, &root_rect.right),
        (Attribute::Bottom, &root_rect.bottom),
    ] {
        let var = eval.edge_var(&root_name, attribute);
        let desc = format!("{}.{} = {}", root_name, attribute, rat_to_f64(value));
        eval.add_required(var | EQ(Strength::REQUIRED) | rat_to_f64(value), &desc)?;
    }

    for constraint in constraints {
        for anchor in constraint.anchor_ids() {
            if skeleton.find(&anchor.view).is_none() {
                return Err(EvalError::UnknownView {
                    constraint: constraint.to_string(),
                    view: anchor.view.clone(),
                });
            }
        }
        let y = eval.attr_expr(&constraint.y_id.view, constraint.y_id.attribute);
        let mut rhs: Expression = Expression::from_constant(rat_to_f64(&constraint.b));
        if let Some(x_id) = &constraint.x_id {
            let x = eval.attr_expr(&x_id.view, x_id.attribute);
            rhs = rhs + x * rat_to_f64(&constraint.a);
        }
        let relation = match constraint.op {
            Op::Eq => EQ(Strength::REQUIRED),
            Op::Le => LE(Strength::REQUIRED),
            Op::Ge => GE(Strength::REQUIRED),
        };
        let desc = constraint.to_string();
        eval.add_required(y | relation | rhs, &desc)?;
    }

    let changes: HashMap<Variable, f64> = eval
        .solver
        .fetch_changes()
        .iter()
        .map(|(v, value)| (*v, *value))
        .collect();
    let value_of = |eval: &Evaluator, view: &str, attribute: Attribute| -> f64 {
        eval.variables
            .get(&AnchorId::new(view, attribute))
            .and_then(|v| changes.get(v))
            .copied()
            .unwrap_or(0.0)
    };

    // Rebuild the tree from the solved edges.
    fn rebuild(
        eval: &Evaluator,
        skeleton: &ViewTree,
        id: ViewId,
        value_of: &dyn Fn(&Evaluator, &str, Attribute) -> f64,
    ) -> Result<ViewBuilder, EvalError> {
        let name = skeleton.name(id);
        let mut rect_values = [0.0f64; 4];
        for (slot, attribute) in [
            Attribute::Left,
            Attribute::Top,
            Attribute::Right,
            Attribute::Bottom,
        ]
        .into_iter()
        .enumerate()
        {
            let v = value_of(eval, name, attribute);
            if !v.is_finite() {
                return Err(EvalError::NonFiniteValue {
                    anchor: AnchorId::new(name, attribute).to_string(),
                });
            }
            rect_values[slot] = v;
        }
        let to_rat = |v: f64| rat_from_f64(v).expect("finite value");
        let rect = Rect::new(
            to_rat(rect_values[0]),
            to_rat(rect_values[1]),
            to_rat(rect_values[2]),
            to_rat(rect_values[3]),
        );
        let mut builder = ViewBuilder::new(name, rect);
        for &child in skeleton.children(id) {
            builder
                .children
                .push(rebuild(eval, skeleton, child, value_of)?);
        }
        Ok(builder)
    }

    let builder = rebuild(&eval, skeleton, ViewTree::ROOT, &value_of)?;
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{rat, ratio, ConstraintKind};

    fn skeleton() -> ViewTree {
        ViewBuilder::new("root", Rect::from_ints(0, 0, 800, 600))
            .with_child(ViewBuilder::new("header", Rect::from_ints(0, 0, 800, 80)))
            .build()
            .unwrap()
    }

    fn candidate(kind: ConstraintKind, y: &str, x: Option<&str>, a: crate::model::Rat, b: i64) -> Constraint {
        let mut c = Constraint::template(kind, y.parse().unwrap(), x.map(|x| x.parse().unwrap()));
        c.a = if kind.has_x() { a } else { rat(0) };
        c.b = rat(b);
        c.sample_count = 1;
        c
    }

    #[test]
    fn test_evaluate_header_layout() {
        let constraints = vec![
            candidate(ConstraintKind::PosLtrbOffset, "header.left", Some("root.left"), rat(1), 0),
            candidate(ConstraintKind::PosLtrbOffset, "header.top", Some("root.top"), rat(1), 0),
            candidate(ConstraintKind::SizeRatio, "header.width", Some("root.width"), rat(1), 0),
            candidate(ConstraintKind::SizeConstant, "header.height", None, rat(0), 80),
        ];
        // Evaluate at a larger screen than either example.
        let solved = evaluate(
            &skeleton(),
            &Rect::from_ints(0, 0, 1600, 1000),
            &constraints,
        )
        .unwrap();
        let header = solved.find("header").unwrap();
        assert_eq!(solved.node(header).rect, Rect::from_ints(0, 0, 1600, 80));
    }

    #[test]
    fn test_evaluate_ratio_constraint() {
        let constraints = vec![
            candidate(ConstraintKind::PosLtrbOffset, "header.left", Some("root.left"), rat(1), 0),
            candidate(ConstraintKind::PosLtrbOffset, "header.top", Some("root.top"), rat(1), 0),
            candidate(ConstraintKind::SizeRatio, "header.width", Some("root.width"), ratio(1, 2), 0),
            candidate(ConstraintKind::SizeConstant, "header.height", None, rat(0), 80),
        ];
        let solved = evaluate(&skeleton(), &Rect::from_ints(0, 0, 800, 600), &constraints).unwrap();
        let header = solved.find("header").unwrap();
        assert_eq!(solved.node(header).rect.width(), rat(400));
    }

    #[test]
    fn test_unknown_view_rejected() {
        let constraints = vec![candidate(
            ConstraintKind::SizeConstant,
            "ghost.height",
            None,
            rat(0),
            80,
        )];
        let err = evaluate(&skeleton(), &Rect::from_ints(0, 0, 800, 600), &constraints);
        assert!(matches!(err, Err(EvalError::UnknownView { .. })));
    }

    #[test]
    fn test_conflicting_constraints_error() {
        let constraints = vec![
            candidate(ConstraintKind::SizeConstant, "header.height", None, rat(0), 80),
            candidate(ConstraintKind::SizeConstant, "header.height", None, rat(0), 90),
        ];
        let err = evaluate(&skeleton(), &Rect::from_ints(0, 0, 800, 600), &constraints);
        assert!(matches!(err, Err(EvalError::Unsatisfiable { .. })));
    }
}
