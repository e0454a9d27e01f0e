//! Constraints over view anchors: `y op a·x + b` with rational coefficients.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::geometry::{rat, rat_from_string, rat_to_string, Rat};
use super::view::AnchorId;

/// The shape of a constraint. The kind determines which of `a` and `b` are
/// free parameters when the constraint is a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// y = b
    SizeConstant,
    /// y ≥ b or y ≤ b; low-priority form produced only when learning yields
    /// an inequality bound.
    SizeConstantBound,
    /// y = x + b
    SizeOffset,
    /// y = a·x
    SizeRatio,
    /// y = a·x + b
    SizeRatioGeneral,
    /// y = a·x, y and x on perpendicular axes of the same view
    SizeAspectRatio,
    /// y = a·x + b on perpendicular axes of the same view
    SizeAspectRatioGeneral,
    /// y = x + b over position anchors; b = 0 means alignment.
    PosLtrbOffset,
    /// y = x over center attributes.
    PosCentering,
}

impl ConstraintKind {
    pub fn is_constant_form(self) -> bool {
        matches!(
            self,
            ConstraintKind::SizeConstant | ConstraintKind::SizeConstantBound
        )
    }

    pub fn is_add_only_form(self) -> bool {
        matches!(
            self,
            ConstraintKind::SizeOffset | ConstraintKind::PosLtrbOffset | ConstraintKind::PosCentering
        )
    }

    pub fn is_mul_only_form(self) -> bool {
        matches!(
            self,
            ConstraintKind::SizeRatio | ConstraintKind::SizeAspectRatio
        )
    }

    pub fn is_general_form(self) -> bool {
        matches!(
            self,
            ConstraintKind::SizeRatioGeneral | ConstraintKind::SizeAspectRatioGeneral
        )
    }

    pub fn is_position_kind(self) -> bool {
        matches!(
            self,
            ConstraintKind::PosLtrbOffset | ConstraintKind::PosCentering
        )
    }

    pub fn is_size_kind(self) -> bool {
        !self.is_position_kind()
    }

    /// Number of unknown parameters a template of this kind carries.
    pub fn num_free_vars(self) -> usize {
        match self {
            ConstraintKind::PosCentering => 0,
            ConstraintKind::SizeConstant
            | ConstraintKind::SizeConstantBound
            | ConstraintKind::SizeOffset
            | ConstraintKind::SizeRatio
            | ConstraintKind::SizeAspectRatio
            | ConstraintKind::PosLtrbOffset => 1,
            ConstraintKind::SizeRatioGeneral | ConstraintKind::SizeAspectRatioGeneral => 2,
        }
    }

    /// Whether templates of this kind take an x anchor.
    pub fn has_x(self) -> bool {
        !self.is_constant_form()
    }
}

/// Comparison operator of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
}

impl Op {
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Le => "<=",
            Op::Ge => ">=",
        }
    }

    pub fn flipped(self) -> Op {
        match self {
            Op::Eq => Op::Eq,
            Op::Le => Op::Ge,
            Op::Ge => Op::Le,
        }
    }
}

/// Constraint priority as a strong/medium/weak triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Priority(pub [u32; 3]);

pub const PRIORITY_REQUIRED: Priority = Priority([1000, 1000, 1000]);
pub const PRIORITY_STRONG: Priority = Priority([750, 750, 750]);
pub const PRIORITY_MEDIUM: Priority = Priority([500, 500, 500]);
pub const PRIORITY_WEAK: Priority = Priority([250, 250, 250]);

/// An immutable constraint. `sample_count == 0` marks a template whose free
/// parameters are still unknown; learners produce concrete candidates via
/// [`Constraint::subst`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub y_id: AnchorId,
    pub x_id: Option<AnchorId>,
    pub a: Rat,
    pub b: Rat,
    pub op: Op,
    pub priority: Priority,
    pub sample_count: usize,
}

impl Constraint {
    /// Create a template with default parameters for its kind.
    pub fn template(kind: ConstraintKind, y_id: AnchorId, x_id: Option<AnchorId>) -> Self {
        debug_assert_eq!(kind.has_x(), x_id.is_some());
        let a = if kind.is_constant_form() {
            rat(0)
        } else {
            rat(1)
        };
        Self {
            kind,
            y_id,
            x_id,
            a,
            b: rat(0),
            op: Op::Eq,
            priority: PRIORITY_REQUIRED,
            sample_count: 0,
        }
    }

    pub fn is_template(&self) -> bool {
        self.sample_count == 0
    }

    /// Functional substitution: fill in learned parameters, producing a new
    /// candidate constraint. Parameters passed as `None` keep their defaults.
    pub fn subst(&self, a: Option<Rat>, b: Option<Rat>, sample_count: usize) -> Self {
        debug_assert!(self.is_template());
        debug_assert!(sample_count > 0);
        let mut out = self.clone();
        if let Some(a) = a {
            debug_assert!(!self.kind.is_constant_form() || a == rat(0));
            out.a = a;
        }
        if let Some(b) = b {
            out.b = b;
        }
        out.sample_count = sample_count;
        out
    }

    pub fn with_op(&self, op: Op) -> Self {
        let mut out = self.clone();
        out.op = op;
        out
    }

    pub fn with_priority(&self, priority: Priority) -> Self {
        let mut out = self.clone();
        out.priority = priority;
        out
    }

    /// Whether this constraint lives on the horizontal axis. Constraints never
    /// mix axes except the aspect-ratio kinds, which are classified by their
    /// y anchor.
    pub fn is_horizontal(&self) -> bool {
        self.y_id.attribute.is_horizontal()
    }

    /// Both anchors, y first.
    pub fn anchor_ids(&self) -> impl Iterator<Item = &AnchorId> {
        std::iter::once(&self.y_id).chain(self.x_id.iter())
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = if self.is_template() {
            "_".to_string()
        } else {
            rat_to_string(&self.a)
        };
        let b = if self.is_template() {
            "_".to_string()
        } else {
            rat_to_string(&self.b)
        };
        match (&self.x_id, self.kind) {
            (None, _) => write!(f, "{} {} {}", self.y_id, self.op.as_str(), b),
            (Some(x), k) if k.is_mul_only_form() => {
                write!(f, "{} {} {} * {}", self.y_id, self.op.as_str(), a, x)
            }
            (Some(x), k) if k.is_add_only_form() => {
                write!(f, "{} {} {} + {}", self.y_id, self.op.as_str(), x, b)
            }
            (Some(x), _) => {
                write!(f, "{} {} {} * {} + {}", self.y_id, self.op.as_str(), a, x, b)
            }
        }
    }
}

/// Flip a mul-form constraint so the multiplier is canonical:
/// `y = a·x` becomes `x = (1/a)·y`. Other forms pass through unchanged.
pub fn normalize_multiplier(c: &Constraint) -> Constraint {
    use num_traits::Zero;
    if !c.kind.is_mul_only_form() || c.a.is_zero() {
        return c.clone();
    }
    let mut out = c.clone();
    out.y_id = c.x_id.clone().expect("mul-form constraint has an x anchor");
    out.x_id = Some(c.y_id.clone());
    out.a = c.a.recip();
    out
}

/// A learned constraint with its posterior score in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintCandidate {
    pub constraint: Constraint,
    pub score: f64,
}

impl ConstraintCandidate {
    pub fn new(constraint: Constraint, score: f64) -> Self {
        Self { constraint, score }
    }
}

/// The serialized form of a constraint in the output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintRecord {
    pub y: String,
    pub x: Option<String>,
    pub a: String,
    pub b: String,
    pub op: Op,
    pub kind: ConstraintKind,
    pub priority: Priority,
    pub sample_count: usize,
}

impl From<&Constraint> for ConstraintRecord {
    fn from(c: &Constraint) -> Self {
        ConstraintRecord {
            y: c.y_id.to_string(),
            x: c.x_id.as_ref().map(|x| x.to_string()),
            a: rat_to_string(&c.a),
            b: rat_to_string(&c.b),
            op: c.op,
            kind: c.kind,
            priority: c.priority,
            sample_count: c.sample_count,
        }
    }
}

impl TryFrom<&ConstraintRecord> for Constraint {
    type Error = String;

    fn try_from(r: &ConstraintRecord) -> Result<Self, Self::Error> {
        let y_id: AnchorId = r.y.parse()?;
        let x_id = r.x.as_deref().map(str::parse).transpose()?;
        let a = rat_from_string(&r.a).ok_or_else(|| format!("bad rational '{}'", r.a))?;
        let b = rat_from_string(&r.b).ok_or_else(|| format!("bad rational '{}'", r.b))?;
        if r.kind.has_x() != x_id.is_some() {
            return Err(format!("kind {:?} disagrees with x presence", r.kind));
        }
        Ok(Constraint {
            kind: r.kind,
            y_id,
            x_id,
            a,
            b,
            op: r.op,
            priority: r.priority,
            sample_count: r.sample_count,
        })
    }
}
