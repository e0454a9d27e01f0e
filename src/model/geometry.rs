//! Exact-rational geometry primitives.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

use super::attribute::Attribute;

/// The numeric type all core arithmetic is performed in.
pub type Rat = BigRational;

/// Build a rational from an integer.
pub fn rat(n: i64) -> Rat {
    BigRational::from_integer(BigInt::from(n))
}

/// Build a rational from a numerator/denominator pair.
pub fn ratio(num: i64, den: i64) -> Rat {
    BigRational::new(BigInt::from(num), BigInt::from(den))
}

/// Exact conversion of an `f64` to a rational. NaN and infinities have no
/// rational value.
pub fn rat_from_f64(v: f64) -> Option<Rat> {
    BigRational::from_float(v)
}

/// Lossy conversion back to `f64`, for regression internals and evaluation.
pub fn rat_to_f64(v: &Rat) -> f64 {
    v.to_f64().unwrap_or(f64::NAN)
}

/// An axis-aligned rectangle with exact edges. Invariant: left ≤ right and
/// top ≤ bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rect {
    pub left: Rat,
    pub top: Rat,
    pub right: Rat,
    pub bottom: Rat,
}

impl Rect {
    pub fn new(left: Rat, top: Rat, right: Rat, bottom: Rat) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle from integer edges, for tests and fixtures.
    pub fn from_ints(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self::new(rat(left), rat(top), rat(right), rat(bottom))
    }

    pub fn width(&self) -> Rat {
        &self.right - &self.left
    }

    pub fn height(&self) -> Rat {
        &self.bottom - &self.top
    }

    pub fn center_x(&self) -> Rat {
        (&self.left + &self.right) / rat(2)
    }

    pub fn center_y(&self) -> Rat {
        (&self.top + &self.bottom) / rat(2)
    }

    /// Value of one attribute of this rectangle.
    pub fn attr(&self, attribute: Attribute) -> Rat {
        match attribute {
            Attribute::Left => self.left.clone(),
            Attribute::Top => self.top.clone(),
            Attribute::Right => self.right.clone(),
            Attribute::Bottom => self.bottom.clone(),
            Attribute::CenterX => self.center_x(),
            Attribute::CenterY => self.center_y(),
            Attribute::Width => self.width(),
            Attribute::Height => self.height(),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.width().is_zero() || self.height().is_zero()
    }

    pub fn is_well_formed(&self) -> bool {
        self.left <= self.right && self.top <= self.bottom
    }
}

/// Render a rational the way the output document expects it: an integer when
/// the denominator is one, `p/q` otherwise.
pub fn rat_to_string(v: &Rat) -> String {
    if v.denom().is_one() {
        v.numer().to_string()
    } else {
        format!("{}/{}", v.numer(), v.denom())
    }
}

/// Parse a rational from the output document notation (`p`, `p/q`, or a
/// decimal literal).
pub fn rat_from_string(s: &str) -> Option<Rat> {
    if let Some((num, den)) = s.split_once('/') {
        let num: BigInt = num.trim().parse().ok()?;
        let den: BigInt = den.trim().parse().ok()?;
        if den.is_zero() {
            return None;
        }
        return Some(BigRational::new(num, den));
    }
    if let Ok(n) = s.trim().parse::<BigInt>() {
        return Some(BigRational::from_integer(n));
    }
    s.trim().parse::<f64>().ok().and_then(rat_from_f64)
}

/// Nearest integer to a rational, ties away from zero.
pub fn rat_round(v: &Rat) -> BigInt {
    let two = BigInt::from(2);
    let half_num = v.numer() * &two;
    let adj = if v.is_negative() {
        -v.denom()
    } else {
        v.denom().clone()
    };
    (half_num + adj) / (v.denom() * two)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_attributes() {
        let r = Rect::from_ints(10, 20, 110, 70);
        assert_eq!(r.width(), rat(100));
        assert_eq!(r.height(), rat(50));
        assert_eq!(r.center_x(), rat(60));
        assert_eq!(r.center_y(), rat(45));
        assert_eq!(r.attr(Attribute::CenterY), rat(45));
    }

    #[test]
    fn test_exact_center_of_odd_span() {
        let r = Rect::from_ints(0, 0, 5, 5);
        assert_eq!(r.center_x(), ratio(5, 2));
    }

    #[test]
    fn test_string_round_trip() {
        for v in [rat(80), ratio(3, 2), ratio(-7, 4), rat(0)] {
            let s = rat_to_string(&v);
            assert_eq!(rat_from_string(&s).unwrap(), v);
        }
        assert_eq!(rat_from_string("1.5").unwrap(), ratio(3, 2));
        assert!(rat_from_string("1/0").is_none());
    }

    #[test]
    fn test_rounding() {
        assert_eq!(rat_round(&ratio(3, 2)), BigInt::from(2));
        assert_eq!(rat_round(&ratio(-3, 2)), BigInt::from(-2));
        assert_eq!(rat_round(&ratio(1, 3)), BigInt::from(0));
    }
}
