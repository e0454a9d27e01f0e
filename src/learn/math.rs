//! Rational and statistical helpers for parameter learning.
//!
//! The rational side (continued fractions, Stern–Brocot depth, Farey
//! sequences, integer balls) drives candidate enumeration; the statistical
//! side (t quantiles, chi-square tails) drives confidence intervals and the
//! goodness-of-fit test.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::model::{rat, ratio, Rat};

/// Continued-fraction terms of a non-negative rational `p/q`.
pub fn continued_fraction(value: &Rat) -> Vec<BigInt> {
    let mut n1 = value.numer().abs();
    let mut n2 = value.denom().clone();
    let mut terms = Vec::new();
    while !n2.is_zero() {
        let term = &n1 / &n2;
        let rem = &n1 % &n2;
        terms.push(term);
        n1 = n2;
        n2 = rem;
    }
    terms
}

/// Stern–Brocot depth: the sum of the continued-fraction terms of the
/// canonicalized rational. `1/2` has depth 2; `47/83` is much deeper.
pub fn sb_depth(value: &Rat) -> u64 {
    continued_fraction(value)
        .into_iter()
        .map(|t| t.to_u64().unwrap_or(u64::MAX / 64))
        .fold(0u64, |acc, t| acc.saturating_add(t))
}

/// The Farey sequence of order `n`: all reduced rationals in `[0, 1]` with
/// denominator at most `n`, ascending.
pub fn farey(n: u32) -> Vec<Rat> {
    let mut values = std::collections::BTreeSet::new();
    values.insert(rat(0));
    for den in 1..=n as i64 {
        for num in 1..=den {
            values.insert(ratio(num, den));
        }
    }
    values.into_iter().collect()
}

/// The Farey sequence extended with the reciprocals of its interior members,
/// covering `[0, n]`.
pub fn ext_farey(n: u32) -> Vec<Rat> {
    let base = farey(n);
    let mut out = base.clone();
    for value in base.iter().rev() {
        if value.is_zero() || *value == rat(1) {
            continue;
        }
        out.push(value.recip());
    }
    out
}

/// All integers within `radius` of `center`.
pub fn z_ball(center: f64, radius: f64) -> Vec<i64> {
    if !center.is_finite() || !radius.is_finite() || radius < 0.0 {
        return Vec::new();
    }
    let lo = (center - radius).ceil() as i64;
    let hi = (center + radius).floor() as i64;
    (lo..=hi).collect()
}

// ---------------------------------------------------------------------------
// Distribution tails. Local implementations: the corpus carries no statistics
// crate, and only these two tails are needed.
// ---------------------------------------------------------------------------

/// Natural log of the gamma function (Lanczos approximation).
fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 6] = [
        76.180_091_729_471_46,
        -86.505_320_329_416_77,
        24.014_098_240_830_91,
        -1.231_739_572_450_155,
        0.120_865_097_386_617_7e-2,
        -0.539_523_938_495_3e-5,
    ];
    let mut y = x;
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut ser = 1.000_000_000_190_015;
    for c in COEFFS {
        y += 1.0;
        ser += c / y;
    }
    -tmp + (2.506_628_274_631_000_5 * ser / x).ln()
}

/// Regularized incomplete beta function `I_x(a, b)` via the Lentz continued
/// fraction.
fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_cf(a, b, x) / a
    } else {
        1.0 - front * beta_cf(b, a, 1.0 - x) / b
    }
}

fn beta_cf(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 200;
    const EPS: f64 = 3.0e-12;
    const FPMIN: f64 = 1.0e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < FPMIN {
        d = FPMIN;
    }
    d = 1.0 / d;
    let mut h = d;
    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;
        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        h *= d * c;
        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Regularized upper incomplete gamma `Q(a, x)`.
fn incomplete_gamma_q(a: f64, x: f64) -> f64 {
    if x < 0.0 || a <= 0.0 {
        return f64::NAN;
    }
    if x == 0.0 {
        return 1.0;
    }
    if x < a + 1.0 {
        // Series for P(a, x), then complement.
        let mut ap = a;
        let mut sum = 1.0 / a;
        let mut del = sum;
        for _ in 0..200 {
            ap += 1.0;
            del *= x / ap;
            sum += del;
            if del.abs() < sum.abs() * 3.0e-12 {
                break;
            }
        }
        1.0 - sum * (-x + a * x.ln() - ln_gamma(a)).exp()
    } else {
        // Lentz continued fraction for Q(a, x).
        let mut b = x + 1.0 - a;
        let mut c = 1.0 / 1.0e-300;
        let mut d = 1.0 / b;
        let mut h = d;
        for i in 1..200 {
            let an = -(i as f64) * (i as f64 - a);
            b += 2.0;
            d = an * d + b;
            if d.abs() < 1.0e-300 {
                d = 1.0e-300;
            }
            c = b + an / c;
            if c.abs() < 1.0e-300 {
                c = 1.0e-300;
            }
            d = 1.0 / d;
            let del = d * c;
            h *= del;
            if (del - 1.0).abs() < 3.0e-12 {
                break;
            }
        }
        (-x + a * x.ln() - ln_gamma(a)).exp() * h
    }
}

/// CDF of Student's t distribution with `df` degrees of freedom.
pub fn student_t_cdf(t: f64, df: f64) -> f64 {
    let x = df / (df + t * t);
    let tail = 0.5 * incomplete_beta(df / 2.0, 0.5, x);
    if t >= 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

/// Quantile of Student's t distribution, by bisection on the CDF.
pub fn student_t_quantile(p: f64, df: f64) -> f64 {
    assert!((0.0..1.0).contains(&p) && p > 0.0);
    let (mut lo, mut hi) = (-1.0e6, 1.0e6);
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if student_t_cdf(mid, df) < p {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1.0e-10 * (1.0 + mid.abs()) {
            break;
        }
    }
    0.5 * (lo + hi)
}

/// Survival function of the chi-square distribution: `P(X ≥ x)` with `df`
/// degrees of freedom. Used as the lack-of-fit tail: small values mean the
/// residual spread is implausibly large for the model.
pub fn chi_square_sf(x: f64, df: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    incomplete_gamma_q(df / 2.0, x / 2.0)
}
