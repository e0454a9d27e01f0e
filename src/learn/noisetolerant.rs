//! Noise-tolerant Bayesian parameter learning.
//!
//! Each template is fit by ordinary least squares over the example values of
//! its anchors; candidate parameters are enumerated from the confidence
//! interval (Farey rationals for multipliers, integers for offsets) and
//! scored by a simplicity prior times a Gaussian likelihood.

use num_traits::Zero;
use tracing::{debug, warn};

use crate::learn::math::{chi_square_sf, ext_farey, sb_depth, student_t_quantile, z_ball};
use crate::learn::LearningConfig;
use crate::model::{
    rat, rat_from_f64, rat_to_f64, Constraint, ConstraintCandidate, ConstraintKind, Op, Rat,
    ViewTree, PRIORITY_WEAK,
};

/// Learner that tolerates measurement noise in the examples.
pub struct NoiseTolerantLearner<'a> {
    examples: &'a [ViewTree],
    config: &'a LearningConfig,
    farey_pool: Vec<Rat>,
}

/// A fitted template: point estimates, residual spread, residual degrees of
/// freedom, and `(estimate, standard error)` pairs for whichever parameters
/// are free. [`NoiseTolerantLearner::widen_intervals`] turns the pairs into
/// `(lo, hi)` confidence intervals.
struct Fit {
    a_hat: f64,
    b_hat: f64,
    sigma: f64,
    df: f64,
    a_ci: Option<(f64, f64)>,
    b_ci: Option<(f64, f64)>,
    fit_p: f64,
}

impl<'a> NoiseTolerantLearner<'a> {
    pub fn new(examples: &'a [ViewTree], config: &'a LearningConfig) -> Self {
        let mut farey_pool = ext_farey(config.max_denominator);
        // Mirror the pool so negative multipliers stay representable.
        let negatives: Vec<Rat> = farey_pool
            .iter()
            .filter(|v| !v.is_zero())
            .map(|v| -v.clone())
            .collect();
        farey_pool.extend(negatives);
        Self {
            examples,
            config,
            farey_pool,
        }
    }

    /// Learn one template. Returns an empty list when the template is
    /// rejected.
    pub fn learn_template(&self, template: &Constraint) -> Vec<ConstraintCandidate> {
        let Some(samples) = self.extract_samples(template) else {
            warn!(template = %template, "missing anchor values, rejecting template");
            return Vec::new();
        };
        let samples = complete_samples(samples, template.kind);

        let Some(fit) = regress(&samples, template.kind) else {
            warn!(template = %template, "ill-conditioned regression, rejecting template");
            return Vec::new();
        };

        if fit.fit_p < self.config.cutoff_fit {
            debug!(template = %template, p = fit.fit_p, "goodness-of-fit rejection");
            return Vec::new();
        }
        if fit.sigma > self.config.cutoff_spread {
            debug!(template = %template, sigma = fit.sigma, "residual spread rejection");
            return Vec::new();
        }

        let fit = self.widen_intervals(fit);
        let sample_count = self.examples.len();
        let mut candidates = self.enumerate(template, &samples, &fit, sample_count);

        if candidates.is_empty() && template.kind == ConstraintKind::SizeConstant {
            candidates = self.bound_fallback(template, &fit, sample_count);
        }

        normalize_scores(&mut candidates);
        candidates.sort_by(|l, r| r.score.partial_cmp(&l.score).unwrap_or(std::cmp::Ordering::Equal));
        if let Some(k) = self.config.top_k {
            candidates.truncate(k);
        }
        candidates
    }

    /// One `(x, y)` pair per example; `x` is absent for constant forms.
    fn extract_samples(&self, template: &Constraint) -> Option<Vec<(Option<f64>, f64)>> {
        self.examples
            .iter()
            .map(|tree| {
                let y = tree.find_anchor(&template.y_id)?.value;
                let x = match &template.x_id {
                    Some(x_id) => Some(rat_to_f64(&tree.find_anchor(x_id)?.value)),
                    None => None,
                };
                Some((x, rat_to_f64(&y)))
            })
            .collect()
    }

    /// Scale the raw standard errors into (1−α) confidence intervals.
    fn widen_intervals(&self, mut fit: Fit) -> Fit {
        if let Some((_, se)) = fit.a_ci {
            let t = student_t_quantile(1.0 - self.config.a_alpha / 2.0, fit.df);
            fit.a_ci = Some((fit.a_hat - t * se, fit.a_hat + t * se));
        }
        if let Some((_, se)) = fit.b_ci {
            let t = student_t_quantile(1.0 - self.config.b_alpha / 2.0, fit.df);
            fit.b_ci = Some((fit.b_hat - t * se, fit.b_hat + t * se));
        }
        fit
    }

    fn enumerate(
        &self,
        template: &Constraint,
        samples: &[(Option<f64>, f64)],
        fit: &Fit,
        sample_count: usize,
    ) -> Vec<ConstraintCandidate> {
        let kind = template.kind;
        let sigma = fit.sigma.max(1.0e-9);
        let mut out = Vec::new();

        let a_values: Vec<Option<Rat>> = if kind.is_mul_only_form() || kind.is_general_form() {
            let Some((lo, hi)) = fit.a_ci else {
                return Vec::new();
            };
            if !lo.is_finite() || !hi.is_finite() {
                return Vec::new();
            }
            let max_den = self.config.max_denominator as f64;
            if hi < -max_den || lo > max_den {
                return Vec::new();
            }
            self.farey_pool
                .iter()
                .filter(|v| {
                    let v = rat_to_f64(v);
                    lo <= v && v <= hi
                })
                .map(|v| Some(v.clone()))
                .collect()
        } else {
            vec![None]
        };

        let b_values: Vec<Option<Rat>> = if kind.is_constant_form()
            || kind.is_add_only_form()
            || kind.is_general_form()
        {
            let Some((lo, hi)) = fit.b_ci else {
                return Vec::new();
            };
            if !lo.is_finite() || !hi.is_finite() {
                return Vec::new();
            }
            let radius = (hi - lo) / 2.0;
            if radius > self.config.max_offset as f64 * 2.0 {
                debug!(template = %template, "offset interval too wide, rejecting");
                return Vec::new();
            }
            z_ball((lo + hi) / 2.0, radius)
                .into_iter()
                .filter(|b| b.unsigned_abs() <= self.config.max_offset as u64)
                .map(|b| Some(rat(b)))
                .collect()
        } else {
            vec![None]
        };

        for a in &a_values {
            for b in &b_values {
                let a_f = a.as_ref().map(rat_to_f64).unwrap_or(fit.a_hat);
                let b_f = b.as_ref().map(rat_to_f64).unwrap_or(fit.b_hat);
                let mse = mean_squared_error(samples, kind, a_f, b_f);
                let likelihood = (-mse / (2.0 * sigma * sigma)).exp();
                let prior = a
                    .as_ref()
                    .map(|a| self.depth_prior(a))
                    .unwrap_or(1.0);
                let constraint = template.subst(a.clone(), b.clone(), sample_count);
                out.push(ConstraintCandidate::new(constraint, prior * likelihood));
            }
        }
        out
    }

    /// Prior preferring arithmetically simple rationals.
    fn depth_prior(&self, value: &Rat) -> f64 {
        let depth = sb_depth(value) as f64;
        (-(depth - self.config.expected_depth as f64).abs()).exp()
    }

    /// When no integer falls inside the interval, fall back to weak
    /// inequality bounds at the one-sided interval edges.
    fn bound_fallback(
        &self,
        template: &Constraint,
        fit: &Fit,
        sample_count: usize,
    ) -> Vec<ConstraintCandidate> {
        let Some((lo, hi)) = fit.b_ci else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let bound = Constraint::template(
            ConstraintKind::SizeConstantBound,
            template.y_id.clone(),
            None,
        );
        for (edge, op) in [(lo.floor(), Op::Ge), (hi.ceil(), Op::Le)] {
            if edge.abs() > self.config.max_offset as f64 {
                continue;
            }
            let Some(b) = rat_from_f64(edge) else {
                continue;
            };
            let candidate = bound
                .subst(None, Some(b), sample_count)
                .with_op(op)
                .with_priority(PRIORITY_WEAK);
            out.push(ConstraintCandidate::new(candidate, 1.0));
        }
        out
    }
}

/// If only one example is available, synthesize a second point consistent
/// with the constraint form, then add a tiny deterministic jitter so the
/// regression never sees exactly zero variance.
fn complete_samples(
    mut samples: Vec<(Option<f64>, f64)>,
    kind: ConstraintKind,
) -> Vec<(Option<f64>, f64)> {
    if samples.len() == 1 {
        let (x1, y1) = samples[0];
        let synthetic = match (kind.is_add_only_form(), kind.is_mul_only_form(), x1) {
            (true, _, Some(x1)) => (Some(0.0), y1 - x1),
            (_, true, Some(_)) => (Some(0.0), 0.0),
            _ => (x1.map(|_| 0.0), y1),
        };
        samples.push(synthetic);
    }
    for (i, (x, y)) in samples.iter_mut().enumerate() {
        let eps = jitter(i) * y.abs().max(1.0);
        *y += eps;
        if let Some(x) = x {
            *x += jitter(i + 17) * x.abs().max(1.0);
        }
    }
    samples
}

/// Deterministic sub-1e-6 perturbation; a seeded hash keeps runs
/// reproducible.
fn jitter(i: usize) -> f64 {
    let h = (i as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15).rotate_left(31);
    ((h % 2_000_000) as f64 / 1_000_000.0 - 1.0) * 1.0e-6
}

/// Ordinary least squares for the template's form. Returns `None` when the
/// system is numerically ill-conditioned (the `LearnerFailure` class).
fn regress(samples: &[(Option<f64>, f64)], kind: ConstraintKind) -> Option<Fit> {
    let n = samples.len();
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let df = (n - 1).max(1) as f64;

    if kind.is_constant_form() || kind.is_add_only_form() {
        // Estimate a mean: of y for constant forms, of y − x for offsets.
        let d: Vec<f64> = samples
            .iter()
            .map(|(x, y)| match (kind.is_add_only_form(), x) {
                (true, Some(x)) => y - x,
                _ => *y,
            })
            .collect();
        let mean = d.iter().sum::<f64>() / nf;
        let ss: f64 = d.iter().map(|v| (v - mean) * (v - mean)).sum();
        let sigma = (ss / df).sqrt();
        if !sigma.is_finite() {
            return None;
        }
        let se = sigma / nf.sqrt();
        return Some(Fit {
            a_hat: if kind.is_constant_form() { 0.0 } else { 1.0 },
            b_hat: mean,
            sigma,
            df,
            a_ci: None,
            b_ci: Some((mean, se)),
            fit_p: spread_p(ss, df),
        });
    }

    let xs: Vec<f64> = samples.iter().map(|(x, _)| x.unwrap_or(0.0)).collect();
    let ys: Vec<f64> = samples.iter().map(|(_, y)| *y).collect();

    if kind.is_mul_only_form() {
        // Line through the origin.
        let sxx: f64 = xs.iter().map(|x| x * x).sum();
        if sxx <= f64::EPSILON {
            return None;
        }
        let sxy: f64 = xs.iter().zip(&ys).map(|(x, y)| x * y).sum();
        let a_hat = sxy / sxx;
        let ss: f64 = xs
            .iter()
            .zip(&ys)
            .map(|(x, y)| {
                let e = y - a_hat * x;
                e * e
            })
            .sum();
        let sigma = (ss / df).sqrt();
        if !sigma.is_finite() || !a_hat.is_finite() {
            return None;
        }
        let se = sigma / sxx.sqrt();
        return Some(Fit {
            a_hat,
            b_hat: 0.0,
            sigma,
            df,
            a_ci: Some((a_hat, se)),
            b_ci: None,
            fit_p: spread_p(ss, df),
        });
    }

    // General form: joint slope and intercept.
    let x_bar = xs.iter().sum::<f64>() / nf;
    let y_bar = ys.iter().sum::<f64>() / nf;
    let sxx: f64 = xs.iter().map(|x| (x - x_bar) * (x - x_bar)).sum();
    if sxx <= f64::EPSILON {
        return None;
    }
    let sxy: f64 = xs
        .iter()
        .zip(&ys)
        .map(|(x, y)| (x - x_bar) * (y - y_bar))
        .sum();
    let a_hat = sxy / sxx;
    let b_hat = y_bar - a_hat * x_bar;
    let ss: f64 = xs
        .iter()
        .zip(&ys)
        .map(|(x, y)| {
            let e = y - (a_hat * x + b_hat);
            e * e
        })
        .sum();
    let df2 = (n.saturating_sub(2)).max(1) as f64;
    let sigma = (ss / df2).sqrt();
    if !sigma.is_finite() || !a_hat.is_finite() || !b_hat.is_finite() {
        return None;
    }
    let a_se = sigma / sxx.sqrt();
    let b_se = sigma * (1.0 / nf + x_bar * x_bar / sxx).sqrt();
    Some(Fit {
        a_hat,
        b_hat,
        sigma,
        df: df2,
        a_ci: Some((a_hat, a_se)),
        b_ci: Some((b_hat, b_se)),
        fit_p: spread_p(ss, df2),
    })
}

/// Lack-of-fit tail at unit noise scale: the probability of seeing this much
/// residual spread if the model held with pixel-level noise.
fn spread_p(ss: f64, df: f64) -> f64 {
    chi_square_sf(ss, df)
}

fn mean_squared_error(
    samples: &[(Option<f64>, f64)],
    kind: ConstraintKind,
    a: f64,
    b: f64,
) -> f64 {
    let n = samples.len() as f64;
    samples
        .iter()
        .map(|(x, y)| {
            let predicted = match (kind.is_constant_form(), x) {
                (true, _) | (false, None) => b,
                (false, Some(x)) => {
                    if kind.is_add_only_form() {
                        x + b
                    } else if kind.is_mul_only_form() {
                        a * x
                    } else {
                        a * x + b
                    }
                }
            };
            let e = y - predicted;
            e * e
        })
        .sum::<f64>()
        / n
}

/// Scale scores so the best candidate of the template scores exactly 1.
fn normalize_scores(candidates: &mut [ConstraintCandidate]) {
    let max = candidates
        .iter()
        .map(|c| c.score)
        .fold(0.0_f64, f64::max);
    if max > 0.0 {
        for c in candidates.iter_mut() {
            c.score /= max;
        }
    } else if !candidates.is_empty() {
        for c in candidates.iter_mut() {
            c.score = 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnchorId, Attribute, Rect, ViewBuilder};

    fn trees(rects: &[(i64, i64, i64, i64)]) -> Vec<ViewTree> {
        rects
            .iter()
            .map(|&(l, t, r, b)| {
                ViewBuilder::new("root", Rect::from_ints(0, 0, 1000, 1000))
                    .with_child(ViewBuilder::new("child", Rect::from_ints(l, t, r, b)))
                    .build()
                    .unwrap()
            })
            .collect()
    }

    fn child_anchor(attr: Attribute) -> AnchorId {
        AnchorId::new("child", attr)
    }

    #[test]
    fn test_constant_height_learned() {
        let examples = trees(&[(0, 0, 800, 80), (0, 0, 1200, 80)]);
        let config = LearningConfig::default();
        let learner = NoiseTolerantLearner::new(&examples, &config);
        let template = Constraint::template(
            ConstraintKind::SizeConstant,
            child_anchor(Attribute::Height),
            None,
        );
        let candidates = learner.learn_template(&template);
        assert!(!candidates.is_empty());
        assert_eq!(candidates[0].constraint.b, rat(80));
        assert_eq!(candidates[0].score, 1.0);
        assert_eq!(candidates[0].constraint.sample_count, 2);
    }

    #[test]
    fn test_scores_bounded_and_argmax_is_one() {
        let examples = trees(&[(0, 0, 800, 80), (0, 0, 1200, 80)]);
        let config = LearningConfig::default();
        let learner = NoiseTolerantLearner::new(&examples, &config);
        let template = Constraint::template(
            ConstraintKind::SizeConstant,
            child_anchor(Attribute::Height),
            None,
        );
        let candidates = learner.learn_template(&template);
        assert!(candidates.iter().all(|c| (0.0..=1.0).contains(&c.score)));
        assert!(candidates.iter().any(|c| c.score == 1.0));
    }

    #[test]
    fn test_ratio_prefers_simple_rational() {
        // Width tracks the root width at very nearly one half; the simple
        // rational must win over close complicated ones.
        let mut examples = Vec::new();
        for (rw, cw) in [(800, 401), (1000, 501), (1200, 601)] {
            examples.push(
                ViewBuilder::new("root", Rect::from_ints(0, 0, rw, 600))
                    .with_child(ViewBuilder::new("child", Rect::from_ints(0, 0, cw, 100)))
                    .build()
                    .unwrap(),
            );
        }
        let config = LearningConfig::default();
        let learner = NoiseTolerantLearner::new(&examples, &config);
        let template = Constraint::template(
            ConstraintKind::SizeRatio,
            child_anchor(Attribute::Width),
            Some(AnchorId::new("root", Attribute::Width)),
        );
        let candidates = learner.learn_template(&template);
        assert!(!candidates.is_empty());
        assert_eq!(candidates[0].constraint.a, crate::model::ratio(1, 2));
    }

    #[test]
    fn test_offset_learned_from_single_example() {
        let examples = trees(&[(0, 100, 800, 200)]);
        let config = LearningConfig::default();
        let learner = NoiseTolerantLearner::new(&examples, &config);
        let template = Constraint::template(
            ConstraintKind::PosLtrbOffset,
            child_anchor(Attribute::Top),
            Some(AnchorId::new("root", Attribute::Top)),
        );
        let candidates = learner.learn_template(&template);
        assert!(!candidates.is_empty());
        assert_eq!(candidates[0].constraint.b, rat(100));
        assert_eq!(candidates[0].constraint.sample_count, 1);
    }

    #[test]
    fn test_inconsistent_offset_rejected() {
        // The child top moves arbitrarily relative to the root: no constant
        // offset explains it.
        let examples = trees(&[(0, 0, 100, 50), (0, 310, 100, 360), (0, 77, 100, 127)]);
        let config = LearningConfig::default();
        let learner = NoiseTolerantLearner::new(&examples, &config);
        let template = Constraint::template(
            ConstraintKind::PosLtrbOffset,
            child_anchor(Attribute::Top),
            Some(AnchorId::new("root", Attribute::Top)),
        );
        assert!(learner.learn_template(&template).is_empty());
    }

    #[test]
    fn test_zero_variance_x_is_soaked() {
        // Constant x with a varying y cannot support a ratio.
        let mut examples = Vec::new();
        for cw in [100, 200, 300] {
            examples.push(
                ViewBuilder::new("root", Rect::from_ints(0, 0, 0, 600))
                    .with_child(ViewBuilder::new("child", Rect::from_ints(0, 0, cw, 100)))
                    .build()
                    .unwrap(),
            );
        }
        let config = LearningConfig::default();
        let learner = NoiseTolerantLearner::new(&examples, &config);
        let template = Constraint::template(
            ConstraintKind::SizeRatio,
            child_anchor(Attribute::Width),
            Some(AnchorId::new("root", Attribute::Width)),
        );
        assert!(learner.learn_template(&template).is_empty());
    }
}
