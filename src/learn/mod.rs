//! Parameter learning: turn constraint sketches into scored candidates.
//!
//! Three learners share one interface: the simple learner demands exact
//! agreement across examples, the heuristic learner adds plausibility
//! scoring, and the noise-tolerant learner fits parameters statistically.
//! Per-template learning is independent, so the fan-out may run on a small
//! worker pool; results are re-sorted by template index to keep the output
//! deterministic.

pub mod math;
pub mod noisetolerant;
pub mod simple;

use tracing::debug;

use crate::model::{Constraint, ConstraintCandidate, ViewTree};
use crate::CancelToken;

pub use noisetolerant::NoiseTolerantLearner;
pub use simple::{HeuristicLearner, SimpleLearner};

/// Which learner to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LearningMethod {
    Simple,
    Heuristic,
    #[default]
    NoiseTolerant,
}

/// Tunables shared by the learners.
#[derive(Debug, Clone)]
pub struct LearningConfig {
    /// Significance level of the multiplier confidence interval.
    pub a_alpha: f64,
    /// Significance level of the offset confidence interval.
    pub b_alpha: f64,
    /// Templates whose lack-of-fit tail falls below this are rejected.
    pub cutoff_fit: f64,
    /// Templates whose residual spread exceeds this are rejected.
    pub cutoff_spread: f64,
    /// Largest representable offset magnitude.
    pub max_offset: i64,
    /// Farey order bounding multiplier denominators.
    pub max_denominator: u32,
    /// Center of the Stern–Brocot depth prior.
    pub expected_depth: u32,
    /// Keep only the best k candidates per template; `None` keeps all.
    pub top_k: Option<usize>,
    /// Number of learner worker threads. 1 disables the fan-out.
    pub workers: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            a_alpha: 0.005,
            b_alpha: 0.005,
            cutoff_fit: 0.05,
            cutoff_spread: 3.0,
            max_offset: 1000,
            max_denominator: 100,
            expected_depth: 5,
            top_k: None,
            workers: 1,
        }
    }
}

impl LearningConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_offset(mut self, max_offset: i64) -> Self {
        self.max_offset = max_offset;
        self
    }

    pub fn with_max_denominator(mut self, max_denominator: u32) -> Self {
        self.max_denominator = max_denominator;
        self
    }

    pub fn with_expected_depth(mut self, expected_depth: u32) -> Self {
        self.expected_depth = expected_depth;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

/// Learn every template, returning one candidate list per template, aligned
/// with the input order. Cancellation is honored between templates; already
/// learned prefixes are returned as-is.
pub fn learn_all(
    method: LearningMethod,
    examples: &[ViewTree],
    templates: &[Constraint],
    config: &LearningConfig,
    cancel: &CancelToken,
) -> Vec<Vec<ConstraintCandidate>> {
    debug!(templates = templates.len(), ?method, "learning templates");
    if config.workers <= 1 || templates.len() < 2 {
        let learn = make_learner(method, examples, config);
        return templates
            .iter()
            .map(|t| {
                if cancel.is_cancelled() {
                    Vec::new()
                } else {
                    learn(t)
                }
            })
            .collect();
    }

    // Worker-pool fan-out over chunks; each worker carries a chunk index so
    // the joined results can be restored to template order.
    let chunk_size = templates.len().div_ceil(config.workers);
    let mut results: Vec<(usize, Vec<Vec<ConstraintCandidate>>)> = std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for (chunk_idx, chunk) in templates.chunks(chunk_size).enumerate() {
            let cancel = cancel.clone();
            handles.push(scope.spawn(move || {
                let learn = make_learner(method, examples, config);
                let learned = chunk
                    .iter()
                    .map(|t| {
                        if cancel.is_cancelled() {
                            Vec::new()
                        } else {
                            learn(t)
                        }
                    })
                    .collect::<Vec<_>>();
                (chunk_idx, learned)
            }));
        }
        handles
            .into_iter()
            .map(|h| h.join().expect("learner worker panicked"))
            .collect()
    });
    results.sort_by_key(|(idx, _)| *idx);
    results.into_iter().flat_map(|(_, lists)| lists).collect()
}

type LearnFn<'a> = Box<dyn Fn(&Constraint) -> Vec<ConstraintCandidate> + 'a>;

fn make_learner<'a>(
    method: LearningMethod,
    examples: &'a [ViewTree],
    config: &'a LearningConfig,
) -> LearnFn<'a> {
    match method {
        LearningMethod::Simple => {
            let learner = SimpleLearner::new(examples);
            Box::new(move |t| learner.learn_template(t))
        }
        LearningMethod::Heuristic => {
            let learner = HeuristicLearner::new(examples, config);
            Box::new(move |t| learner.learn_template(t))
        }
        LearningMethod::NoiseTolerant => {
            let learner = NoiseTolerantLearner::new(examples, config);
            Box::new(move |t| learner.learn_template(t))
        }
    }
}
