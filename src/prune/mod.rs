//! Global inference: select a consistent, deterministic, maximally-scoring
//! subset of learned candidates.

pub mod baseline;
pub mod conformance;
pub mod encoding;
pub mod hierarchical;

use std::time::Instant;

use crate::model::{Constraint, ConstraintCandidate, ViewTree};
use crate::smt::MaxSmtBackend;
use crate::CancelToken;

pub use baseline::BaselinePruner;
pub use conformance::{conformance_range, Conformance, SizeBounds};
pub use hierarchical::HierarchicalPruner;

/// Which pruner to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PruningMethod {
    /// Pass every candidate through unpruned.
    None,
    /// One monolithic MaxSMT query over the whole tree.
    Baseline,
    /// One MaxSMT subproblem per internal view.
    #[default]
    Hierarchical,
}

/// Pruning configuration: method plus the test screen-size window.
#[derive(Debug, Clone, Default)]
pub struct PruningConfig {
    pub method: PruningMethod,
    pub bounds: SizeBounds,
}

impl PruningConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: PruningMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_bounds(mut self, bounds: SizeBounds) -> Self {
        self.bounds = bounds;
        self
    }
}

/// Run the configured pruner over the candidate pool.
pub fn prune<B: MaxSmtBackend + Default>(
    config: &PruningConfig,
    examples: &[ViewTree],
    candidates: &[ConstraintCandidate],
    deadline: Option<Instant>,
    cancel: &CancelToken,
) -> Vec<Constraint> {
    match config.method {
        PruningMethod::None => {
            let mut out: Vec<Constraint> = candidates
                .iter()
                .map(|c| c.constraint.clone())
                .collect();
            out.sort_by_key(|c| c.to_string());
            out.dedup();
            out
        }
        PruningMethod::Baseline => {
            let pruner: BaselinePruner<'_, B> =
                BaselinePruner::new(examples, &config.bounds, deadline);
            let mut out = pruner.select(candidates);
            out.sort_by_key(|c| c.to_string());
            out
        }
        PruningMethod::Hierarchical => {
            let pruner: HierarchicalPruner<'_, B> =
                HierarchicalPruner::new(examples, &config.bounds, deadline, cancel);
            pruner.select(candidates)
        }
    }
}
