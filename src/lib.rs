//! Constraint-based layout inference.
//!
//! Given hierarchical layout examples measured at different screen sizes,
//! the pipeline synthesizes arithmetic constraints over view anchors
//! (`y = a·x + b`) that reproduce the examples and generalize to unseen
//! sizes: a sweep-line visibility engine feeds a template instantiator,
//! a Bayesian learner fits parameters per sketch, and a hierarchical MaxSMT
//! pruner selects a consistent, deterministic subset.
//!
//! # Example
//!
//! ```rust
//! use layout_inference::{synthesize, SynthesisConfig};
//!
//! let input = r#"{ "examples": [
//!     { "name": "root", "rect": [0, 0, 800, 600],
//!       "children": [ { "name": "header", "rect": [0, 0, 800, 80] } ] },
//!     { "name": "root", "rect": [0, 0, 1200, 800],
//!       "children": [ { "name": "header", "rect": [0, 0, 1200, 80] } ] }
//! ]}"#;
//!
//! let result = synthesize(input, &SynthesisConfig::default()).unwrap();
//! assert!(result.constraints.iter().any(|c| c.y == "header.height"));
//! ```

pub mod config;
pub mod eval;
pub mod instantiate;
pub mod learn;
pub mod loader;
pub mod model;
pub mod prune;
pub mod smt;
pub mod visibility;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::instantiate::Instantiator;
use crate::learn::learn_all;
use crate::loader::{load_examples, LoadError};
use crate::model::{ConstraintRecord, ViewTree};
use crate::smt::BuiltinMaxSmt;

pub use crate::config::{DebugDumps, InstantiationMethod, SynthesisConfig};
pub use crate::learn::{LearningConfig, LearningMethod};
pub use crate::loader::{InputFormat, NumericDomain};
pub use crate::prune::{PruningConfig, PruningMethod, SizeBounds};

/// Cooperative cancellation token, checked between worklist iterations and
/// between learner jobs.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The synthesized constraint document: constraint records plus a
/// currently-empty axiom list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub constraints: Vec<ConstraintRecord>,
    pub axioms: Vec<String>,
}

/// Errors that surface from a synthesis run. Everything else is soaked
/// per-subproblem so synthesis degrades gracefully.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// Malformed or inconsistent input.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] LoadError),

    /// The global deadline elapsed. Carries the partial accumulation.
    #[error("synthesis deadline elapsed")]
    Timeout { partial: SynthesisResult },
}

/// Synthesize constraints from a JSON example document.
pub fn synthesize(
    source: &str,
    config: &SynthesisConfig,
) -> Result<SynthesisResult, SynthesisError> {
    let mut examples = load_examples(source, config.input_format, config.numeric_domain)?;
    if let Some(n) = config.num_examples {
        examples.truncate(n.max(1));
    }
    synthesize_examples(&examples, config, &CancelToken::new())
}

/// Synthesize constraints from already-loaded example trees.
pub fn synthesize_examples(
    examples: &[ViewTree],
    config: &SynthesisConfig,
    cancel: &CancelToken,
) -> Result<SynthesisResult, SynthesisError> {
    if examples.is_empty() {
        return Err(SynthesisError::InvalidInput(LoadError::NoExamples));
    }
    let deadline = config.timeout.map(|t| Instant::now() + t);
    let out_of_time = || deadline.is_some_and(|d| Instant::now() >= d);

    info!(
        examples = examples.len(),
        views = examples.first().map(|e| e.len()).unwrap_or(0),
        "starting synthesis"
    );

    // Local inference: sketches over visible anchor pairs.
    let instantiator = Instantiator::new(examples);
    if config.debug.after_visibility {
        let pairs: Vec<[String; 2]> = instantiator
            .visibility()
            .sorted_pairs()
            .into_iter()
            .map(|(a, b)| [a.to_string(), b.to_string()])
            .collect();
        eprintln!("{}", serde_json::to_string(&pairs).unwrap_or_default());
    }
    let templates = instantiator.instantiate();
    if config.debug.after_instantiation {
        let records: Vec<ConstraintRecord> =
            templates.iter().map(ConstraintRecord::from).collect();
        eprintln!("{}", serde_json::to_string(&records).unwrap_or_default());
    }
    if out_of_time() {
        return Err(SynthesisError::Timeout {
            partial: SynthesisResult::default(),
        });
    }

    // Parameter learning.
    let candidate_lists = learn_all(
        config.learning_method,
        examples,
        &templates,
        &config.learning,
        cancel,
    );
    let candidates: Vec<_> = candidate_lists.into_iter().flatten().collect();
    info!(candidates = candidates.len(), "learning complete");
    if config.debug.after_learning {
        let records: Vec<ConstraintRecord> = candidates
            .iter()
            .map(|c| ConstraintRecord::from(&c.constraint))
            .collect();
        eprintln!("{}", serde_json::to_string(&records).unwrap_or_default());
    }
    if out_of_time() {
        return Err(SynthesisError::Timeout {
            partial: SynthesisResult::default(),
        });
    }

    // Global inference.
    let selected = prune::prune::<BuiltinMaxSmt>(
        &config.pruning,
        examples,
        &candidates,
        deadline,
        cancel,
    );
    info!(selected = selected.len(), "pruning complete");

    let result = SynthesisResult {
        constraints: selected.iter().map(ConstraintRecord::from).collect(),
        axioms: Vec::new(),
    };
    if out_of_time() {
        return Err(SynthesisError::Timeout { partial: result });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER_DOC: &str = r#"{ "examples": [
        { "name": "root", "rect": [0, 0, 800, 600],
          "children": [ { "name": "header", "rect": [0, 0, 800, 80] } ] },
        { "name": "root", "rect": [0, 0, 1200, 800],
          "children": [ { "name": "header", "rect": [0, 0, 1200, 80] } ] }
    ]}"#;

    #[test]
    fn test_end_to_end_header() {
        let result = synthesize(HEADER_DOC, &SynthesisConfig::default()).unwrap();
        let ys: Vec<&str> = result.constraints.iter().map(|c| c.y.as_str()).collect();
        assert!(ys.contains(&"header.height"), "constraints: {:?}", ys);
        assert!(result.axioms.is_empty());
    }

    #[test]
    fn test_invalid_json_is_invalid_input() {
        let err = synthesize("{ not json", &SynthesisConfig::default()).unwrap_err();
        assert!(matches!(err, SynthesisError::InvalidInput(_)));
    }

    #[test]
    fn test_zero_timeout_reports_deadline() {
        let config = SynthesisConfig::default().with_timeout(std::time::Duration::ZERO);
        let err = synthesize(HEADER_DOC, &config).unwrap_err();
        assert!(matches!(err, SynthesisError::Timeout { .. }));
    }

    #[test]
    fn test_pruning_none_passes_candidates_through() {
        let config = SynthesisConfig::default().with_pruning_method(PruningMethod::None);
        let unpruned = synthesize(HEADER_DOC, &config).unwrap();
        let pruned = synthesize(HEADER_DOC, &SynthesisConfig::default()).unwrap();
        assert!(unpruned.constraints.len() >= pruned.constraints.len());
    }
}
