//! Configuration for the complete synthesis pipeline.

use std::time::Duration;

use crate::loader::{InputFormat, NumericDomain};
use crate::learn::{LearningConfig, LearningMethod};
use crate::prune::{PruningConfig, PruningMethod, SizeBounds};

/// How sketches are generated. The sweep-line instantiator is the only
/// implementation; the interface point is kept so an alternative engine can
/// be bound here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstantiationMethod {
    #[default]
    Sweep,
}

/// Debug emission toggles: dump intermediate pipeline stages to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugDumps {
    pub after_visibility: bool,
    pub after_instantiation: bool,
    pub after_learning: bool,
}

/// Configuration for one synthesis run.
#[derive(Debug, Clone, Default)]
pub struct SynthesisConfig {
    pub input_format: InputFormat,
    pub numeric_domain: NumericDomain,
    pub instantiation: InstantiationMethod,
    pub learning_method: LearningMethod,
    pub learning: LearningConfig,
    pub pruning: PruningConfig,
    /// Truncate the example list to this many entries.
    pub num_examples: Option<usize>,
    /// Global synthesis deadline.
    pub timeout: Option<Duration>,
    pub debug: DebugDumps,
}

impl SynthesisConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input_format(mut self, format: InputFormat) -> Self {
        self.input_format = format;
        self
    }

    pub fn with_numeric_domain(mut self, domain: NumericDomain) -> Self {
        self.numeric_domain = domain;
        self
    }

    pub fn with_learning_method(mut self, method: LearningMethod) -> Self {
        self.learning_method = method;
        self
    }

    pub fn with_learning(mut self, learning: LearningConfig) -> Self {
        self.learning = learning;
        self
    }

    pub fn with_pruning_method(mut self, method: PruningMethod) -> Self {
        self.pruning.method = method;
        self
    }

    pub fn with_bounds(mut self, bounds: SizeBounds) -> Self {
        self.pruning.bounds = bounds;
        self
    }

    pub fn with_num_examples(mut self, n: usize) -> Self {
        self.num_examples = Some(n);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_debug(mut self, debug: DebugDumps) -> Self {
        self.debug = debug;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_pattern() {
        let config = SynthesisConfig::new()
            .with_pruning_method(PruningMethod::Baseline)
            .with_num_examples(2)
            .with_timeout(Duration::from_secs(30));
        assert_eq!(config.pruning.method, PruningMethod::Baseline);
        assert_eq!(config.num_examples, Some(2));
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_defaults() {
        let config = SynthesisConfig::default();
        assert_eq!(config.learning_method, LearningMethod::NoiseTolerant);
        assert_eq!(config.pruning.method, PruningMethod::Hierarchical);
        assert_eq!(config.instantiation, InstantiationMethod::Sweep);
        assert!(config.timeout.is_none());
    }
}
