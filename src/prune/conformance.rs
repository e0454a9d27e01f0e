//! Conformances: concrete test screen sizes the MaxSMT encodings quantify
//! over.

use crate::model::{rat, Rat, ViewTree};

/// One concrete root rectangle: `(width, height, x, y)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conformance {
    pub width: Rat,
    pub height: Rat,
    pub x: Rat,
    pub y: Rat,
}

impl Conformance {
    pub fn new(width: Rat, height: Rat, x: Rat, y: Rat) -> Self {
        Self {
            width,
            height,
            x,
            y,
        }
    }

    fn midpoint(&self, other: &Conformance) -> Conformance {
        let half = |a: &Rat, b: &Rat| (a + b) / rat(2);
        Conformance {
            width: half(&self.width, &other.width),
            height: half(&self.height, &other.height),
            x: half(&self.x, &other.x),
            y: half(&self.y, &other.y),
        }
    }
}

/// Test bounds for the synthesized layout. Missing fields fall back to the
/// extremes observed in the examples.
#[derive(Debug, Clone, Default)]
pub struct SizeBounds {
    pub min_w: Option<Rat>,
    pub min_h: Option<Rat>,
    pub max_w: Option<Rat>,
    pub max_h: Option<Rat>,
    pub min_x: Option<Rat>,
    pub min_y: Option<Rat>,
    pub max_x: Option<Rat>,
    pub max_y: Option<Rat>,
}

impl SizeBounds {
    /// Widen the configured bounds so every example root fits, and resolve
    /// the min/max conformance pair.
    pub fn resolve(&self, examples: &[ViewTree]) -> (Conformance, Conformance) {
        let widths: Vec<Rat> = examples.iter().map(|e| e.root().rect.width()).collect();
        let heights: Vec<Rat> = examples.iter().map(|e| e.root().rect.height()).collect();
        let xs: Vec<Rat> = examples.iter().map(|e| e.root().rect.left.clone()).collect();
        let ys: Vec<Rat> = examples.iter().map(|e| e.root().rect.top.clone()).collect();

        let lo = |configured: &Option<Rat>, observed: &[Rat]| -> Rat {
            let observed_min = observed.iter().min().cloned().expect("non-empty examples");
            match configured {
                Some(v) => v.clone().min(observed_min),
                None => observed_min,
            }
        };
        let hi = |configured: &Option<Rat>, observed: &[Rat]| -> Rat {
            let observed_max = observed.iter().max().cloned().expect("non-empty examples");
            match configured {
                Some(v) => v.clone().max(observed_max),
                None => observed_max,
            }
        };

        let min_conf = Conformance::new(
            lo(&self.min_w, &widths),
            lo(&self.min_h, &heights),
            lo(&self.min_x, &xs),
            lo(&self.min_y, &ys),
        );
        let max_conf = Conformance::new(
            hi(&self.max_w, &widths),
            hi(&self.max_h, &heights),
            hi(&self.max_x, &xs),
            hi(&self.max_y, &ys),
        );
        (min_conf, max_conf)
    }
}

/// A small spread of conformances between two extremes: the endpoints plus a
/// midpoint. More points make the queries more conservative but linearly
/// slower.
pub fn conformance_range(min_conf: &Conformance, max_conf: &Conformance) -> Vec<Conformance> {
    if min_conf == max_conf {
        return vec![min_conf.clone()];
    }
    vec![
        min_conf.clone(),
        min_conf.midpoint(max_conf),
        max_conf.clone(),
    ]
}
