//! JSON ingestion of layout examples.
//!
//! Two input shapes are accepted: the default shape with a `rect` array of
//! `[left, top, right, bottom]`, and the bench shape with `left`/`top`/
//! `width`/`height` fields. All coordinates are converted to exact rationals
//! at load time; the configured numeric domain only governs how the JSON
//! numbers are interpreted.

use serde::Deserialize;
use thiserror::Error;

use crate::model::{rat_from_f64, rat_round, Rat, Rect, ViewBuilder, ViewTree, ViewTreeError};

/// Shape of the input document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputFormat {
    #[default]
    Default,
    Bench,
}

/// Interpretation of JSON coordinate numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumericDomain {
    /// Preserve whatever the parser produced.
    #[default]
    Number,
    /// Real-valued input, still held exactly.
    Real,
    /// Exact rationals.
    Rational,
    /// Integers; non-integral coordinates are rounded to nearest.
    Integer,
}

/// Errors surfaced while loading examples. These are the `InvalidInput`
/// class of the synthesis error taxonomy.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("malformed input document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("input document has no '{0}' section")]
    MissingSection(&'static str),

    #[error("input document contains no examples")]
    NoExamples,

    #[error("view '{name}' has no usable rectangle")]
    MissingRect { name: String },

    #[error("coordinate {value} of view '{name}' is not a finite number")]
    BadCoordinate { name: String, value: String },

    #[error(transparent)]
    Tree(#[from] ViewTreeError),

    #[error("example {index} is not isomorphic to the first example")]
    NonIsomorphic { index: usize },
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    examples: Option<Vec<RawView>>,
    train: Option<Vec<RawView>>,
}

#[derive(Debug, Deserialize)]
struct RawView {
    name: String,
    rect: Option<[serde_json::Number; 4]>,
    left: Option<serde_json::Number>,
    top: Option<serde_json::Number>,
    width: Option<serde_json::Number>,
    height: Option<serde_json::Number>,
    #[serde(default)]
    children: Vec<RawView>,
}

/// Load every example tree from a JSON document string.
pub fn load_examples(
    source: &str,
    format: InputFormat,
    domain: NumericDomain,
) -> Result<Vec<ViewTree>, LoadError> {
    let doc: RawDocument = serde_json::from_str(source)?;
    let raw = match format {
        InputFormat::Default => doc
            .examples
            .ok_or(LoadError::MissingSection("examples"))?,
        InputFormat::Bench => doc.train.ok_or(LoadError::MissingSection("train"))?,
    };
    if raw.is_empty() {
        return Err(LoadError::NoExamples);
    }

    let trees = raw
        .iter()
        .map(|r| build_view(r, format, domain).and_then(|b| b.build().map_err(LoadError::from)))
        .collect::<Result<Vec<_>, _>>()?;

    for (index, tree) in trees.iter().enumerate().skip(1) {
        if !trees[0].is_isomorphic(tree, true) {
            return Err(LoadError::NonIsomorphic { index });
        }
    }
    Ok(trees)
}

fn build_view(
    raw: &RawView,
    format: InputFormat,
    domain: NumericDomain,
) -> Result<ViewBuilder, LoadError> {
    let rect = match format {
        InputFormat::Default => {
            let rect = raw.rect.as_ref().ok_or_else(|| LoadError::MissingRect {
                name: raw.name.clone(),
            })?;
            let [l, t, r, b] = rect;
            Rect::new(
                convert(l, &raw.name, domain)?,
                convert(t, &raw.name, domain)?,
                convert(r, &raw.name, domain)?,
                convert(b, &raw.name, domain)?,
            )
        }
        InputFormat::Bench => {
            let get = |n: &Option<serde_json::Number>| -> Result<Rat, LoadError> {
                let n = n.as_ref().ok_or_else(|| LoadError::MissingRect {
                    name: raw.name.clone(),
                })?;
                convert(n, &raw.name, domain)
            };
            let (left, top) = (get(&raw.left)?, get(&raw.top)?);
            let (width, height) = (get(&raw.width)?, get(&raw.height)?);
            let right = &left + &width;
            let bottom = &top + &height;
            Rect::new(left, top, right, bottom)
        }
    };

    let mut builder = ViewBuilder::new(raw.name.clone(), rect);
    for child in &raw.children {
        builder.children.push(build_view(child, format, domain)?);
    }
    Ok(builder)
}

fn convert(n: &serde_json::Number, name: &str, domain: NumericDomain) -> Result<Rat, LoadError> {
    let exact = if let Some(i) = n.as_i64() {
        crate::model::rat(i)
    } else if let Some(f) = n.as_f64() {
        rat_from_f64(f).ok_or_else(|| LoadError::BadCoordinate {
            name: name.to_string(),
            value: n.to_string(),
        })?
    } else {
        return Err(LoadError::BadCoordinate {
            name: name.to_string(),
            value: n.to_string(),
        });
    };
    Ok(match domain {
        NumericDomain::Number | NumericDomain::Real | NumericDomain::Rational => exact,
        NumericDomain::Integer => Rat::from_integer(rat_round(&exact)),
    })
}

/// Serialize a view tree back into the default input shape. Exact values
/// that fit an integer stay integers; everything else is emitted as a
/// decimal approximation.
pub fn tree_to_json(tree: &ViewTree) -> serde_json::Value {
    use num_traits::{One, ToPrimitive};
    fn number(v: &Rat) -> serde_json::Value {
        if v.denom().is_one() {
            match v.numer().to_i64() {
                Some(i) => return serde_json::Value::from(i),
                None => return serde_json::Value::from(v.to_f64().unwrap_or(0.0)),
            }
        }
        serde_json::Value::from(v.to_f64().unwrap_or(0.0))
    }
    fn recurse(tree: &ViewTree, id: crate::model::ViewId) -> serde_json::Value {
        let node = tree.node(id);
        let children: Vec<serde_json::Value> = node
            .children
            .iter()
            .map(|&child| recurse(tree, child))
            .collect();
        serde_json::json!({
            "name": node.name,
            "rect": [
                number(&node.rect.left),
                number(&node.rect.top),
                number(&node.rect.right),
                number(&node.rect.bottom),
            ],
            "children": children,
        })
    }
    recurse(tree, ViewTree::ROOT)
}
