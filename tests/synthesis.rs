//! End-to-end synthesis scenarios.
//!
//! Each test feeds literal example documents through the full pipeline and
//! checks the selected constraint set, treating the output as a set.

use layout_inference::eval::evaluate;
use layout_inference::loader::{load_examples, InputFormat, NumericDomain};
use layout_inference::model::{rat, ratio, Rect};
use layout_inference::{
    synthesize, synthesize_examples, CancelToken, PruningMethod, SynthesisConfig, SynthesisResult,
};

fn constraint_strings(result: &SynthesisResult) -> Vec<String> {
    result
        .constraints
        .iter()
        .map(|c| match &c.x {
            Some(x) => format!("{} {} {}*{}+{}", c.y, serde_json::to_string(&c.op).unwrap(), c.a, x, c.b),
            None => format!("{} {} {}", c.y, serde_json::to_string(&c.op).unwrap(), c.b),
        })
        .collect()
}

fn assert_selected(result: &SynthesisResult, y: &str, x: Option<&str>, a: &str, b: &str) {
    let found = result.constraints.iter().any(|c| {
        c.y == y && c.x.as_deref() == x && c.a == a && c.b == b
    });
    assert!(
        found,
        "expected {} = {}*{:?}+{} in {:?}",
        y,
        a,
        x,
        b,
        constraint_strings(result)
    );
}

const HEADER_DOC: &str = r#"{ "examples": [
    { "name": "root", "rect": [0, 0, 800, 600],
      "children": [ { "name": "header", "rect": [0, 0, 800, 80] } ] },
    { "name": "root", "rect": [0, 0, 1200, 800],
      "children": [ { "name": "header", "rect": [0, 0, 1200, 80] } ] }
]}"#;

/// S1: a constant-height header pinned to the root.
#[test]
fn test_constant_header_scenario() {
    let result = synthesize(HEADER_DOC, &SynthesisConfig::default()).unwrap();
    assert_selected(&result, "header.height", None, "0", "80");
    assert_selected(&result, "header.width", Some("root.width"), "1", "0");
    assert_selected(&result, "header.top", Some("root.top"), "1", "0");
    assert_selected(&result, "header.left", Some("root.left"), "1", "0");
}

const SIDEBAR_DOC: &str = r#"{ "examples": [
    { "name": "root", "rect": [0, 0, 800, 600], "children": [
        { "name": "header", "rect": [0, 0, 800, 80] },
        { "name": "sidebar", "rect": [0, 80, 200, 600] },
        { "name": "main", "rect": [200, 80, 800, 600] } ] },
    { "name": "root", "rect": [0, 0, 1200, 800], "children": [
        { "name": "header", "rect": [0, 0, 1200, 80] },
        { "name": "sidebar", "rect": [0, 80, 200, 800] },
        { "name": "main", "rect": [200, 80, 1200, 800] } ] }
]}"#;

/// S2: header over a fixed sidebar and a flexible main area.
#[test]
fn test_sidebar_main_scenario() {
    let result = synthesize(SIDEBAR_DOC, &SynthesisConfig::default()).unwrap();
    assert_selected(&result, "sidebar.width", None, "0", "200");
    assert_selected(&result, "sidebar.left", Some("root.left"), "1", "0");
    assert_selected(&result, "sidebar.top", Some("header.bottom"), "1", "0");
    assert_selected(&result, "sidebar.bottom", Some("root.bottom"), "1", "0");
    assert_selected(&result, "main.top", Some("header.bottom"), "1", "0");
    assert_selected(&result, "main.left", Some("sidebar.right"), "1", "0");
    assert_selected(&result, "main.right", Some("root.right"), "1", "0");
    assert_selected(&result, "main.bottom", Some("root.bottom"), "1", "0");
    assert_selected(&result, "header.height", None, "0", "80");
    assert_selected(&result, "header.width", Some("root.width"), "1", "0");
}

/// S3: a view scaling with a fixed 3:2 aspect ratio. The aspect sketch is
/// learned; the selection determines the view against the root.
#[test]
fn test_aspect_ratio_scenario() {
    let doc = r#"{ "examples": [
        { "name": "root", "rect": [0, 0, 300, 200],
          "children": [ { "name": "view", "rect": [0, 0, 300, 200] } ] },
        { "name": "root", "rect": [0, 0, 600, 400],
          "children": [ { "name": "view", "rect": [0, 0, 600, 400] } ] }
    ]}"#;

    // The learner produces the aspect-ratio candidate with a = 3/2.
    let config = SynthesisConfig::default().with_pruning_method(PruningMethod::None);
    let unpruned = synthesize(doc, &config).unwrap();
    let aspect = unpruned
        .constraints
        .iter()
        .find(|c| c.y == "view.width" && c.x.as_deref() == Some("view.height"));
    assert_eq!(aspect.map(|c| c.a.as_str()), Some("3/2"));

    // The pruned selection fully determines the view.
    let result = synthesize(doc, &SynthesisConfig::default()).unwrap();
    assert_selected(&result, "view.width", Some("root.width"), "1", "0");
    assert_selected(&result, "view.height", Some("root.height"), "1", "0");
}

/// S4: near-half ratios resolve to 1/2, not a close complicated rational.
#[test]
fn test_stern_brocot_preference_scenario() {
    let doc = r#"{ "examples": [
        { "name": "root", "rect": [0, 0, 800, 600],
          "children": [ { "name": "pane", "rect": [0, 0, 401, 600] } ] },
        { "name": "root", "rect": [0, 0, 1000, 600],
          "children": [ { "name": "pane", "rect": [0, 0, 501, 600] } ] },
        { "name": "root", "rect": [0, 0, 1200, 600],
          "children": [ { "name": "pane", "rect": [0, 0, 601, 600] } ] }
    ]}"#;
    let config = SynthesisConfig::default().with_pruning_method(PruningMethod::None);
    let result = synthesize(doc, &config).unwrap();
    let ratio_cands: Vec<_> = result
        .constraints
        .iter()
        .filter(|c| c.y == "pane.width" && c.x.as_deref() == Some("root.width"))
        .collect();
    assert!(!ratio_cands.is_empty());
    // Candidates are sorted by posterior; the best one is 1/2.
    assert_eq!(ratio_cands[0].a, "1/2");
    assert!(ratio_cands.iter().all(|c| c.a != "501/1000"));
}

/// S5: three adjacent siblings; the middle one blocks the outer pair.
#[test]
fn test_visibility_blocking_scenario() {
    let doc = r#"{ "examples": [
        { "name": "root", "rect": [0, 0, 300, 100], "children": [
            { "name": "a", "rect": [0, 0, 100, 100] },
            { "name": "b", "rect": [100, 0, 200, 100] },
            { "name": "c", "rect": [200, 0, 300, 100] } ] }
    ]}"#;
    let config = SynthesisConfig::default().with_pruning_method(PruningMethod::None);
    let result = synthesize(doc, &config).unwrap();
    let has = |y: &str, x: &str| {
        result
            .constraints
            .iter()
            .any(|c| c.y == y && c.x.as_deref() == Some(x))
    };
    assert!(has("b.left", "a.right"));
    assert!(has("c.left", "b.right"));
    assert!(!has("c.left", "a.right"));
    assert!(!has("a.right", "c.left"));
}

/// S6: for a small tree, hierarchical decomposition agrees with the
/// monolithic baseline pruner as a set.
#[test]
fn test_hierarchical_matches_baseline_scenario() {
    let doc = r#"{ "examples": [
        { "name": "root", "rect": [0, 0, 800, 600], "children": [
            { "name": "panel", "rect": [0, 100, 800, 600], "children": [
                { "name": "inner", "rect": [10, 110, 210, 160] } ] } ] },
        { "name": "root", "rect": [0, 0, 1200, 900], "children": [
            { "name": "panel", "rect": [0, 100, 1200, 900], "children": [
                { "name": "inner", "rect": [10, 110, 210, 160] } ] } ] }
    ]}"#;
    let hierarchical = synthesize(doc, &SynthesisConfig::default()).unwrap();
    let baseline = synthesize(
        doc,
        &SynthesisConfig::default().with_pruning_method(PruningMethod::Baseline),
    )
    .unwrap();

    let mut h = constraint_strings(&hierarchical);
    let mut b = constraint_strings(&baseline);
    h.sort();
    b.sort();
    assert_eq!(h, b);
}

/// Idempotence: evaluating the synthesized constraints at the example sizes
/// reproduces the examples, and re-synthesizing from the reproduction gives
/// the same constraint set.
#[test]
fn test_idempotence_through_evaluation() {
    let examples = load_examples(SIDEBAR_DOC, InputFormat::Default, NumericDomain::Number).unwrap();
    let config = SynthesisConfig::default();
    let cancel = CancelToken::new();
    let first = synthesize_examples(&examples, &config, &cancel).unwrap();

    let constraints: Vec<_> = first
        .constraints
        .iter()
        .map(|r| layout_inference::model::Constraint::try_from(r).unwrap())
        .collect();

    let rebuilt: Vec<_> = [
        Rect::from_ints(0, 0, 800, 600),
        Rect::from_ints(0, 0, 1200, 800),
    ]
    .iter()
    .map(|rect| evaluate(&examples[0], rect, &constraints).unwrap())
    .collect();

    // The evaluation reproduces the originals exactly.
    for (original, solved) in examples.iter().zip(&rebuilt) {
        for id in original.ids() {
            assert_eq!(original.node(id).rect, solved.node(id).rect);
        }
    }

    let second = synthesize_examples(&rebuilt, &config, &cancel).unwrap();
    let mut a = constraint_strings(&first);
    let mut b = constraint_strings(&second);
    a.sort();
    b.sort();
    assert_eq!(a, b);
}

/// Generalization: the sidebar selection solved at an unseen size keeps the
/// layout's structure.
#[test]
fn test_generalizes_to_unseen_size() {
    let examples = load_examples(SIDEBAR_DOC, InputFormat::Default, NumericDomain::Number).unwrap();
    let result =
        synthesize_examples(&examples, &SynthesisConfig::default(), &CancelToken::new()).unwrap();
    let constraints: Vec<_> = result
        .constraints
        .iter()
        .map(|r| layout_inference::model::Constraint::try_from(r).unwrap())
        .collect();

    let solved = evaluate(&examples[0], &Rect::from_ints(0, 0, 1000, 700), &constraints).unwrap();
    let rect = |name: &str| solved.node(solved.find(name).unwrap()).rect.clone();

    assert_eq!(rect("header").width(), rat(1000));
    assert_eq!(rect("header").height(), rat(80));
    assert_eq!(rect("sidebar").width(), rat(200));
    assert_eq!(rect("sidebar").top, rat(80));
    assert_eq!(rect("main").left, rat(200));
    assert_eq!(rect("main").right, rat(1000));
    assert_eq!(rect("main").bottom, rat(700));
    // No stray fractions crept in.
    assert_eq!(rect("main").center_y(), ratio(780, 2));
}
