//! Layout inference CLI.
//!
//! Reads a JSON example document, runs the synthesis pipeline, and prints
//! the constraint document as JSON.
//!
//! Exit codes: 0 on success, 2 on invalid input, 3 on timeout, 1 on any
//! unexpected failure.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use layout_inference::{
    DebugDumps, InputFormat, LearningConfig, LearningMethod, NumericDomain, PruningMethod,
    SizeBounds, SynthesisConfig, SynthesisError,
};

#[derive(Parser)]
#[command(name = "layout-inference")]
#[command(about = "Synthesize layout constraints from sized examples")]
struct Cli {
    /// Input file (reads from stdin if not provided)
    input: Option<PathBuf>,

    /// Input document shape
    #[arg(long, value_enum, default_value = "default")]
    input_format: FormatArg,

    /// Interpretation of input coordinates
    #[arg(long, value_enum, default_value = "n")]
    numeric_type: NumericArg,

    /// Learner implementation
    #[arg(long, value_enum, default_value = "noisetolerant")]
    learning_method: LearningArg,

    /// Pruner implementation
    #[arg(long, value_enum, default_value = "hierarchical")]
    pruning_method: PruningArg,

    /// Minimum test width for pruning
    #[arg(long)]
    min_width: Option<i64>,

    /// Minimum test height for pruning
    #[arg(long)]
    min_height: Option<i64>,

    /// Maximum test width for pruning
    #[arg(long)]
    max_width: Option<i64>,

    /// Maximum test height for pruning
    #[arg(long)]
    max_height: Option<i64>,

    /// Use only the first N examples
    #[arg(long)]
    num_examples: Option<usize>,

    /// Global synthesis deadline in seconds
    #[arg(long)]
    timeout_seconds: Option<u64>,

    /// Learner worker threads
    #[arg(long)]
    workers: Option<usize>,

    /// Dump visible edge pairs to stderr
    #[arg(long)]
    dump_visibility: bool,

    /// Dump instantiated sketches to stderr
    #[arg(long)]
    dump_templates: bool,

    /// Dump learned candidates to stderr
    #[arg(long)]
    dump_candidates: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Default,
    Bench,
}

#[derive(Clone, Copy, ValueEnum)]
enum NumericArg {
    N,
    R,
    Q,
    Z,
}

#[derive(Clone, Copy, ValueEnum)]
enum LearningArg {
    Simple,
    Heuristic,
    Noisetolerant,
}

#[derive(Clone, Copy, ValueEnum)]
enum PruningArg {
    None,
    Baseline,
    Hierarchical,
}

fn build_config(cli: &Cli) -> SynthesisConfig {
    let bounds = SizeBounds {
        min_w: cli.min_width.map(layout_inference::model::rat),
        min_h: cli.min_height.map(layout_inference::model::rat),
        max_w: cli.max_width.map(layout_inference::model::rat),
        max_h: cli.max_height.map(layout_inference::model::rat),
        ..Default::default()
    };
    let mut learning = LearningConfig::default();
    if let Some(workers) = cli.workers {
        learning = learning.with_workers(workers);
    }
    let mut config = SynthesisConfig::new()
        .with_input_format(match cli.input_format {
            FormatArg::Default => InputFormat::Default,
            FormatArg::Bench => InputFormat::Bench,
        })
        .with_numeric_domain(match cli.numeric_type {
            NumericArg::N => NumericDomain::Number,
            NumericArg::R => NumericDomain::Real,
            NumericArg::Q => NumericDomain::Rational,
            NumericArg::Z => NumericDomain::Integer,
        })
        .with_learning_method(match cli.learning_method {
            LearningArg::Simple => LearningMethod::Simple,
            LearningArg::Heuristic => LearningMethod::Heuristic,
            LearningArg::Noisetolerant => LearningMethod::NoiseTolerant,
        })
        .with_pruning_method(match cli.pruning_method {
            PruningArg::None => PruningMethod::None,
            PruningArg::Baseline => PruningMethod::Baseline,
            PruningArg::Hierarchical => PruningMethod::Hierarchical,
        })
        .with_bounds(bounds)
        .with_learning(learning)
        .with_debug(DebugDumps {
            after_visibility: cli.dump_visibility,
            after_instantiation: cli.dump_templates,
            after_learning: cli.dump_candidates,
        });
    if let Some(n) = cli.num_examples {
        config = config.with_num_examples(n);
    }
    if let Some(secs) = cli.timeout_seconds {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    config
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli);

    let source = match &cli.input {
        Some(path) => match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("Error reading file '{}': {}", path.display(), e);
                std::process::exit(2);
            }
        },
        None => {
            let mut buffer = String::new();
            match io::stdin().read_to_string(&mut buffer) {
                Ok(_) => buffer,
                Err(e) => {
                    eprintln!("Error reading from stdin: {}", e);
                    std::process::exit(2);
                }
            }
        }
    };

    match layout_inference::synthesize(&source, &config) {
        Ok(result) => {
            print_document(&result);
        }
        Err(SynthesisError::InvalidInput(e)) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
        Err(SynthesisError::Timeout { partial }) => {
            eprintln!("Error: synthesis deadline elapsed; emitting partial result");
            print_document(&partial);
            std::process::exit(3);
        }
    }
}

fn print_document(result: &layout_inference::SynthesisResult) {
    match serde_json::to_string_pretty(result) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            std::process::exit(1);
        }
    }
}
