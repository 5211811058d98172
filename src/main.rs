//! Evaluation CLI: rank the catalog for every query and report mean average precision.

use anyhow::{Context, Result};
use clap::Parser;
use mapeval::{
    distance::DistanceFunction,
    eval::RetrievalEvaluator,
    report::{self, RunInfo},
    Config,
};
use std::path::PathBuf;

/// Mean average precision of pre-computed image features.
#[derive(Parser, Debug)]
#[command(name = "mapeval", version)]
struct Args {
    /// Feature matrix: OpenCV FileStorage .xml, .json, or the extractor's .txt output.
    features: PathBuf,

    /// Annotation file, one `image id;class id;is query;class count` record per line.
    /// The image id is ignored; the line number is used instead.
    annotation: PathBuf,

    /// Distance function: L2, L2Sqr, L1, Linfinity, Cosine, Hamming or MaxDim.
    #[arg(short = 'd', long)]
    distance_function: Option<DistanceFunction>,

    /// Evaluate only the top K results of each query (0 = all).
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Exclude the query feature from the retrieved result set.
    #[arg(short = 'e', long)]
    exclude_query_from_results: bool,

    /// Config file (default: $MAPEVAL_CONFIG, then ./mapeval.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Name of the matrix inside the feature container.
    #[arg(long)]
    feature_key: Option<String>,

    /// Evaluate queries in parallel.
    #[arg(long)]
    parallel: bool,

    /// Write a JSON report of the run.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write per-query precision-recall samples as CSV.
    #[arg(long)]
    pr_curves: Option<PathBuf>,

    /// Exit with status 1 if the mean average precision is below this value.
    #[arg(long)]
    min_map: Option<f64>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.mapeval.log_level.as_str()),
    )
    .init();

    // Command line overrides the config file
    if let Some(distance) = args.distance_function {
        config.evaluation.distance_function = distance;
    }
    if let Some(top_k) = args.top_k {
        config.evaluation.top_k = top_k;
    }
    if args.exclude_query_from_results {
        config.evaluation.exclude_query_from_results = true;
    }
    if args.parallel {
        config.evaluation.parallel = true;
    }
    if args.pr_curves.is_some() {
        config.evaluation.collect_precision_recall = true;
    }
    if let Some(key) = args.feature_key {
        config.features.identifier = key;
    }
    if let Some(min_map) = args.min_map {
        config.evaluation.min_map = min_map;
    }
    config.validate()?;

    let distance = config.evaluation.distance_function;
    let options = config.evaluator_options();

    let evaluator = RetrievalEvaluator::from_files(
        &args.features,
        &args.annotation,
        &config.features.identifier,
        distance,
        options,
    )
    .context("Failed to load evaluation inputs")?;

    let results = evaluator.evaluate().context("Evaluation failed")?;

    println!("Mean average precision: {}", results.mean_average_precision);

    if let Some(ref path) = args.report {
        let run = RunInfo::new(&args.features, &args.annotation, distance.as_str(), options)?;
        report::write_json(&results, &run, path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
    }

    if let Some(ref path) = args.pr_curves {
        report::write_precision_recall_csv(&results, path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let threshold = config.evaluation.min_map;
    if threshold > 0.0 && results.mean_average_precision < threshold {
        println!(
            "\nMean average precision below threshold ({:.4} < {:.4}).",
            results.mean_average_precision, threshold
        );
        std::process::exit(1);
    }

    Ok(())
}
