//! NeuroFlow AutoML - Command-line entry point
//!
//! Drives the full pipeline from a CSV path: load, assign roles, scale,
//! split, pick a model, train against an oracle, and print the report.

use clap::Parser;
use neuroflow_automl::dataset::{ColumnType, ScalerChoice};
use neuroflow_automl::oracle::{
    LocalOracle, ModelKind, OracleConfig, RemoteOracle, TrainingOracle,
};
use neuroflow_automl::pipeline::Pipeline;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "neuroflow", version, about = "Staged AutoML pipeline")]
struct Cli {
    /// Path to the CSV dataset
    data: PathBuf,

    /// Target column to predict
    #[arg(long)]
    target: String,

    /// Feature columns (defaults to every other column)
    #[arg(long, value_delimiter = ',')]
    features: Vec<String>,

    /// Scaler: none, minmax, or standard
    #[arg(long, default_value = "none")]
    scaler: ScalerChoice,

    /// Train split percentage, 50-90 in steps of 5
    #[arg(long, default_value_t = 80)]
    split: u8,

    /// Model: logistic-regression or decision-tree
    #[arg(long, default_value = "logistic-regression")]
    model: ModelKind,

    /// Evaluate via a remote oracle service instead of the local estimator
    #[arg(long)]
    remote: bool,

    /// Remote oracle endpoint (implies --remote)
    #[arg(long)]
    endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "neuroflow_automl=info".into()),
        )
        .init();

    let cli = Cli::parse();

    if cli.remote || cli.endpoint.is_some() {
        let mut config = OracleConfig::default();
        if let Some(endpoint) = cli.endpoint.clone() {
            config.endpoint = endpoint;
        }
        run(RemoteOracle::new(config)?, &cli).await
    } else {
        run(LocalOracle, &cli).await
    }
}

async fn run<O: TrainingOracle>(oracle: O, cli: &Cli) -> anyhow::Result<()> {
    let mut pipeline = Pipeline::new(oracle);
    pipeline.load_dataset_from_path(&cli.data).await?;

    pipeline.state.set_target(&cli.target)?;
    let features: Vec<String> = if cli.features.is_empty() {
        pipeline
            .state
            .dataset()
            .map(|d| {
                d.column_names()
                    .iter()
                    .filter(|c| **c != cli.target)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    } else {
        cli.features.clone()
    };
    for feature in &features {
        pipeline.state.toggle_feature(feature)?;
    }
    pipeline.state.set_scaler(cli.scaler);

    print_dataset_summary(&pipeline.state);

    pipeline.state.next()?;
    pipeline.state.set_split_ratio(cli.split);
    pipeline.state.next()?;
    pipeline.state.select_model(cli.model)?;

    pipeline.run_training().await?;
    print_results(&pipeline.state);
    Ok(())
}

fn print_dataset_summary(state: &neuroflow_automl::pipeline::PipelineState) {
    let Some(dataset) = state.dataset() else {
        return;
    };

    println!(
        "Dataset: {} rows, {} columns",
        dataset.n_rows(),
        dataset.column_names().len()
    );
    for stat in dataset.stats() {
        match stat.column_type {
            ColumnType::Numeric => println!(
                "  {:<20} numeric      min={:<10} max={:<10} mean={:.4} std={:.4} unique={}",
                stat.name,
                stat.min.unwrap_or_default(),
                stat.max.unwrap_or_default(),
                stat.mean.unwrap_or_default(),
                stat.std.unwrap_or_default(),
                stat.unique_values,
            ),
            ColumnType::Categorical => println!(
                "  {:<20} categorical  unique={}",
                stat.name, stat.unique_values
            ),
        }
    }
    println!(
        "Target: {}  Features: {}  Scaler: {}",
        dataset.target_column().unwrap_or("-"),
        dataset.ordered_features().join(", "),
        state.scaler_choice(),
    );
}

fn print_results(state: &neuroflow_automl::pipeline::PipelineState) {
    let Some(results) = state.results() else {
        return;
    };

    println!("\n=== Training Results ===");
    println!("Accuracy:  {:.4}", results.accuracy);
    println!("Precision: {:.4}", results.precision);
    println!("Recall:    {:.4}", results.recall);
    println!("F1 score:  {:.4}", results.f1_score);

    let m = results.confusion_matrix;
    println!("\nConfusion matrix:");
    println!("              predicted +   predicted -");
    println!("  actual +    {:<13} {:<13}", m[0][0], m[1][0]);
    println!("  actual -    {:<13} {:<13}", m[0][1], m[1][1]);

    if !results.feature_importance.is_empty() {
        println!("\nFeature importance:");
        for imp in &results.feature_importance {
            println!("  {:<20} {:.4}", imp.name, imp.value);
        }
    }

    println!("\n{}", results.insights);
}
