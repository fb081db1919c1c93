//! Model comparator CLI
//!
//! Command-line interface for serving the API, training a single model on a
//! local CSV, comparing every model type and inspecting datasets.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::training::{FittedPipeline, ModelType, TrainEngine, TrainerConfig, TrainingOutcome};
use crate::utils::{load_csv_path, missing_values};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "model-comparator")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train and compare regression models on tabular data")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "API_PORT", default_value = "8000")]
        port: u16,

        /// Host to bind to
        #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
        host: String,
    },

    /// Train and evaluate one model on a CSV file
    Train {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Model type (linear_regression, random_forest, knn, svr, xgboost)
        #[arg(short, long, default_value = "linear_regression")]
        model: String,

        /// Hyperparameters as a JSON object
        #[arg(long)]
        params: Option<String>,

        /// Write the fitted pipeline to this JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Shuffles per column when importance falls back to permutation
        #[arg(long, default_value = "10")]
        permutation_repeats: usize,
    },

    /// Train every model type with default settings and rank them by R²
    Compare {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,
    },

    /// Predict with a saved pipeline
    Predict {
        /// Fitted pipeline file
        #[arg(short, long)]
        model: PathBuf,

        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Output CSV with a `prediction` column appended
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show dataset information
    Info {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,
    },
}

/// Parse a JSON object of hyperparameters
pub fn parse_params(raw: Option<&str>) -> anyhow::Result<Map<String, Value>> {
    match raw {
        None => Ok(Map::new()),
        Some(s) => match serde_json::from_str::<Value>(s)? {
            Value::Object(map) => Ok(map),
            other => anyhow::bail!("Hyperparameters must be a JSON object, got {}", other),
        },
    }
}

fn print_outcome(outcome: &TrainingOutcome) {
    let m = &outcome.metrics;
    println!();
    println!("  {:<16} {}", muted("R²"), format!("{:.4}", m.r2_score).white().bold());
    println!("  {:<16} {}", muted("MSE"), format!("{:.4}", m.mse).white());
    println!("  {:<16} {}", muted("MAE"), format!("{:.4}", m.mae).white());
    println!("  {:<16} {}", muted("RMSE"), format!("{:.4}", m.rmse).white());
    println!(
        "  {:<16} {}",
        muted("Samples"),
        format!(
            "{} train / {} test",
            outcome.model_info.n_samples_train, outcome.model_info.n_samples_test
        )
        .white()
    );
    println!("  {:<16} {}", muted("Time"), format!("{:.3}s", outcome.model_info.training_time_secs).white());

    if !outcome.feature_importance.is_empty() {
        section(&format!(
            "Feature importance ({})",
            outcome.model_info.feature_importance_method.as_str()
        ));
        let mut ranked: Vec<(&String, &f64)> = outcome.feature_importance.iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(a.1));
        for (name, value) in ranked {
            let bar = "█".repeat((value * 30.0).round() as usize);
            println!("  {:<20} {:>7.4} {}", name, value, accent(&bar));
        }
    }
    println!();
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    data_path: &Path,
    target: &str,
    model_type: &str,
    params: Option<&str>,
    output: Option<&Path>,
    permutation_repeats: usize,
) -> anyhow::Result<()> {
    section("Train");

    let model: ModelType = model_type.parse()?;
    let hyperparameters = parse_params(params)?;

    step_run("Loading data");
    let start = Instant::now();
    let df = load_csv_path(data_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    step_run(&format!("Training {}", model.as_str().cyan()));
    let engine = TrainEngine::new(TrainerConfig::default().with_permutation_repeats(permutation_repeats));
    let outcome = engine.train_and_evaluate(&df, target, model, &hyperparameters)?;
    step_done(&format!("{:.3}s", outcome.model_info.training_time_secs));

    if let Some(path) = output {
        step_run("Saving pipeline");
        outcome.pipeline.save(path)?;
        step_done(&path.display().to_string());
    }

    print_outcome(&outcome);
    Ok(())
}

pub fn cmd_compare(data_path: &Path, target: &str) -> anyhow::Result<()> {
    section("Compare");

    step_run("Loading data");
    let df = load_csv_path(data_path)?;
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    let engine = TrainEngine::new(TrainerConfig::default());
    let mut rows = Vec::new();
    for model in ModelType::ALL {
        step_run(&format!("Training {}", model.as_str().cyan()));
        match engine.train_and_evaluate(&df, target, model, &Map::new()) {
            Ok(outcome) => {
                step_done(&format!("{:.3}s", outcome.model_info.training_time_secs));
                rows.push((model, outcome.metrics));
            }
            Err(e) => println!("{} {}", "failed".red(), dim(&e.to_string())),
        }
    }

    rows.sort_by(|a, b| b.1.r2_score.total_cmp(&a.1.r2_score));

    println!();
    println!(
        "  {:<20} {:>9} {:>11} {:>11} {:>11}",
        muted("Model"), muted("R²"), muted("MSE"), muted("MAE"), muted("RMSE")
    );
    println!("  {}", dim(&"─".repeat(66)));
    for (i, (model, m)) in rows.iter().enumerate() {
        let name = if i == 0 { model.as_str().green().bold() } else { model.as_str().white() };
        println!(
            "  {:<20} {:>9.4} {:>11.4} {:>11.4} {:>11.4}",
            name, m.r2_score, m.mse, m.mae, m.rmse
        );
    }
    println!();
    Ok(())
}

pub fn cmd_predict(model_path: &Path, data_path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading pipeline");
    let pipeline = FittedPipeline::load(model_path)?;
    step_done(&format!("{} → {}", pipeline.model_type, pipeline.target_column));

    step_run("Loading data");
    let mut df = load_csv_path(data_path)?;
    step_done(&format!("{} rows", df.height()));

    let predictions = pipeline.predict_dataframe(&df)?;

    match output {
        Some(path) => {
            df.with_column(Series::new("prediction".into(), predictions.to_vec()))?;
            let mut file = std::fs::File::create(path)?;
            CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
            println!("  {} {}", ok("✓"), format!("Wrote {} predictions to {}", predictions.len(), path.display()));
        }
        None => {
            println!();
            for (i, value) in predictions.iter().take(20).enumerate() {
                println!("  {:>5} {:>14.4}", muted(&i.to_string()), value);
            }
            if predictions.len() > 20 {
                println!("  {}", dim(&format!("… {} more", predictions.len() - 20)));
            }
        }
    }
    println!();
    Ok(())
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let df = load_csv_path(data_path)?;
    let missing = missing_values(&df);

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), df.height());
    println!("  {:<12} {}", muted("Columns"), df.width());
    println!("  {:<12} {:.2} MB", muted("Memory"), df.estimated_size() as f64 / 1024.0 / 1024.0);
    println!();

    println!("  {:<20} {:<12} {:>6} {:>8}", muted("Column"), muted("Type"), muted("Nulls"), muted("Unique"));
    println!("  {}", dim(&"─".repeat(50)));

    for col in df.get_columns() {
        println!(
            "  {:<20} {:<12} {:>6} {:>8}",
            col.name(),
            format!("{:?}", col.dtype()).truecolor(140, 140, 140),
            missing.get(col.name().as_str()).copied().unwrap_or(0),
            col.n_unique().unwrap_or(0)
        );
    }

    println!();
    Ok(())
}

// ─── Serve ─────────────────────────────────────────────────────────────────────

pub async fn cmd_serve(host: &str, port: u16) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Model Comparator".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("API    ", &format!("http://{}:{}/api", host, port)));
    line_box(&kv("Jobs   ", &format!("http://{}:{}/api/v2", host, port)));
    line_box(&kv("Health ", &format!("http://{}:{}/api/health", host, port)));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    let config = ServerConfig {
        host: host.to_string(),
        port,
        ..Default::default()
    };

    run_server(config).await
}
