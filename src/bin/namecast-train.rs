//! Developer utility to train one model family and print its evaluation.

use std::path::PathBuf;

use namecast::dataset::DatasetSource;
use namecast::ml::CancelToken;
use namecast::predict::PredictionAggregator;
use namecast::registry::SlotPolicy;
use namecast::training::{Hyperparameters, ModelType, TrainingOptions};
use namecast::{NameService, logging};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    if let Err(err) = logging::init(&logging::LoggingOptions {
        default_filter: "warn".to_string(),
        write_file: false,
    }) {
        eprintln!("Logging disabled: {err}");
    }

    let source = match (&options.dataset, options.synthetic) {
        (Some(path), _) => DatasetSource::File(path.clone()),
        (None, Some(size)) => DatasetSource::Synthetic {
            size,
            seed: options.seed,
        },
        (None, None) => DatasetSource::BuiltIn,
    };
    println!("Training {} on {}", options.model_type, source.describe());
    let service = NameService::new(source, SlotPolicy::default(), PredictionAggregator::default());
    let request = TrainingOptions::new(options.model_type, options.split)
        .with_seed(options.seed)
        .with_hyperparameters(options.hyperparameters);
    let metrics = service
        .train(&request, &CancelToken::new())
        .map_err(|err| err.to_string())?;

    for notice in &metrics.notices {
        println!("note: {notice}");
    }
    println!(
        "{}: train={} test={} time={}ms",
        metrics.model_used, metrics.train_size, metrics.test_size, metrics.training_time_ms
    );
    println!(
        "accuracy={:.4}  precision={:.4}  recall={:.4}  f1={:.4}",
        metrics.accuracy, metrics.precision, metrics.recall, metrics.f1_score
    );
    let [[tn, fp], [fn_, tp]] = metrics.confusion_matrix;
    println!("confusion (rows=actual, cols=predicted): [[{tn}, {fp}], [{fn_}, {tp}]]");
    let bias = metrics.bias_metrics;
    println!(
        "bias: gender={:.3} age={:.3} location={:.3} education={:.3} ethnicity={:.3}",
        bias.gender_bias, bias.age_bias, bias.location_bias, bias.education_bias, bias.ethnicity_bias
    );

    if let Some(out) = &options.model_out {
        service
            .save_model(request.model_type.family(), out)
            .map_err(|err| err.to_string())?;
        println!("saved model to {}", out.display());
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct CliOptions {
    model_type: ModelType,
    split: f64,
    seed: u64,
    dataset: Option<PathBuf>,
    synthetic: Option<usize>,
    model_out: Option<PathBuf>,
    hyperparameters: Hyperparameters,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut model_type = ModelType::RandomForest;
    let mut split = 0.8f64;
    let mut seed = 42u64;
    let mut dataset = None;
    let mut synthetic = None;
    let mut model_out = None;
    let mut hyperparameters = Hyperparameters::new();

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--model-type" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--model-type requires a value".to_string())?;
                model_type = value.parse().map_err(|err| format!("{err}"))?;
            }
            "--split" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--split requires a value".to_string())?;
                split = value
                    .parse::<f64>()
                    .map_err(|_| format!("Invalid --split value: {value}"))?;
            }
            "--seed" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--seed requires a value".to_string())?;
                seed = value
                    .parse::<u64>()
                    .map_err(|_| format!("Invalid --seed value: {value}"))?;
            }
            "--dataset" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--dataset requires a value".to_string())?;
                dataset = Some(PathBuf::from(value));
            }
            "--synthetic" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--synthetic requires a value".to_string())?;
                synthetic = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| format!("Invalid --synthetic value: {value}"))?,
                );
            }
            "--out" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--out requires a value".to_string())?;
                model_out = Some(PathBuf::from(value));
            }
            "--set" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--set requires key=value".to_string())?;
                let (key, raw) = value
                    .split_once('=')
                    .ok_or_else(|| format!("Invalid --set value: {value}"))?;
                let parsed: serde_json::Value = serde_json::from_str(raw)
                    .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
                hyperparameters = hyperparameters.with(key, parsed);
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    Ok(CliOptions {
        model_type,
        split,
        seed,
        dataset,
        synthetic,
        model_out,
        hyperparameters,
    })
}

fn help_text() -> String {
    "Usage: namecast-train [--model-type randomForest|gradientBoosting|neuralNetwork|lstm|transformer] [--split 0.8] [--seed 42] [--dataset records.jsonl | --synthetic N] [--set key=value]... [--out model.json]".to_string()
}
