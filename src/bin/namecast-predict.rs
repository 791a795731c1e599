//! Developer utility to rank names for one demographic with a saved model.

use std::path::PathBuf;

use namecast::predict::PredictionAggregator;
use namecast::{Demographic, NameService};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    let service = NameService::new(
        Default::default(),
        Default::default(),
        PredictionAggregator::new(options.top_k),
    );
    let family = service
        .load_model(&options.model)
        .map_err(|err| format!("Failed to load {}: {err}", options.model.display()))?;
    let result = service
        .predict(&options.demographic)
        .map_err(|err| err.to_string())?;

    println!("model: {}", family.display_name());
    for name in &result.names {
        println!("{:>2}. {:<16} {:.3}", name.rank, name.name, name.confidence);
    }
    println!(
        "confidence={:.3}  data quality={:.2}",
        result.metadata.confidence, result.metadata.data_quality
    );
    Ok(())
}

#[derive(Debug, Clone)]
struct CliOptions {
    model: PathBuf,
    demographic: Demographic,
    top_k: usize,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut model = None;
    let mut age = None;
    let mut gender = String::from("other");
    let mut location = String::new();
    let mut education = String::from("other");
    let mut ethnicity = String::from("Other");
    let mut top_k = 5usize;

    let mut idx = 0usize;
    while idx < args.len() {
        let flag = args[idx].as_str();
        if matches!(flag, "-h" | "--help") {
            return Err(help_text());
        }
        idx += 1;
        let value = args
            .get(idx)
            .ok_or_else(|| format!("{flag} requires a value"))?
            .clone();
        match flag {
            "--model" => model = Some(PathBuf::from(value)),
            "--age" => {
                age = Some(
                    value
                        .parse::<u32>()
                        .map_err(|_| format!("Invalid --age value: {value}"))?,
                )
            }
            "--gender" => gender = value,
            "--location" => location = value,
            "--education" => education = value,
            "--ethnicity" => ethnicity = value,
            "--top" => {
                top_k = value
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid --top value: {value}"))?
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    let model = model.ok_or_else(|| format!("--model is required\n\n{}", help_text()))?;
    let age = age.ok_or_else(|| format!("--age is required\n\n{}", help_text()))?;
    Ok(CliOptions {
        model,
        demographic: Demographic::new(age, gender, location, education, ethnicity),
        top_k,
    })
}

fn help_text() -> String {
    "Usage: namecast-predict --model model.json --age N [--gender G] [--location REGION] [--education LEVEL] [--ethnicity E] [--top 5]".to_string()
}
