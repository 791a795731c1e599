//! `namecast` command line: JSON requests in, JSON responses out.
//!
//! ```text
//! namecast train   [--request FILE] [--out MODEL]
//! namecast predict --model MODEL [--request FILE]
//! namecast stats   [--dataset FILE]
//! ```
//! Request bodies are read from `--request` or stdin.

use std::io::Read;
use std::path::PathBuf;

use namecast::NameService;
use namecast::api::{self, ApiResponse};
use namecast::config::{self, AppConfig};
use namecast::dataset::DatasetSource;
use namecast::logging::{self, LoggingOptions};
use namecast::ml::CancelToken;

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Train,
    Predict,
    Stats,
}

#[derive(Debug, Clone)]
struct CliOptions {
    command: Command,
    request: Option<PathBuf>,
    model: Option<PathBuf>,
    out: Option<PathBuf>,
    dataset: Option<PathBuf>,
    quiet: bool,
}

/// Returns whether the request succeeded.
fn run() -> Result<bool, String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    let mut config = config::load_or_default().unwrap_or_else(|err| {
        eprintln!("Using default settings: {err}");
        AppConfig::default()
    });
    if let Some(path) = &options.dataset {
        config.training.dataset_path = Some(path.clone());
    }
    let mut logging_options = LoggingOptions::from(&config.logging);
    if options.quiet {
        logging_options.default_filter = "warn".to_string();
    }
    if let Err(err) = logging::init(&logging_options) {
        eprintln!("Logging disabled: {err}");
    }

    let service = NameService::from_config(&config);

    let response = match options.command {
        Command::Stats => api::handle_stats(&service),
        Command::Train => {
            let body = read_request(options.request.as_ref())?;
            let response = api::handle_train(&service, &body, &CancelToken::new());
            let trained = service.registry().populated().first().copied();
            if let (true, Some(out), Some(family)) = (response.is_success(), &options.out, trained) {
                service
                    .save_model(family, out)
                    .map_err(|err| format!("Failed to save model: {err}"))?;
            }
            response
        }
        Command::Predict => {
            let model = options
                .model
                .as_ref()
                .ok_or_else(|| "predict requires --model".to_string())?;
            service
                .load_model(model)
                .map_err(|err| format!("Failed to load model {}: {err}", model.display()))?;
            let body = read_request(options.request.as_ref())?;
            api::handle_predict(&service, &body)
        }
    };
    print_response(&response)?;
    Ok(response.is_success())
}

fn print_response(response: &ApiResponse) -> Result<(), String> {
    let text = serde_json::to_string_pretty(&response.body).map_err(|err| err.to_string())?;
    println!("{text}");
    if !response.is_success() {
        eprintln!("status {}", response.status);
    }
    Ok(())
}

fn read_request(path: Option<&PathBuf>) -> Result<String, String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|err| format!("Failed to read {}: {err}", path.display())),
        None => {
            let mut body = String::new();
            std::io::stdin()
                .read_to_string(&mut body)
                .map_err(|err| format!("Failed to read stdin: {err}"))?;
            Ok(body)
        }
    }
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut command = None;
    let mut request = None;
    let mut model = None;
    let mut out = None;
    let mut dataset = None;
    let mut quiet = false;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "-q" | "--quiet" => quiet = true,
            "--request" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--request requires a value".to_string())?;
                request = Some(PathBuf::from(value));
            }
            "--model" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--model requires a value".to_string())?;
                model = Some(PathBuf::from(value));
            }
            "--out" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--out requires a value".to_string())?;
                out = Some(PathBuf::from(value));
            }
            "--dataset" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--dataset requires a value".to_string())?;
                dataset = Some(PathBuf::from(value));
            }
            "train" if command.is_none() => command = Some(Command::Train),
            "predict" if command.is_none() => command = Some(Command::Predict),
            "stats" if command.is_none() => command = Some(Command::Stats),
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    let command = command.ok_or_else(help_text)?;
    Ok(CliOptions {
        command,
        request,
        model,
        out,
        dataset,
        quiet,
    })
}

fn help_text() -> String {
    format!(
        "namecast <train|predict|stats> [options]\n\n\
Options:\n  \
--request <file>   JSON request body (default: stdin)\n  \
--model <file>     Model artifact to serve (predict)\n  \
--out <file>       Save the trained model here (train)\n  \
--dataset <file>   JSON/JSONL records instead of the configured source\n  \
-q, --quiet        Only log warnings and errors\n\n\
Default dataset: {}",
        DatasetSource::default().describe()
    )
}
