mod support;

use namecast::api::{self, STATUS_BAD_REQUEST, STATUS_CONFLICT, STATUS_OK, STATUS_UNPROCESSABLE};
use namecast::config::{self, AppConfig};
use namecast::dataset::{DatasetSource, synthetic};
use namecast::ml::{CancelToken, ModelFamily};
use namecast::predict::PredictionAggregator;
use namecast::{NameService, SlotPolicy, TrainedModel};
use serde_json::json;
use support::namecast_env::NamecastEnvGuard;

fn write_jsonl(path: &std::path::Path, size: usize, seed: u64) {
    let lines: Vec<String> = synthetic::raw_records(size, seed)
        .iter()
        .map(|record| serde_json::to_string(record).unwrap())
        .collect();
    std::fs::write(path, lines.join("\n")).unwrap();
}

#[test]
fn file_dataset_flows_through_train_predict_and_stats() {
    let dir = tempfile::tempdir().unwrap();
    let records = dir.path().join("records.jsonl");
    write_jsonl(&records, 50, 4);
    let service = NameService::new(
        DatasetSource::File(records),
        SlotPolicy::FixedPrecedence,
        PredictionAggregator::new(3),
    );

    let stats = api::handle_stats(&service);
    assert_eq!(stats.status, STATUS_OK);
    assert_eq!(stats.body["totalRecords"], json!(50));

    let trained = api::handle_train(
        &service,
        r#"{"modelType": "randomForest", "trainTestSplit": 0.6, "hyperparameters": {"numTrees": 8}, "seed": 1}"#,
        &CancelToken::new(),
    );
    assert_eq!(trained.status, STATUS_OK, "{}", trained.body);
    assert_eq!(trained.body["trainSize"], json!(30));
    assert_eq!(trained.body["testSize"], json!(20));

    let predicted = api::handle_predict(
        &service,
        r#"{"age": 52, "gender": "male", "location": "South", "educationLevel": "doctorate", "ethnicity": "Hispanic"}"#,
    );
    assert_eq!(predicted.status, STATUS_OK);
    let names = predicted.body["names"].as_array().unwrap();
    assert_eq!(names.len(), 3);
    assert_eq!(names[0]["rank"], json!(1));
    assert_eq!(predicted.body["metadata"]["modelUsed"], json!("Random Forest"));
}

#[test]
fn boundary_rejects_bad_requests_with_statuses() {
    let service = NameService::default();
    let cancel = CancelToken::new();

    let bad_split = api::handle_train(
        &service,
        r#"{"modelType": "neuralNetwork", "trainTestSplit": 1.5}"#,
        &cancel,
    );
    assert_eq!(bad_split.status, STATUS_BAD_REQUEST);
    assert_eq!(bad_split.body["kind"], json!("configuration"));

    let wrong_type = api::handle_train(&service, r#"{"modelType": 4, "trainTestSplit": 0.5}"#, &cancel);
    assert_eq!(wrong_type.status, STATUS_BAD_REQUEST);

    let bad_hyper = api::handle_train(
        &service,
        r#"{"modelType": "randomForest", "trainTestSplit": 0.5, "hyperparameters": {"numTrees": -2}}"#,
        &cancel,
    );
    assert_eq!(bad_hyper.status, STATUS_BAD_REQUEST);

    for body in [
        r#"{"modelType": "randomForest", "trainTestSplit": 0.8, "hyperparameters": {"numTrees": 18446744073709551615}}"#,
        r#"{"modelType": "gradientBoosting", "trainTestSplit": 0.8, "hyperparameters": {"numStages": 18446744073709551615}}"#,
        r#"{"modelType": "neuralNetwork", "trainTestSplit": 0.8, "hyperparameters": {"hiddenSize": 18446744073709551615}}"#,
    ] {
        let huge = api::handle_train(&service, body, &cancel);
        assert_eq!(huge.status, STATUS_BAD_REQUEST, "{}", huge.body);
        assert_eq!(huge.body["kind"], json!("configuration"));
    }

    let no_model = api::handle_predict(
        &service,
        r#"{"age": 20, "gender": "female", "location": "West", "educationLevel": "other", "ethnicity": "Black"}"#,
    );
    assert_eq!(no_model.status, STATUS_CONFLICT);
    assert!(service.registry().is_empty());
}

#[test]
fn empty_dataset_is_unprocessable() {
    let dir = tempfile::tempdir().unwrap();
    let records = dir.path().join("records.json");
    std::fs::write(&records, "[]").unwrap();
    let service = NameService::new(
        DatasetSource::File(records),
        SlotPolicy::default(),
        PredictionAggregator::default(),
    );
    let response = api::handle_train(
        &service,
        r#"{"modelType": "gradientBoosting", "trainTestSplit": 0.8}"#,
        &CancelToken::new(),
    );
    assert_eq!(response.status, STATUS_UNPROCESSABLE);
    assert_eq!(response.body["kind"], json!("no_trainable_data"));
}

#[test]
fn config_home_drives_service_settings_and_artifacts() {
    let temp = tempfile::tempdir().unwrap();
    let _env = NamecastEnvGuard::set_config_home(temp.path().to_path_buf());

    let mut settings = AppConfig::default();
    settings.training.synthetic_size = Some(40);
    settings.training.seed = 11;
    settings.inference.top_k = 2;
    config::save(&settings).unwrap();
    assert!(config::config_path().unwrap().starts_with(temp.path()));

    let loaded = config::load_or_default().unwrap();
    assert_eq!(loaded, settings);
    let service = NameService::from_config(&loaded);
    assert_eq!(service.stats().unwrap().total_records, 40);

    let trained = api::handle_train(
        &service,
        r#"{"modelType": "transformer", "trainTestSplit": 0.75, "hyperparameters": {"epochs": 40}}"#,
        &CancelToken::new(),
    );
    assert_eq!(trained.status, STATUS_OK, "{}", trained.body);
    assert_eq!(trained.body["modelUsed"], json!("Neural Network"));
    assert_eq!(trained.body["notices"].as_array().unwrap().len(), 1);

    let artifact = namecast::app_dirs::models_dir().unwrap().join("network.json");
    service.save_model(ModelFamily::NeuralNetwork, &artifact).unwrap();
    let restored = TrainedModel::load_json(&artifact).unwrap();
    assert_eq!(restored.family(), ModelFamily::NeuralNetwork);
    assert!(restored.metrics.is_some());

    let fresh = NameService::from_config(&loaded);
    fresh.load_model(&artifact).unwrap();
    let demo = support::fixtures::demographic();
    let result = fresh.predict(&demo).unwrap();
    assert_eq!(result.names.len(), 2);
    assert_eq!(result.names, service.predict(&demo).unwrap().names);
}
