mod support;

use std::sync::Arc;
use std::thread;

use namecast::dataset::{DatasetSource, synthetic};
use namecast::demographic::RawRecord;
use namecast::ml::{CancelToken, ModelFamily};
use namecast::predict::PredictionAggregator;
use namecast::training::{ModelType, TrainingOptions, TrainingOrchestrator};
use namecast::{ModelRegistry, NamecastError};
use support::fixtures::{demographic, quick_options, separable_records};

const FAMILIES: [ModelType; 3] = [
    ModelType::RandomForest,
    ModelType::GradientBoosting,
    ModelType::NeuralNetwork,
];

#[test]
fn forest_on_synthetic_records_reports_bounded_metrics() {
    let registry = ModelRegistry::new();
    let orchestrator = TrainingOrchestrator::new(DatasetSource::Synthetic {
        size: 100,
        seed: 17,
    });
    let metrics = orchestrator
        .train_models(
            &registry,
            &TrainingOptions::new(ModelType::RandomForest, 0.8),
            &CancelToken::new(),
        )
        .unwrap();

    assert!((0.0..=1.0).contains(&metrics.accuracy));
    assert!((0.0..=1.0).contains(&metrics.precision));
    assert!((0.0..=1.0).contains(&metrics.f1_score));
    assert_eq!(metrics.train_size, 80);
    assert_eq!(metrics.test_size, 20);
    let cells: u32 = metrics.confusion_matrix.iter().flatten().sum();
    assert_eq!(cells, 20);
    assert_eq!(metrics.model_used, "Random Forest");
    assert!(registry.get(ModelFamily::RandomForest).is_some());
}

#[test]
fn network_predictions_are_ranked() {
    let registry = ModelRegistry::new();
    let orchestrator = TrainingOrchestrator::new(DatasetSource::Synthetic {
        size: 100,
        seed: 3,
    });
    orchestrator
        .train_models(
            &registry,
            &TrainingOptions::new(ModelType::NeuralNetwork, 0.8),
            &CancelToken::new(),
        )
        .unwrap();

    let result = PredictionAggregator::default()
        .predict_name(&registry, &demographic())
        .unwrap();
    assert_eq!(result.names.len(), 5);
    assert!(result.names.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    assert_eq!(result.metadata.model_used, "Neural Network");
    assert!((0.0..=1.0).contains(&result.metadata.confidence));
}

#[test]
fn predicting_before_training_fails() {
    let err = PredictionAggregator::default()
        .predict_name(&ModelRegistry::new(), &demographic())
        .unwrap_err();
    assert!(matches!(err, NamecastError::NoTrainedModel));
}

#[test]
fn invalid_split_leaves_registry_untouched() {
    let registry = ModelRegistry::new();
    let err = TrainingOrchestrator::default()
        .train_models(
            &registry,
            &TrainingOptions::new(ModelType::RandomForest, 1.5),
            &CancelToken::new(),
        )
        .unwrap_err();
    assert!(matches!(err, NamecastError::Configuration(_)));
    assert!(registry.is_empty());
}

#[test]
fn same_seed_reproduces_metrics() {
    let raw = synthetic::raw_records(60, 8);
    let orchestrator = TrainingOrchestrator::default();
    for model_type in FAMILIES {
        let options = quick_options(model_type, 0.75, 21);
        let first = orchestrator
            .train_on_records(&ModelRegistry::new(), &raw, &options, &CancelToken::new())
            .unwrap();
        let second = orchestrator
            .train_on_records(&ModelRegistry::new(), &raw, &options, &CancelToken::new())
            .unwrap();
        assert_eq!(first.accuracy, second.accuracy, "{model_type}");
        assert_eq!(first.confusion_matrix, second.confusion_matrix, "{model_type}");
        assert_eq!(first.bias_metrics, second.bias_metrics, "{model_type}");
    }
}

#[test]
fn separable_data_is_learned_perfectly() {
    let raw = separable_records(10);
    let orchestrator = TrainingOrchestrator::default();
    for model_type in FAMILIES {
        let registry = ModelRegistry::new();
        let metrics = orchestrator
            .train_on_records(
                &registry,
                &raw,
                &quick_options(model_type, 0.8, 5),
                &CancelToken::new(),
            )
            .unwrap();
        assert_eq!(metrics.test_size, 6);
        assert_eq!(metrics.accuracy, 1.0, "{model_type}");
        assert_eq!(metrics.bias_metrics.gender_bias, 0.0, "{model_type}");
    }
}

#[test]
fn every_family_ranks_by_confidence() {
    let raw = synthetic::raw_records(80, 12);
    let orchestrator = TrainingOrchestrator::default();
    for model_type in FAMILIES {
        let registry = ModelRegistry::new();
        orchestrator
            .train_on_records(
                &registry,
                &raw,
                &quick_options(model_type, 0.8, 2),
                &CancelToken::new(),
            )
            .unwrap();
        let result = PredictionAggregator::new(10)
            .predict_name(&registry, &demographic())
            .unwrap();
        assert!(!result.names.is_empty());
        assert!(
            result.names.windows(2).all(|w| w[0].confidence >= w[1].confidence),
            "{model_type}"
        );
        assert!(result.names.iter().all(|n| (0.0..=1.0).contains(&n.confidence)));
    }
}

#[test]
fn sequence_models_fall_back_to_network() {
    let registry = ModelRegistry::new();
    let metrics = TrainingOrchestrator::default()
        .train_on_records(
            &registry,
            &separable_records(6),
            &TrainingOptions::new(ModelType::Lstm, 0.8).with_seed(1),
            &CancelToken::new(),
        )
        .unwrap();
    assert_eq!(metrics.model_used, "Neural Network");
    assert_eq!(metrics.notices.len(), 1);
    assert!(registry.get(ModelFamily::NeuralNetwork).is_some());
}

#[test]
fn cancelled_training_installs_nothing() {
    let registry = ModelRegistry::new();
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = TrainingOrchestrator::default()
        .train_models(
            &registry,
            &TrainingOptions::new(ModelType::GradientBoosting, 0.8),
            &cancel,
        )
        .unwrap_err();
    assert!(matches!(err, NamecastError::Cancelled));
    assert!(registry.is_empty());
}

#[test]
fn all_invalid_records_are_not_trainable() {
    let raw: Vec<RawRecord> = (0..5)
        .map(|_| serde_json::from_value(serde_json::json!({"name": "Ghost"})).unwrap())
        .collect();
    let err = TrainingOrchestrator::default()
        .train_on_records(
            &ModelRegistry::new(),
            &raw,
            &TrainingOptions::new(ModelType::RandomForest, 0.8),
            &CancelToken::new(),
        )
        .unwrap_err();
    assert!(matches!(err, NamecastError::NoTrainableData(_)));
}

#[test]
fn concurrent_training_and_prediction_share_a_registry() {
    let registry = Arc::new(ModelRegistry::new());
    let raw = Arc::new(synthetic::raw_records(60, 30));
    let trainers: Vec<_> = [ModelType::RandomForest, ModelType::GradientBoosting]
        .into_iter()
        .map(|model_type| {
            let registry = Arc::clone(&registry);
            let raw = Arc::clone(&raw);
            thread::spawn(move || {
                TrainingOrchestrator::default()
                    .train_on_records(
                        &registry,
                        &raw,
                        &quick_options(model_type, 0.8, 9),
                        &CancelToken::new(),
                    )
                    .unwrap()
            })
        })
        .collect();
    for trainer in trainers {
        trainer.join().unwrap();
    }
    assert_eq!(
        registry.populated(),
        vec![ModelFamily::GradientBoosting, ModelFamily::RandomForest]
    );
    let result = PredictionAggregator::default()
        .predict_name(&registry, &demographic())
        .unwrap();
    assert_eq!(result.metadata.model_used, "Gradient Boosting");
}
