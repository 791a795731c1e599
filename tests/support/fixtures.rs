use namecast::demographic::{Demographic, RawRecord};
use namecast::training::{Hyperparameters, ModelType, TrainingOptions};

/// Records whose name is fully determined by gender; every other attribute is constant.
pub fn separable_records(per_class: usize) -> Vec<RawRecord> {
    let mut records = Vec::with_capacity(per_class * 3);
    for (gender, name) in [("male", "Adam"), ("female", "Beth"), ("nonbinary", "Casey")] {
        for _ in 0..per_class {
            let record = serde_json::json!({
                "demographic": {
                    "age": 35,
                    "gender": gender,
                    "location": "Midwest",
                    "educationLevel": "bachelors",
                    "ethnicity": "White",
                },
                "name": name,
            });
            records.push(serde_json::from_value(record).expect("valid record"));
        }
    }
    records
}

pub fn demographic() -> Demographic {
    Demographic::new(34, "female", "West", "masters", "Asian")
}

/// Options tuned to keep test runs short.
pub fn quick_options(model_type: ModelType, split: f64, seed: u64) -> TrainingOptions {
    let hyperparameters = match model_type {
        ModelType::RandomForest => Hyperparameters::new().with("numTrees", 10),
        _ => Hyperparameters::new(),
    };
    TrainingOptions::new(model_type, split)
        .with_seed(seed)
        .with_hyperparameters(hyperparameters)
}
