use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::demographic::{Demographic, LabeledRecord, RawRecord};
use crate::error::{NamecastError, Result};
use crate::features::{AGE_INDEX, AgeScale, FeatureCodec};

/// An encoded example with its label and source demographic.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledVector {
    pub features: Vec<f32>,
    pub label: String,
    pub demographic: Demographic,
}

/// Train/test partitions plus the age bounds used to scale them.
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    pub train: Vec<LabeledVector>,
    pub test: Vec<LabeledVector>,
    pub age_scale: AgeScale,
    /// Raw records dropped for missing or mistyped fields.
    pub discarded: usize,
}

/// Reject split ratios outside the open interval `(0, 1)`.
pub fn validate_split_ratio(ratio: f64) -> Result<()> {
    if ratio.is_finite() && ratio > 0.0 && ratio < 1.0 {
        Ok(())
    } else {
        Err(NamecastError::config(format!(
            "trainTestSplit must be between 0 and 1 (exclusive), got {ratio}"
        )))
    }
}

/// Cleans, encodes, scales, shuffles and splits raw records.
#[derive(Debug, Clone, Default)]
pub struct DatasetPreparer {
    codec: FeatureCodec,
}

impl DatasetPreparer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn codec(&self) -> &FeatureCodec {
        &self.codec
    }

    /// Filter invalid records, then encode and split the survivors.
    pub fn prepare<R: Rng + ?Sized>(
        &self,
        raw: &[RawRecord],
        split_ratio: f64,
        rng: &mut R,
    ) -> Result<PreparedDataset> {
        validate_split_ratio(split_ratio)?;
        let records: Vec<LabeledRecord> = raw.iter().filter_map(RawRecord::validate).collect();
        let discarded = raw.len() - records.len();
        if discarded > 0 {
            debug!(discarded, kept = records.len(), "dropped invalid records");
        }
        let mut prepared = self.prepare_records(&records, split_ratio, rng)?;
        prepared.discarded = discarded;
        Ok(prepared)
    }

    /// Encode and split records that are already known to be valid.
    pub fn prepare_records<R: Rng + ?Sized>(
        &self,
        records: &[LabeledRecord],
        split_ratio: f64,
        rng: &mut R,
    ) -> Result<PreparedDataset> {
        validate_split_ratio(split_ratio)?;
        let age_scale = AgeScale::from_ages(records.iter().map(|r| r.demographic.age as f32))
            .ok_or_else(|| NamecastError::no_data("no valid records after filtering"))?;

        let mut examples: Vec<LabeledVector> = records
            .iter()
            .map(|record| {
                let mut features = self.codec.encode(&record.demographic);
                features[AGE_INDEX] = age_scale.apply(features[AGE_INDEX]);
                LabeledVector {
                    features,
                    label: record.name.clone(),
                    demographic: record.demographic.clone(),
                }
            })
            .collect();
        examples.shuffle(rng);

        let split_at = (examples.len() as f64 * split_ratio).floor() as usize;
        let test = examples.split_off(split_at.min(examples.len()));
        Ok(PreparedDataset {
            train: examples,
            test,
            age_scale,
            discarded: 0,
        })
    }
}
