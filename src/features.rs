//! Demographic → feature vector codec.
//!
//! The vector is a concatenation of one-hot groups followed by a single age slot:
//! gender (4), region (4), education (6), age bin (6), ethnicity (6), age (1).
//! Training and inference must agree on [`FEATURE_VERSION`] and [`FEATURE_VECTOR_LEN`].

use serde::{Deserialize, Serialize};

use crate::demographic::{AgeBin, Demographic, EducationLevel, Ethnicity, Gender, Region};

/// Layout version of the encoded vector.
pub const FEATURE_VERSION: i64 = 1;
/// Number of `f32` values per encoded vector.
pub const FEATURE_VECTOR_LEN: usize = 27;
/// Index of the (scaled) age slot.
pub const AGE_INDEX: usize = FEATURE_VECTOR_LEN - 1;

/// Field names in vector order.
pub const FEATURE_NAMES: [&str; FEATURE_VECTOR_LEN] = [
    "gender_male",
    "gender_female",
    "gender_nonbinary",
    "gender_other",
    "region_northeast",
    "region_midwest",
    "region_south",
    "region_west",
    "education_high_school",
    "education_some_college",
    "education_bachelors",
    "education_masters",
    "education_doctorate",
    "education_other",
    "age_18_24",
    "age_25_34",
    "age_35_44",
    "age_45_54",
    "age_55_64",
    "age_65_plus",
    "ethnicity_white",
    "ethnicity_black",
    "ethnicity_hispanic",
    "ethnicity_asian",
    "ethnicity_middle_eastern",
    "ethnicity_other",
    "age",
];

/// Index ranges of the one-hot groups, in vector order.
pub const ONE_HOT_GROUPS: [(&str, std::ops::Range<usize>); 5] = [
    ("gender", 0..4),
    ("region", 4..8),
    ("education", 8..14),
    ("age_bin", 14..20),
    ("ethnicity", 20..26),
];

/// Min–max bounds of the age field over a training corpus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgeScale {
    pub min: f32,
    pub max: f32,
}

impl AgeScale {
    /// Bounds over a set of raw ages; `None` for an empty set.
    pub fn from_ages(ages: impl IntoIterator<Item = f32>) -> Option<Self> {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for age in ages {
            min = min.min(age);
            max = max.max(age);
        }
        (min.is_finite() && max.is_finite()).then_some(Self { min, max })
    }

    /// Scale a raw age into `[0, 1]`; a degenerate range maps to 0.5.
    pub fn apply(&self, age: f32) -> f32 {
        if self.max <= self.min {
            return 0.5;
        }
        ((age - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
    }

    pub fn contains(&self, age: f32) -> bool {
        age >= self.min && age <= self.max
    }
}

/// Stateless demographic encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureCodec;

impl FeatureCodec {
    pub fn version(&self) -> i64 {
        FEATURE_VERSION
    }

    pub fn len(&self) -> usize {
        FEATURE_VECTOR_LEN
    }

    pub fn field_names(&self) -> &'static [&'static str] {
        &FEATURE_NAMES
    }

    /// Encode with the raw age in the last slot.
    pub fn encode(&self, demographic: &Demographic) -> Vec<f32> {
        let mut out = Vec::with_capacity(FEATURE_VECTOR_LEN);
        one_hot(&mut out, &Gender::ALL, &demographic.gender);
        one_hot(&mut out, &Region::ALL, &demographic.location);
        one_hot(&mut out, &EducationLevel::ALL, &demographic.education_level);
        one_hot(&mut out, &AgeBin::ENCODED, &demographic.age_bin());
        one_hot(&mut out, &Ethnicity::ALL, &demographic.ethnicity);
        out.push(demographic.age as f32);
        debug_assert_eq!(out.len(), FEATURE_VECTOR_LEN);
        out
    }

    /// Encode and rescale the age slot with training-time bounds.
    pub fn encode_scaled(&self, demographic: &Demographic, scale: &AgeScale) -> Vec<f32> {
        let mut out = self.encode(demographic);
        out[AGE_INDEX] = scale.apply(out[AGE_INDEX]);
        out
    }
}

fn one_hot<T: PartialEq>(out: &mut Vec<f32>, categories: &[T], value: &T) {
    out.extend(
        categories
            .iter()
            .map(|category| if category == value { 1.0 } else { 0.0 }),
    );
}
