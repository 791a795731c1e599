//! Demographic value types and the loosely typed raw record form.
//!
//! Categorical fields parse totally: text that matches no known category becomes an
//! explicit unrecognized value instead of an error, so encoding never fails.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gender category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Gender {
    Male,
    Female,
    Nonbinary,
    Other,
    Unrecognized,
}

impl Gender {
    /// Categories in feature-vector order.
    pub const ALL: [Gender; 4] = [Self::Male, Self::Female, Self::Nonbinary, Self::Other];

    pub fn parse(value: &str) -> Self {
        match normalize(value).as_str() {
            "male" | "m" => Self::Male,
            "female" | "f" => Self::Female,
            "nonbinary" | "non-binary" | "non binary" => Self::Nonbinary,
            "other" => Self::Other,
            _ => Self::Unrecognized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Nonbinary => "nonbinary",
            Self::Other => "other",
            Self::Unrecognized => "unrecognized",
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized)
    }
}

/// US census region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Region {
    Northeast,
    Midwest,
    South,
    West,
    Unrecognized,
}

impl Region {
    pub const ALL: [Region; 4] = [Self::Northeast, Self::Midwest, Self::South, Self::West];

    pub fn parse(value: &str) -> Self {
        match normalize(value).as_str() {
            "northeast" | "north east" => Self::Northeast,
            "midwest" | "mid west" => Self::Midwest,
            "south" => Self::South,
            "west" => Self::West,
            _ => Self::Unrecognized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Northeast => "Northeast",
            Self::Midwest => "Midwest",
            Self::South => "South",
            Self::West => "West",
            Self::Unrecognized => "unrecognized",
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized)
    }
}

/// Highest completed education level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EducationLevel {
    HighSchool,
    SomeCollege,
    Bachelors,
    Masters,
    Doctorate,
    Other,
    Unrecognized,
}

impl EducationLevel {
    pub const ALL: [EducationLevel; 6] = [
        Self::HighSchool,
        Self::SomeCollege,
        Self::Bachelors,
        Self::Masters,
        Self::Doctorate,
        Self::Other,
    ];

    pub fn parse(value: &str) -> Self {
        match normalize(value).as_str() {
            "high-school" | "high school" | "highschool" => Self::HighSchool,
            "some-college" | "some college" => Self::SomeCollege,
            "bachelors" | "bachelor's" | "bachelor" => Self::Bachelors,
            "masters" | "master's" | "master" => Self::Masters,
            "doctorate" | "phd" => Self::Doctorate,
            "other" => Self::Other,
            _ => Self::Unrecognized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighSchool => "high-school",
            Self::SomeCollege => "some-college",
            Self::Bachelors => "bachelors",
            Self::Masters => "masters",
            Self::Doctorate => "doctorate",
            Self::Other => "other",
            Self::Unrecognized => "unrecognized",
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized)
    }
}

/// Ethnicity group. Anything outside the named groups folds into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Ethnicity {
    White,
    Black,
    Hispanic,
    Asian,
    MiddleEastern,
    Other,
}

impl Ethnicity {
    pub const ALL: [Ethnicity; 6] = [
        Self::White,
        Self::Black,
        Self::Hispanic,
        Self::Asian,
        Self::MiddleEastern,
        Self::Other,
    ];

    pub fn parse(value: &str) -> Self {
        match normalize(value).as_str() {
            "white" => Self::White,
            "black" => Self::Black,
            "hispanic" => Self::Hispanic,
            "asian" => Self::Asian,
            "middle eastern" | "middle-eastern" | "middleeastern" => Self::MiddleEastern,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::White => "White",
            Self::Black => "Black",
            Self::Hispanic => "Hispanic",
            Self::Asian => "Asian",
            Self::MiddleEastern => "Middle Eastern",
            Self::Other => "Other",
        }
    }
}

/// Fixed age buckets used by the codec and by bias grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgeBin {
    Under18,
    From18To24,
    From25To34,
    From35To44,
    From45To54,
    From55To64,
    From65,
}

impl AgeBin {
    /// Bins carried in the feature vector; `Under18` encodes as all zeros.
    pub const ENCODED: [AgeBin; 6] = [
        Self::From18To24,
        Self::From25To34,
        Self::From35To44,
        Self::From45To54,
        Self::From55To64,
        Self::From65,
    ];

    pub fn from_age(age: u32) -> Self {
        match age {
            0..=17 => Self::Under18,
            18..=24 => Self::From18To24,
            25..=34 => Self::From25To34,
            35..=44 => Self::From35To44,
            45..=54 => Self::From45To54,
            55..=64 => Self::From55To64,
            _ => Self::From65,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Under18 => "under-18",
            Self::From18To24 => "18-24",
            Self::From25To34 => "25-34",
            Self::From35To44 => "35-44",
            Self::From45To54 => "45-54",
            Self::From55To64 => "55-64",
            Self::From65 => "65+",
        }
    }
}

macro_rules! string_conversions {
    ($($ty:ty),*) => {
        $(
            impl From<String> for $ty {
                fn from(value: String) -> Self {
                    Self::parse(&value)
                }
            }

            impl From<&str> for $ty {
                fn from(value: &str) -> Self {
                    Self::parse(value)
                }
            }

            impl From<$ty> for String {
                fn from(value: $ty) -> Self {
                    value.as_str().to_string()
                }
            }

            impl std::fmt::Display for $ty {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

string_conversions!(Gender, Region, EducationLevel, Ethnicity);

fn normalize(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

/// A person described by the attributes the models consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Demographic {
    pub age: u32,
    pub gender: Gender,
    pub location: Region,
    pub education_level: EducationLevel,
    pub ethnicity: Ethnicity,
}

impl Demographic {
    pub fn new(
        age: u32,
        gender: impl Into<Gender>,
        location: impl Into<Region>,
        education_level: impl Into<EducationLevel>,
        ethnicity: impl Into<Ethnicity>,
    ) -> Self {
        Self {
            age,
            gender: gender.into(),
            location: location.into(),
            education_level: education_level.into(),
            ethnicity: ethnicity.into(),
        }
    }

    pub fn age_bin(&self) -> AgeBin {
        AgeBin::from_age(self.age)
    }
}

/// A demographic paired with its given-name label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledRecord {
    pub demographic: Demographic,
    pub name: String,
}

/// Untrusted record as it arrives from a dataset file; any field may be missing or mistyped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub demographic: Option<RawDemographic>,
    #[serde(default)]
    pub name: Option<Value>,
}

/// Untyped demographic fields of a [`RawRecord`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDemographic {
    #[serde(default)]
    pub age: Option<Value>,
    #[serde(default)]
    pub gender: Option<Value>,
    #[serde(default)]
    pub location: Option<Value>,
    #[serde(default, alias = "education_level")]
    pub education_level: Option<Value>,
    #[serde(default)]
    pub ethnicity: Option<Value>,
}

impl RawDemographic {
    /// Age as a non-negative whole number, if present and numeric.
    pub fn age_value(&self) -> Option<u32> {
        let age = self.age.as_ref()?.as_f64()?;
        if !age.is_finite() || age < 0.0 || age > u32::MAX as f64 {
            return None;
        }
        Some(age.floor() as u32)
    }

    pub fn gender_text(&self) -> Option<&str> {
        non_empty_text(self.gender.as_ref())
    }

    pub fn location_text(&self) -> Option<&str> {
        non_empty_text(self.location.as_ref())
    }

    pub fn education_text(&self) -> Option<&str> {
        non_empty_text(self.education_level.as_ref())
    }

    pub fn ethnicity_text(&self) -> Option<&str> {
        non_empty_text(self.ethnicity.as_ref())
    }
}

impl RawRecord {
    pub fn name_text(&self) -> Option<&str> {
        non_empty_text(self.name.as_ref())
    }

    /// Convert into a trainable record; `None` when any required field is missing or mistyped.
    pub fn validate(&self) -> Option<LabeledRecord> {
        let demo = self.demographic.as_ref()?;
        let demographic = Demographic::new(
            demo.age_value()?,
            demo.gender_text()?,
            demo.location_text()?,
            demo.education_text()?,
            demo.ethnicity_text()?,
        );
        Some(LabeledRecord {
            demographic,
            name: self.name_text()?.trim().to_string(),
        })
    }
}

impl From<&LabeledRecord> for RawRecord {
    fn from(record: &LabeledRecord) -> Self {
        let demo = &record.demographic;
        Self {
            demographic: Some(RawDemographic {
                age: Some(Value::from(demo.age)),
                gender: Some(Value::from(demo.gender.as_str())),
                location: Some(Value::from(demo.location.as_str())),
                education_level: Some(Value::from(demo.education_level.as_str())),
                ethnicity: Some(Value::from(demo.ethnicity.as_str())),
            }),
            name: Some(Value::from(record.name.as_str())),
        }
    }
}

fn non_empty_text(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
}
