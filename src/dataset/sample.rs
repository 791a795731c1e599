//! Bundled demonstration corpus.

use crate::demographic::{Demographic, LabeledRecord, RawRecord};

/// `(age, gender, region, education, ethnicity, name)`
const SAMPLE: [(u32, &str, &str, &str, &str, &str); 20] = [
    (25, "male", "Northeast", "bachelors", "White", "Michael"),
    (32, "female", "Midwest", "masters", "Black", "Michelle"),
    (45, "male", "South", "high-school", "Hispanic", "Robert"),
    (67, "female", "West", "doctorate", "Asian", "Elizabeth"),
    (29, "nonbinary", "Northeast", "bachelors", "Middle Eastern", "Taylor"),
    (52, "female", "Midwest", "bachelors", "White", "Karen"),
    (38, "male", "South", "some-college", "Black", "James"),
    (41, "female", "West", "masters", "Asian", "Jennifer"),
    (19, "male", "Northeast", "some-college", "Hispanic", "Carlos"),
    (73, "female", "South", "high-school", "White", "Betty"),
    (28, "male", "West", "bachelors", "Asian", "David"),
    (35, "female", "Northeast", "masters", "Black", "Latisha"),
    (42, "male", "South", "some-college", "Hispanic", "Miguel"),
    (31, "female", "Midwest", "bachelors", "White", "Sarah"),
    (27, "nonbinary", "West", "masters", "Middle Eastern", "Sam"),
    (55, "male", "Northeast", "doctorate", "White", "Richard"),
    (48, "female", "South", "bachelors", "Black", "Keisha"),
    (33, "male", "Midwest", "high-school", "Hispanic", "Jose"),
    (40, "female", "West", "some-college", "Asian", "Kim"),
    (22, "male", "Northeast", "some-college", "Middle Eastern", "Ali"),
];

/// The sample corpus as validated records.
pub fn records() -> Vec<LabeledRecord> {
    SAMPLE
        .iter()
        .map(|&(age, gender, region, education, ethnicity, name)| LabeledRecord {
            demographic: Demographic::new(age, gender, region, education, ethnicity),
            name: name.to_string(),
        })
        .collect()
}

/// The sample corpus in raw input form.
pub fn raw_records() -> Vec<RawRecord> {
    records().iter().map(RawRecord::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_sample_record_is_valid_and_named_uniquely() {
        let raw = raw_records();
        assert_eq!(raw.len(), 20);
        let mut names: Vec<String> = raw
            .iter()
            .map(|record| record.validate().unwrap().name)
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 20);
    }
}
