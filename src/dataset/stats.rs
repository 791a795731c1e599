use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::demographic::{
    AgeBin, EducationLevel, Ethnicity, Gender, RawDemographic, RawRecord, Region,
};

/// Summary of a raw dataset, computed from the records themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetStats {
    pub total_records: usize,
    pub unique_names: usize,
    /// Missing or mistyped values per demographic field.
    pub missing_values: BTreeMap<String, usize>,
    pub age_distribution: BTreeMap<String, usize>,
    pub gender_distribution: BTreeMap<String, usize>,
    pub location_distribution: BTreeMap<String, usize>,
    pub education_distribution: BTreeMap<String, usize>,
    pub ethnicity_distribution: BTreeMap<String, usize>,
}

impl DatasetStats {
    pub fn from_records(records: &[RawRecord]) -> Self {
        let mut missing: BTreeMap<String, usize> = ["age", "gender", "location", "educationLevel", "ethnicity"]
            .into_iter()
            .map(|field| (field.to_string(), 0))
            .collect();
        let mut age_distribution: BTreeMap<String, usize> = AgeBin::ENCODED
            .iter()
            .map(|bin| (bin.as_str().to_string(), 0))
            .collect();
        let mut gender_distribution = BTreeMap::new();
        let mut location_distribution = BTreeMap::new();
        let mut education_distribution = BTreeMap::new();
        let mut ethnicity_distribution = BTreeMap::new();
        let mut names = BTreeSet::new();

        let empty = RawDemographic::default();
        for record in records {
            if let Some(name) = record.name_text() {
                names.insert(name.trim().to_string());
            }
            let demo = record.demographic.as_ref().unwrap_or(&empty);

            match demo.age_value() {
                Some(age) => bump(&mut age_distribution, AgeBin::from_age(age).as_str()),
                None => bump(&mut missing, "age"),
            }
            match demo.gender_text() {
                Some(text) => bump(&mut gender_distribution, Gender::parse(text).as_str()),
                None => bump(&mut missing, "gender"),
            }
            match demo.location_text() {
                Some(text) => bump(&mut location_distribution, Region::parse(text).as_str()),
                None => bump(&mut missing, "location"),
            }
            match demo.education_text() {
                Some(text) => bump(
                    &mut education_distribution,
                    EducationLevel::parse(text).as_str(),
                ),
                None => bump(&mut missing, "educationLevel"),
            }
            match demo.ethnicity_text() {
                Some(text) => bump(&mut ethnicity_distribution, Ethnicity::parse(text).as_str()),
                None => bump(&mut missing, "ethnicity"),
            }
        }

        Self {
            total_records: records.len(),
            unique_names: names.len(),
            missing_values: missing,
            age_distribution,
            gender_distribution,
            location_distribution,
            education_distribution,
            ethnicity_distribution,
        }
    }
}

fn bump(map: &mut BTreeMap<String, usize>, key: &str) {
    *map.entry(key.to_string()).or_default() += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::sample;
    use serde_json::json;

    #[test]
    fn sample_corpus_stats_match_records() {
        let stats = DatasetStats::from_records(&sample::raw_records());
        assert_eq!(stats.total_records, 20);
        assert_eq!(stats.unique_names, 20);
        assert!(stats.missing_values.values().all(|&count| count == 0));
        assert_eq!(stats.age_distribution.values().sum::<usize>(), 20);
        assert_eq!(stats.gender_distribution["male"], 9);
        assert_eq!(stats.gender_distribution["nonbinary"], 2);
        assert_eq!(stats.age_distribution["65+"], 2);
        assert_eq!(stats.ethnicity_distribution["Middle Eastern"], 3);
    }

    #[test]
    fn missing_fields_are_counted() {
        let records: Vec<RawRecord> = vec![
            serde_json::from_value(json!({"demographic": {"age": "x", "gender": "male"}, "name": "Al"}))
                .unwrap(),
            serde_json::from_value(json!({"name": "Al"})).unwrap(),
        ];
        let stats = DatasetStats::from_records(&records);
        assert_eq!(stats.unique_names, 1);
        assert_eq!(stats.missing_values["age"], 2);
        assert_eq!(stats.missing_values["gender"], 1);
        assert_eq!(stats.missing_values["ethnicity"], 2);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let stats = DatasetStats::from_records(&[]);
        let value = serde_json::to_value(&stats).unwrap();
        assert!(value.get("totalRecords").is_some());
        assert!(value["missingValues"].get("educationLevel").is_some());
    }
}
