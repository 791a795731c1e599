//! Seeded synthetic corpus for tests, benchmarks and demos.
//!
//! Names are drawn from small pools keyed by gender and ethnicity so the data carries a learnable
//! signal, with a slice of records assigned a name from another pool as noise.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use crate::demographic::{
    Demographic, EducationLevel, Ethnicity, Gender, LabeledRecord, RawRecord, Region,
};

const NOISE_RATE: f64 = 0.1;

fn name_pool(gender: Gender, ethnicity: Ethnicity) -> &'static [&'static str] {
    match (gender, ethnicity) {
        (Gender::Male, Ethnicity::White) => &["Michael", "Richard", "John"],
        (Gender::Male, Ethnicity::Black) => &["James", "Andre", "Darnell"],
        (Gender::Male, Ethnicity::Hispanic) => &["Carlos", "Jose", "Miguel"],
        (Gender::Male, Ethnicity::Asian) => &["David", "Kenji", "Wei"],
        (Gender::Male, Ethnicity::MiddleEastern) => &["Ali", "Omar", "Karim"],
        (Gender::Female, Ethnicity::White) => &["Karen", "Sarah", "Betty"],
        (Gender::Female, Ethnicity::Black) => &["Michelle", "Keisha", "Latisha"],
        (Gender::Female, Ethnicity::Hispanic) => &["Maria", "Lucia", "Sofia"],
        (Gender::Female, Ethnicity::Asian) => &["Jennifer", "Kim", "Mei"],
        (Gender::Female, Ethnicity::MiddleEastern) => &["Layla", "Fatima", "Noor"],
        (Gender::Male, _) => &["Daniel", "Chris"],
        (Gender::Female, _) => &["Emily", "Anna"],
        _ => &["Taylor", "Sam", "Alex", "Jordan"],
    }
}

/// Generate `size` valid records; the same seed always yields the same records.
pub fn records(size: usize, seed: u64) -> Vec<LabeledRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let genders = [Gender::Male, Gender::Female, Gender::Male, Gender::Female, Gender::Nonbinary];
    (0..size)
        .map(|_| {
            let gender = *genders.choose(&mut rng).unwrap_or(&Gender::Other);
            let ethnicity = *Ethnicity::ALL.choose(&mut rng).unwrap_or(&Ethnicity::Other);
            let location = *Region::ALL.choose(&mut rng).unwrap_or(&Region::South);
            let education = *EducationLevel::ALL
                .choose(&mut rng)
                .unwrap_or(&EducationLevel::Other);
            let age = rng.random_range(18..=80);
            let pool = if rng.random_bool(NOISE_RATE) {
                let other = *Ethnicity::ALL.choose(&mut rng).unwrap_or(&Ethnicity::Other);
                name_pool(gender, other)
            } else {
                name_pool(gender, ethnicity)
            };
            let name = pool.choose(&mut rng).copied().unwrap_or("Alex");
            LabeledRecord {
                demographic: Demographic {
                    age,
                    gender,
                    location,
                    education_level: education,
                    ethnicity,
                },
                name: name.to_string(),
            }
        })
        .collect()
}

pub fn raw_records(size: usize, seed: u64) -> Vec<RawRecord> {
    records(size, seed).iter().map(RawRecord::from).collect()
}
