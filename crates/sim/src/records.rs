//! Record sources: JSON files and a seeded synthetic generator

use std::{fs, path::Path};

use common::prelude::{EntityId, Record};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;

pub const DIAGNOSES: &[&str] = &[
    "Acute Kidney Failure",
    "Hypertension",
    "Atrial Fibrillation",
    "Sepsis",
    "Pneumonia",
    "Coronary Artery Disease",
    "Diabetes Mellitus",
];

pub const MEDICATIONS: &[&str] = &[
    "Metoprolol",
    "Furosemide",
    "Insulin",
    "Vancomycin",
    "Lisinopril",
];

const FIRST_PATIENT: usize = 10000;

#[derive(Debug, thiserror::Error)]
pub enum RecordsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid record file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read a JSON array of records
pub fn load(path: &Path) -> Result<Vec<Record>, RecordsError> {
    let data = fs::read_to_string(path)?;
    let records: Vec<Record> = serde_json::from_str(&data)?;
    tracing::info!("loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Generate `count` records with one diagnosis and two medications each
pub fn synthesize(count: usize, seed: u64) -> Vec<Record> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let id = format!("PATIENT_{}", FIRST_PATIENT + i);
            let diagnosis = DIAGNOSES.choose(&mut rng).copied().unwrap_or("Hypertension");
            let meds: Vec<&str> = MEDICATIONS.choose_multiple(&mut rng, 2).copied().collect();
            let meds = meds.join(", ");

            let content = format!(
                "Patient ID: {id}\n\
                 Admission Date: 2024-01-01\n\
                 Diagnosis: {diagnosis}\n\
                 Medications: {meds}\n\
                 Clinical Notes: Patient presented with symptoms consistent with {diagnosis}. \
                 Started on {meds}. Monitoring vitals."
            );
            let keywords = diagnosis
                .split_whitespace()
                .chain(meds.split(", "))
                .map(str::to_lowercase)
                .collect();

            Record {
                entity_id: EntityId::new(id),
                content,
                keywords,
            }
        })
        .collect()
}
