use std::path::PathBuf;

use clap::Args;

use common::prelude::*;

use crate::records::{self, RecordsError};

const ADDED_KEYWORD: &str = "followup";

#[derive(Args, Debug, Clone)]
pub struct Demo {
    /// Keyword every clinician searches for
    #[arg(long, default_value = "hypertension")]
    pub keyword: String,

    /// JSON record file (overrides the configured source)
    #[arg(long)]
    pub records: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    #[error("config error: {0}")]
    State(#[from] crate::config::StateError),
    #[error("record source error: {0}")]
    Records(#[from] RecordsError),
    #[error("owner error: {0}")]
    Owner(#[from] OwnerError),
    #[error("access error: {0}")]
    Access(#[from] AccessError),
    #[error("no records to upload")]
    NoRecords,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Demo {
    type Error = DemoError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let config = ctx.state()?.config;
        let records = match self.records.as_ref().or(config.records_path.as_ref()) {
            Some(path) => records::load(path)?,
            None => records::synthesize(config.record_count, config.seed),
        };
        let first = records.first().ok_or(DemoError::NoRecords)?.entity_id.clone();

        let owner = Owner::setup(AttributeKem::new(&config.attributes), ChaChaCipher)?
            .with_reset(config.counter_reset);
        let store = MemoryIndexStore::new();

        let mut lines = Vec::new();

        // 1. Upload every record
        lines.push("Upload:".to_string());
        let mut trapdoors = 0;
        for record in &records {
            trapdoors += owner.encrypt_and_upload(
                &record.entity_id,
                record.content.as_bytes(),
                &record.keywords,
                &config.policy,
                &store,
            )?;
        }
        lines.push(format!("  records:   {}", records.len()));
        lines.push(format!("  trapdoors: {}", trapdoors));
        lines.push(format!("  policy:    {}", config.policy));

        // 2. Every clinician tries to search the first record
        let clinicians = config
            .clinicians
            .iter()
            .map(|profile| Clinician::enroll(profile.name.clone(), &profile.attributes, &owner))
            .collect::<Result<Vec<_>, _>>()?;

        lines.push(String::new());
        lines.push(format!("Search {} for '{}':", first, self.keyword));
        let mut authorized = None;
        for clinician in &clinicians {
            let outcome =
                clinician.attempt_access_and_search(&first, &self.keyword, &store, &owner)?;
            lines.push(format!("  {:<12} {}", clinician.name(), outcome));
            if authorized.is_none() && !outcome.is_denied() {
                authorized = Some(clinician);
            }
        }

        // 3. Incremental add and delete on the first record
        lines.push(String::new());
        lines.push(format!("Update {}:", first));
        let added = owner.add_keywords(&first, &[ADDED_KEYWORD], &store)?;
        lines.push(format!("  add '{}':    {} trapdoors", ADDED_KEYWORD, added));
        if let Some(clinician) = authorized {
            let outcome =
                clinician.attempt_access_and_search(&first, ADDED_KEYWORD, &store, &owner)?;
            lines.push(format!("  search:            {}", outcome));
        }
        let removed = owner.delete_keywords(&first, &[ADDED_KEYWORD], &store)?;
        lines.push(format!("  delete '{}': {} trapdoors", ADDED_KEYWORD, removed));
        if let Some(clinician) = authorized {
            let outcome =
                clinician.attempt_access_and_search(&first, ADDED_KEYWORD, &store, &owner)?;
            lines.push(format!("  search:            {}", outcome));
        }

        // 4. Full record decryption
        lines.push(String::new());
        match authorized {
            Some(clinician) => {
                lines.push(format!("Record {} ({}):", first, clinician.name()));
                match clinician.decrypt_full_record(&first, &store) {
                    Ok(plaintext) => {
                        lines.extend(plaintext.lines().map(|line| format!("  {}", line)))
                    }
                    Err(e) => lines.push(format!("  error: {}", e)),
                }
            }
            None => lines.push(format!("Record {}: no authorized clinician", first)),
        }

        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    use crate::cli::op::{Op, OpContext};
    use crate::config::{SimConfig, SimState};

    fn context(dir: &TempDir, config: SimConfig) -> OpContext {
        let path = dir.path().join("config.toml");
        SimState::init(Some(path.clone()), Some(config), false).unwrap();
        OpContext::new(Some(path))
    }

    #[tokio::test]
    async fn test_demo_report() {
        let dir = TempDir::new().unwrap();
        let ctx = context(
            &dir,
            SimConfig {
                record_count: 3,
                ..SimConfig::default()
            },
        );
        let demo = Demo {
            keyword: "hypertension".to_string(),
            records: None,
        };

        let report = demo.execute(&ctx).await.unwrap();
        assert!(report.contains("records:   3"));
        assert!(report.contains("Nurse Bob    denied"));
        assert!(report.contains("Record PATIENT_10000 (Dr. Alice):"));
        assert!(report.contains("add 'followup':    1 trapdoors"));
        assert!(report.contains("delete 'followup': 1 trapdoors"));
    }

    #[tokio::test]
    async fn test_demo_without_records() {
        let dir = TempDir::new().unwrap();
        let ctx = context(
            &dir,
            SimConfig {
                record_count: 0,
                ..SimConfig::default()
            },
        );
        let demo = Demo {
            keyword: "sepsis".to_string(),
            records: None,
        };
        assert!(matches!(
            demo.execute(&ctx).await,
            Err(DemoError::NoRecords)
        ));
    }
}
