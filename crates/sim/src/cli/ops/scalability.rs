use std::time::{Duration, Instant};

use clap::Args;

use common::prelude::*;

const POLICY: &str = "ADMIN";

#[derive(Args, Debug, Clone)]
pub struct Scalability {
    /// Population sizes to compare
    #[arg(long, value_delimiter = ',', default_values_t = vec![10, 100, 1000])]
    pub sizes: Vec<usize>,

    /// Keyword shared by every patient
    #[arg(long, default_value = "hypertension")]
    pub keyword: String,

    /// Lookups timed per measurement
    #[arg(long, default_value_t = 1000)]
    pub iterations: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum ScalabilityError {
    #[error("owner error: {0}")]
    Owner(#[from] OwnerError),
    #[error("store error: {0}")]
    Store(#[from] StoreError<std::convert::Infallible>),
    #[error("iterations must be at least 1")]
    NoIterations,
}

/// One row of the comparison
#[derive(Debug, Clone, PartialEq)]
struct Measurement {
    size: usize,
    per_entity_hits: usize,
    per_entity: Duration,
    global_hits: usize,
    global_scanned: usize,
    global: Duration,
}

impl Scalability {
    fn measure(&self, size: usize) -> Result<Measurement, ScalabilityError> {
        let owner = Owner::setup(AttributeKem::new([POLICY]), ChaChaCipher)?;
        let store = MemoryIndexStore::new();
        let global: GlobalIndex<String> = GlobalIndex::new();

        for i in 0..size {
            let id = EntityId::new(format!("PATIENT_{}", 10000 + i));
            let content = format!("Record for {}", id);
            let keywords = [self.keyword.clone(), format!("unique_{}", i)];
            owner.encrypt_and_upload(&id, content.as_bytes(), &keywords, POLICY, &store)?;
            global.upload(&id, content, &keywords, GlobalIndex::<String>::plain_trapdoor);
        }

        let target = EntityId::from("PATIENT_10000");
        let tokens = owner.generate_search_tokens(&target, &self.keyword)?;
        let global_tokens = [GlobalIndex::<String>::plain_trapdoor(&self.keyword)];

        let mut per_entity_hits = 0;
        let start = Instant::now();
        for _ in 0..self.iterations {
            per_entity_hits = store.search(&target, &tokens)?.len();
        }
        let per_entity = start.elapsed() / self.iterations;

        let mut baseline = BaselineSearch {
            hits: Vec::new(),
            scanned: 0,
        };
        let start = Instant::now();
        for _ in 0..self.iterations {
            baseline = global.search_for_patient(&target, &global_tokens);
        }
        let global_time = start.elapsed() / self.iterations;

        tracing::debug!(
            "size {}: per-entity {:?}, global {:?} over {} entries",
            size,
            per_entity,
            global_time,
            baseline.scanned
        );

        Ok(Measurement {
            size,
            per_entity_hits,
            per_entity,
            global_hits: baseline.hits.len(),
            global_scanned: baseline.scanned,
            global: global_time,
        })
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Scalability {
    type Error = ScalabilityError;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        if self.iterations == 0 {
            return Err(ScalabilityError::NoIterations);
        }

        let mut lines = vec![
            format!("Searching '{}' in PATIENT_10000", self.keyword),
            String::new(),
            format!(
                "{:<8} | {:<10} | {:<14} | {:<11} | {:<8} | {:<12} | {}",
                "size", "hits", "per-entity µs", "global hits", "scanned", "global µs", "ratio"
            ),
            "-".repeat(86),
        ];

        for size in &self.sizes {
            let m = self.measure(*size)?;
            let per_entity_us = m.per_entity.as_secs_f64() * 1e6;
            let global_us = m.global.as_secs_f64() * 1e6;
            let ratio = if per_entity_us > 0.0 {
                global_us / per_entity_us
            } else {
                0.0
            };
            lines.push(format!(
                "{:<8} | {:<10} | {:<14.2} | {:<11} | {:<8} | {:<12.2} | {:.2}x",
                m.size,
                m.per_entity_hits,
                per_entity_us,
                m.global_hits,
                m.global_scanned,
                global_us,
                ratio
            ));
        }

        Ok(lines.join("\n"))
    }
}
