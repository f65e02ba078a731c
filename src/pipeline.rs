use metrics::counter;
use std::path::PathBuf;
use tracing::{info, instrument};

use crate::api::LajiClient;
use crate::compare::{find_invalid_names, find_new_taxa};
use crate::constants::{
    INVALID_NAMES_FILE, NEW_TAXA_ANOMALIES_FILE, NEW_TO_FINLAND_FILE, NEW_TO_PROVINCES_FILE,
};
use crate::error::Result;
use crate::report::{write_anomalies, write_finland_summary, write_province_summary};
use crate::summary::{summarize_new_to_finland, summarize_new_to_provinces};
use crate::types::{AnomalyRecord, Classification};

/// Result of a complete pipeline run
#[derive(Debug, Default)]
pub struct PipelineResult {
    pub check: String,
    pub records_fetched: usize,
    pub anomalies: usize,
    pub new_to_finland: usize,
    pub new_to_province: usize,
    pub invalid_names: usize,
    pub output_files: Vec<PathBuf>,
}

impl PipelineResult {
    fn new(check: &str, records_fetched: usize, anomalies: &[AnomalyRecord]) -> Self {
        let count = |class: Classification| {
            anomalies.iter().filter(|a| a.classification == class).count()
        };
        Self {
            check: check.to_string(),
            records_fetched,
            anomalies: anomalies.len(),
            new_to_finland: count(Classification::NewToFinland),
            new_to_province: count(Classification::NewToProvince),
            invalid_names: count(Classification::InvalidName),
            output_files: Vec::new(),
        }
    }
}

/// Specimens outside the known distribution of their species.
///
/// Reference data is fetched first so every record is compared against the same snapshot.
/// Specimens are always restricted to Finnish provinces; the distribution has nothing
/// to say about records from elsewhere.
#[instrument(skip(client))]
pub async fn run_new_taxa(client: &LajiClient) -> Result<PipelineResult> {
    let config = client.config();
    info!("Starting new taxa check for taxa {:?}", config.taxa);

    let provinces = client.fetch_provinces().await?;
    let distribution = client.fetch_distribution().await?;
    let records = client.fetch_specimens(Some(&provinces)).await?;

    let anomalies = find_new_taxa(&distribution, &records);
    let mut result = PipelineResult::new("new-taxa", records.len(), &anomalies);
    record_metrics(&result);
    info!(
        "Found {} anomalies: {} new to Finland, {} new to a province",
        result.anomalies, result.new_to_finland, result.new_to_province
    );

    let by_province = summarize_new_to_provinces(&anomalies, config.historical_cutoff_year);
    let by_species = summarize_new_to_finland(&anomalies);

    let anomalies_path = config.output_dir.join(NEW_TAXA_ANOMALIES_FILE);
    write_anomalies(&anomalies_path, &anomalies, &provinces)?;
    let provinces_path = config.output_dir.join(NEW_TO_PROVINCES_FILE);
    write_province_summary(&provinces_path, &by_province, &provinces)?;
    let finland_path = config.output_dir.join(NEW_TO_FINLAND_FILE);
    write_finland_summary(&finland_path, &by_species)?;

    result.output_files = vec![anomalies_path, provinces_path, finland_path];
    Ok(result)
}

/// Specimens whose species identifier is not a valid species.
///
/// `only_finnish_provinces = false` widens this check to specimens from anywhere.
#[instrument(skip(client))]
pub async fn run_invalid_names(client: &LajiClient) -> Result<PipelineResult> {
    let config = client.config();
    info!("Starting species name check for taxa {:?}", config.taxa);

    let index = client.fetch_species_index().await?;
    let province_filter = if config.only_finnish_provinces {
        Some(client.fetch_provinces().await?)
    } else {
        None
    };
    let records = client.fetch_specimens(province_filter.as_ref()).await?;

    let anomalies = find_invalid_names(&index, &records);
    let mut result = PipelineResult::new("invalid-names", records.len(), &anomalies);
    record_metrics(&result);
    info!("Found {} specimens with invalid species names", result.anomalies);

    let path = config.output_dir.join(INVALID_NAMES_FILE);
    let provinces = province_filter.unwrap_or_default();
    write_anomalies(&path, &anomalies, &provinces)?;

    result.output_files = vec![path];
    Ok(result)
}

fn record_metrics(result: &PipelineResult) {
    counter!("finbif_records_checked_total", "check" => result.check.clone())
        .increment(result.records_fetched as u64);
    counter!("finbif_anomalies_total", "check" => result.check.clone())
        .increment(result.anomalies as u64);
}
