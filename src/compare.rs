//! Membership checks of specimen records against the reference snapshot.
//!
//! Both comparators are pure: they read the reference data, never update it,
//! and emit anomalies in input order.

use tracing::debug;

use crate::types::{
    AcceptedDistribution, AcceptedSpeciesIndex, AnomalyRecord, Classification, OccurrenceRecord,
};

/// Classify a record against the known distribution.
///
/// Returns `None` when the record is consistent with the distribution or lacks
/// the keys needed to judge it. Species known from Finland without province data
/// are never flagged.
pub fn classify_distribution(
    distribution: &AcceptedDistribution,
    record: &OccurrenceRecord,
) -> Option<Classification> {
    let species = record.species_id.as_deref()?;
    if distribution.is_presumed(species) {
        return None;
    }
    match distribution.provinces(species) {
        None => Some(Classification::NewToFinland),
        Some(provinces) => {
            let province = record.province_id.as_deref()?;
            (!provinces.contains(province)).then_some(Classification::NewToProvince)
        }
    }
}

/// Flag records outside the accepted distribution.
pub fn find_new_taxa(
    distribution: &AcceptedDistribution,
    records: &[OccurrenceRecord],
) -> Vec<AnomalyRecord> {
    let mut skipped = 0usize;
    let anomalies: Vec<AnomalyRecord> = records
        .iter()
        .filter_map(|record| {
            if record.species_id.is_none() {
                skipped += 1;
                return None;
            }
            let classification = classify_distribution(distribution, record)?;
            let occurrence_code = match (&record.species_id, &record.province_id) {
                (Some(species), Some(province)) => distribution
                    .status(species, province)
                    .unwrap_or_default()
                    .to_string(),
                _ => String::new(),
            };
            Some(AnomalyRecord {
                record: record.clone(),
                classification,
                occurrence_code,
            })
        })
        .collect();

    if skipped > 0 {
        debug!(skipped, "Records without a linked species left to the name check");
    }
    anomalies
}

/// Flag records whose species identifier is not a valid species.
/// Records with no linked identifier at all are flagged too.
pub fn find_invalid_names(
    index: &AcceptedSpeciesIndex,
    records: &[OccurrenceRecord],
) -> Vec<AnomalyRecord> {
    records
        .iter()
        .filter(|record| match record.species_id.as_deref() {
            Some(species) => !index.contains(species),
            None => true,
        })
        .map(|record| AnomalyRecord {
            record: record.clone(),
            classification: Classification::InvalidName,
            occurrence_code: String::new(),
        })
        .collect()
}
