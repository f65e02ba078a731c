//! Grouped review sheets built from distribution anomalies.
//!
//! Reviewers work per species and province rather than per specimen, so the
//! new-taxa run also produces one row per (species, province) pair and one
//! row per species new to Finland.

use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;

use crate::constants::HISTORICAL_STATUSES;
use crate::types::{AnomalyRecord, Classification};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecimenEntry {
    pub specimen_id: String,
    pub modified_date: String,
    pub collected_date: String,
    pub reliability: String,
}

impl SpecimenEntry {
    fn from_anomaly(anomaly: &AnomalyRecord) -> Self {
        let r = &anomaly.record;
        Self {
            specimen_id: r.specimen_id.clone(),
            modified_date: r.modified_date.clone(),
            collected_date: r.collected_date.clone(),
            reliability: r.reliability.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvinceSummaryRow {
    pub species_id: String,
    pub species_name: String,
    pub province_id: String,
    pub occurrence_code: String,
    /// Most recently modified first
    pub specimens: Vec<SpecimenEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeciesSummaryRow {
    pub species_id: String,
    pub species_name: String,
    /// Most recently modified first
    pub specimens: Vec<SpecimenEntry>,
}

/// Group "new to province" anomalies by species and province.
///
/// Rows whose Taxon Editor status marks the occurrence as historical are
/// dropped unless at least one specimen was collected in or after `cutoff_year`.
pub fn summarize_new_to_provinces(
    anomalies: &[AnomalyRecord],
    cutoff_year: i32,
) -> Vec<ProvinceSummaryRow> {
    let mut rows: Vec<ProvinceSummaryRow> = Vec::new();
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();

    for anomaly in anomalies {
        if anomaly.classification != Classification::NewToProvince {
            continue;
        }
        let (Some(species), Some(province)) =
            (anomaly.record.species_id.as_deref(), anomaly.record.province_id.as_deref())
        else {
            continue;
        };

        let slot = *index.entry((species, province)).or_insert_with(|| {
            rows.push(ProvinceSummaryRow {
                species_id: species.to_string(),
                species_name: anomaly.record.species_name.clone(),
                province_id: province.to_string(),
                occurrence_code: anomaly.occurrence_code.clone(),
                specimens: Vec::new(),
            });
            rows.len() - 1
        });
        rows[slot].specimens.push(SpecimenEntry::from_anomaly(anomaly));
    }

    let mut rows: Vec<ProvinceSummaryRow> = rows
        .into_iter()
        .filter(|row| !is_only_historical(row, cutoff_year))
        .map(|mut row| {
            sort_by_modified_desc(&mut row.specimens);
            row
        })
        .collect();

    rows.sort_by(|a, b| {
        a.occurrence_code
            .cmp(&b.occurrence_code)
            .then_with(|| latest_modified(&b.specimens).cmp(latest_modified(&a.specimens)))
    });
    rows
}

/// Group "new to Finland" anomalies by species, most recently modified species first.
pub fn summarize_new_to_finland(anomalies: &[AnomalyRecord]) -> Vec<SpeciesSummaryRow> {
    let mut rows: Vec<SpeciesSummaryRow> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for anomaly in anomalies {
        if anomaly.classification != Classification::NewToFinland {
            continue;
        }
        let Some(species) = anomaly.record.species_id.as_deref() else {
            continue;
        };

        let slot = *index.entry(species).or_insert_with(|| {
            rows.push(SpeciesSummaryRow {
                species_id: species.to_string(),
                species_name: anomaly.record.species_name.clone(),
                specimens: Vec::new(),
            });
            rows.len() - 1
        });
        rows[slot].specimens.push(SpecimenEntry::from_anomaly(anomaly));
    }

    for row in &mut rows {
        sort_by_modified_desc(&mut row.specimens);
    }
    rows.sort_by(|a, b| latest_modified(&b.specimens).cmp(latest_modified(&a.specimens)));
    rows
}

fn is_only_historical(row: &ProvinceSummaryRow, cutoff_year: i32) -> bool {
    if !HISTORICAL_STATUSES.contains(&row.occurrence_code.as_str()) {
        return false;
    }
    !row
        .specimens
        .iter()
        .filter_map(|s| collected_year(&s.collected_date))
        .any(|year| year >= cutoff_year)
}

/// Year of a collection date such as `1998-06-02`; undated specimens yield `None`
pub fn collected_year(date: &str) -> Option<i32> {
    let date = date.trim();
    if let Some(day) = date.get(..10) {
        if let Ok(parsed) = NaiveDate::parse_from_str(day, "%Y-%m-%d") {
            return Some(parsed.year());
        }
    }
    date.get(..4)?.parse().ok()
}

// ISO dates sort lexically
fn sort_by_modified_desc(specimens: &mut [SpecimenEntry]) {
    specimens.sort_by(|a, b| b.modified_date.cmp(&a.modified_date));
}

fn latest_modified(specimens: &[SpecimenEntry]) -> &str {
    specimens
        .iter()
        .map(|s| s.modified_date.as_str())
        .max()
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OccurrenceRecord;

    fn anomaly(
        species: &str,
        province: &str,
        id: &str,
        modified: &str,
        collected: &str,
        class: Classification,
        code: &str,
    ) -> AnomalyRecord {
        let mut record = OccurrenceRecord::new(Some(species), Some(province), id);
        record.modified_date = modified.to_string();
        record.collected_date = collected.to_string();
        AnomalyRecord {
            record,
            classification: class,
            occurrence_code: code.to_string(),
        }
    }

    #[test]
    fn groups_by_species_and_province_with_recent_specimens_first() {
        let anomalies = vec![
            anomaly("S1", "P1", "a", "2019-01-01", "1990-05-01", Classification::NewToProvince, ""),
            anomaly("S1", "P1", "b", "2021-01-01", "1991-05-01", Classification::NewToProvince, ""),
            anomaly("S1", "P2", "c", "2020-01-01", "1992-05-01", Classification::NewToProvince, ""),
            anomaly("S2", "P1", "d", "2022-01-01", "1993-05-01", Classification::NewToFinland, ""),
        ];

        let rows = summarize_new_to_provinces(&anomalies, 1940);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].province_id, "P1");
        let ids: Vec<_> = rows[0].specimens.iter().map(|s| s.specimen_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(rows[1].province_id, "P2");
    }

    #[test]
    fn rows_sort_by_occurrence_code_then_recency() {
        let anomalies = vec![
            anomaly("S1", "P1", "a", "2019-01-01", "", Classification::NewToProvince, "MX.b"),
            anomaly("S2", "P1", "b", "2018-01-01", "", Classification::NewToProvince, "MX.a"),
            anomaly("S3", "P1", "c", "2020-01-01", "", Classification::NewToProvince, "MX.a"),
        ];

        let rows = summarize_new_to_provinces(&anomalies, 1940);

        let species: Vec<_> = rows.iter().map(|r| r.species_id.as_str()).collect();
        assert_eq!(species, vec!["S3", "S2", "S1"]);
    }

    #[test]
    fn old_records_are_dropped_unless_recently_collected() {
        let old = "MX.typeOfOccurrenceOldRecords";
        let anomalies = vec![
            anomaly("S1", "P1", "a", "2019-01-01", "1901-05-01", Classification::NewToProvince, old),
            anomaly("S1", "P1", "b", "2019-01-02", "", Classification::NewToProvince, old),
            anomaly("S2", "P1", "c", "2019-01-01", "1901-05-01", Classification::NewToProvince, old),
            anomaly("S2", "P1", "d", "2019-01-01", "1955-05-01", Classification::NewToProvince, old),
            anomaly("S3", "P1", "e", "2019-01-01", "1901-05-01", Classification::NewToProvince, ""),
        ];

        let rows = summarize_new_to_provinces(&anomalies, 1940);

        let species: Vec<_> = rows.iter().map(|r| r.species_id.as_str()).collect();
        assert_eq!(species, vec!["S3", "S2"]);
    }

    #[test]
    fn new_to_finland_groups_by_species() {
        let anomalies = vec![
            anomaly("S1", "P1", "a", "2019-01-01", "", Classification::NewToFinland, ""),
            anomaly("S2", "P1", "b", "2021-01-01", "", Classification::NewToFinland, ""),
            anomaly("S1", "P2", "c", "2020-01-01", "", Classification::NewToFinland, ""),
            anomaly("S3", "P2", "d", "2023-01-01", "", Classification::NewToProvince, ""),
        ];

        let rows = summarize_new_to_finland(&anomalies);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].species_id, "S2");
        assert_eq!(rows[1].species_id, "S1");
        let ids: Vec<_> = rows[1].specimens.iter().map(|s| s.specimen_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn collected_year_handles_partial_dates() {
        assert_eq!(collected_year("1998-06-02"), Some(1998));
        assert_eq!(collected_year("1998"), Some(1998));
        assert_eq!(collected_year(""), None);
        assert_eq!(collected_year("unknown"), None);
    }
}
