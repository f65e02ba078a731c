//! Wire shapes of the laji.fi responses the checks read.
//!
//! Everything the checks do not strictly need is optional so that a sparse
//! `selected=` projection still deserializes.

use serde::Deserialize;

use crate::constants::strip_tun_prefix;
use crate::error::{CheckError, Result};
use crate::types::OccurrenceRecord;

/// One page of a paginated listing
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default)]
    pub current_page: Option<u32>,
    pub last_page: Option<u32>,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Listings without `lastPage` are unpaginated. A missing `currentPage`
    /// is taken to be the page that was asked for.
    pub fn is_last(&self, requested_page: u32) -> bool {
        let current = self.current_page.unwrap_or(requested_page);
        self.last_page.map_or(true, |last| current >= last)
    }
}

#[derive(Debug, Deserialize)]
pub struct Area {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonSpecies {
    pub id: String,
    /// Absent for species only presumed present; those have no province-level distribution
    #[serde(default)]
    pub occurrences: Option<Vec<TaxonOccurrence>>,
}

#[derive(Debug, Deserialize)]
pub struct TaxonOccurrence {
    pub area: String,
    pub status: String,
}

/// A row of `/warehouse/query/unit/list`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UnitRow {
    pub document: DocumentPart,
    pub gathering: GatheringPart,
    pub unit: UnitPart,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentPart {
    pub document_id: Option<String>,
    pub modified_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatheringPart {
    pub event_date: Option<EventDate>,
    pub interpretations: Option<GatheringInterpretations>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EventDate {
    pub end: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatheringInterpretations {
    pub biogeographical_province: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UnitPart {
    pub unit_id: Option<String>,
    pub linkings: Option<Linkings>,
    pub interpretations: Option<UnitInterpretations>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Linkings {
    pub taxon: Option<LinkedTaxon>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LinkedTaxon {
    pub id: Option<String>,
    pub scientific_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UnitInterpretations {
    pub reliability: Option<String>,
}

impl UnitRow {
    /// Flatten into an [`OccurrenceRecord`]. Fails only when the row carries no
    /// identifier at all, since such a row cannot be reviewed.
    pub fn into_record(self) -> Result<OccurrenceRecord> {
        let UnitRow { document, gathering, unit } = self;

        let document_id = document.document_id.unwrap_or_default();
        let specimen_id = match unit.unit_id {
            Some(id) if !id.is_empty() => id,
            _ if !document_id.is_empty() => document_id.clone(),
            _ => {
                return Err(CheckError::MissingField(
                    "unit.unitId and document.documentId".to_string(),
                ))
            }
        };

        let taxon = unit.linkings.and_then(|l| l.taxon).unwrap_or_default();
        let species_id = taxon
            .id
            .filter(|id| !id.is_empty())
            .map(|id| strip_tun_prefix(&id).to_string());

        let province_id = gathering
            .interpretations
            .and_then(|i| i.biogeographical_province)
            .filter(|p| !p.is_empty())
            .map(|p| strip_tun_prefix(&p).to_string());

        Ok(OccurrenceRecord {
            species_id,
            species_name: taxon.scientific_name.unwrap_or_default(),
            province_id,
            specimen_id,
            document_id,
            modified_date: document.modified_date.unwrap_or_default(),
            collected_date: gathering.event_date.and_then(|d| d.end).unwrap_or_default(),
            reliability: unit
                .interpretations
                .and_then(|i| i.reliability)
                .unwrap_or_default(),
        })
    }
}
