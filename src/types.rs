use std::collections::{HashMap, HashSet};
use std::fmt;

/// A single specimen record from the occurrence warehouse.
///
/// Identifiers are stored without the `http://tun.fi/` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccurrenceRecord {
    /// Linked taxon id; `None` when the warehouse could not resolve the name
    pub species_id: Option<String>,
    pub species_name: String,
    /// Biogeographical province id
    pub province_id: Option<String>,
    /// Unit id for multi-species documents, otherwise the document id
    pub specimen_id: String,
    pub document_id: String,
    pub modified_date: String,
    pub collected_date: String,
    pub reliability: String,
}

impl OccurrenceRecord {
    /// Minimal record with just the keys the comparators look at.
    pub fn new(species_id: Option<&str>, province_id: Option<&str>, specimen_id: &str) -> Self {
        Self {
            species_id: species_id.map(str::to_string),
            species_name: String::new(),
            province_id: province_id.map(str::to_string),
            specimen_id: specimen_id.to_string(),
            document_id: specimen_id.to_string(),
            modified_date: String::new(),
            collected_date: String::new(),
            reliability: String::new(),
        }
    }
}

/// Known distribution of each species, as recorded in the Taxon Editor.
#[derive(Debug, Clone, Default)]
pub struct AcceptedDistribution {
    /// species -> provinces where the species occurs
    occurs: HashMap<String, HashSet<String>>,
    /// species -> province -> status code, for every status listed
    statuses: HashMap<String, HashMap<String, String>>,
    /// species known from Finland whose provinces are not recorded
    presumed: HashSet<String>,
}

impl AcceptedDistribution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a species, even one with no accepted provinces.
    pub fn add_species(&mut self, species_id: &str) {
        self.occurs.entry(species_id.to_string()).or_default();
        self.statuses.entry(species_id.to_string()).or_default();
    }

    /// Record the status of a species in a province. Only `occurs` statuses
    /// make the province part of the accepted distribution.
    pub fn add_status(&mut self, species_id: &str, province_id: &str, status: &str, occurs: bool) {
        self.add_species(species_id);
        if occurs {
            if let Some(provinces) = self.occurs.get_mut(species_id) {
                provinces.insert(province_id.to_string());
            }
        }
        if let Some(by_province) = self.statuses.get_mut(species_id) {
            by_province.insert(province_id.to_string(), status.to_string());
        }
    }

    /// Register a species known from Finland without any province-level data.
    pub fn add_presumed_species(&mut self, species_id: &str) {
        self.presumed.insert(species_id.to_string());
    }

    /// True when the species has no province data of its own to judge against.
    pub fn is_presumed(&self, species_id: &str) -> bool {
        self.presumed.contains(species_id) && !self.occurs.contains_key(species_id)
    }

    pub fn provinces(&self, species_id: &str) -> Option<&HashSet<String>> {
        self.occurs.get(species_id)
    }

    /// Status code of the species in the province, if the Taxon Editor lists one.
    pub fn status(&self, species_id: &str, province_id: &str) -> Option<&str> {
        self.statuses
            .get(species_id)
            .and_then(|by_province| by_province.get(province_id))
            .map(String::as_str)
    }

    pub fn species_count(&self) -> usize {
        self.occurs.len() + self.presumed.iter().filter(|s| !self.occurs.contains_key(*s)).count()
    }
}

impl<S, P, I> FromIterator<(S, I)> for AcceptedDistribution
where
    S: AsRef<str>,
    P: AsRef<str>,
    I: IntoIterator<Item = P>,
{
    /// Build from `(species, provinces)` pairs, treating every province as occurring.
    fn from_iter<T: IntoIterator<Item = (S, I)>>(iter: T) -> Self {
        let mut distribution = Self::new();
        for (species, provinces) in iter {
            distribution.add_species(species.as_ref());
            for province in provinces {
                distribution.add_status(species.as_ref(), province.as_ref(), "", true);
            }
        }
        distribution
    }
}

/// Set of valid species identifiers.
#[derive(Debug, Clone, Default)]
pub struct AcceptedSpeciesIndex {
    ids: HashSet<String>,
}

impl AcceptedSpeciesIndex {
    pub fn contains(&self, species_id: &str) -> bool {
        self.ids.contains(species_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for AcceptedSpeciesIndex {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Why a record was flagged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    NewToFinland,
    NewToProvince,
    InvalidName,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::NewToFinland => "new to Finland",
            Classification::NewToProvince => "new to province",
            Classification::InvalidName => "invalid name",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record that failed its membership check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnomalyRecord {
    pub record: OccurrenceRecord,
    pub classification: Classification,
    /// Taxon Editor status of the species in the record's province, empty when unlisted
    pub occurrence_code: String,
}

/// Province id -> display name
pub type ProvinceNames = HashMap<String, String>;
