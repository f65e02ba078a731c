//! Constants for the laji.fi API and the reports produced from it.

pub const DEFAULT_API_BASE_URL: &str = "https://api.laji.fi/v0";

/// URI prefix the API puts in front of taxon, area and document identifiers
pub const TUN_PREFIX: &str = "http://tun.fi/";

// Liverworts and mosses
pub const DEFAULT_TAXA: &[&str] = &["MX.44394", "MX.44109"];

pub const SPECIES_RANK: &str = "MX.species";
pub const PRESERVED_SPECIMEN: &str = "PRESERVED_SPECIMEN";
pub const NO_QUALITY_ISSUES: &str = "NO_ISSUES";
pub const PROVINCE_AREA_TYPE: &str = "biogeographicalProvince";

/// Taxon Editor statuses that mean the species is present in a province.
/// Everything else (old records, extirpated, doubtful, ...) is not an accepted occurrence.
pub const OCCURS_STATUSES: &[&str] = &[
    "MX.typeOfOccurrenceOccurs",
    "MX.typeOfOccurrenceStablePopulation",
    "MX.typeOfOccurrenceCommon",
    "MX.typeOfOccurrenceRare",
    "MX.typeOfOccurrenceVeryRare",
    "MX.typeOfOccurrenceImport",
    "MX.typeOfOccurrenceAnthropogenic",
    "MX.typeOfOccurrenceAlienOldResident",
    "MX.typeOfOccurrenceSpontaneousNewEphemeral",
    "MX.typeOfOccurrenceAlienNewEphemeral",
    "MX.typeOfOccurrenceAlienNewResident",
    "MX.typeOfOccurrenceSmallDegreeCultivatedOrigin",
    "MX.typeOfOccurrenceNotableDegreeCultivatedOrigin",
    "MX.typeOfOccurrenceCompletelyCultivatedOrigin",
    "MX.typeOfOccurrenceOnlyCultivated",
];

/// Statuses whose new-province rows are dropped when every specimen predates the cutoff year
pub const HISTORICAL_STATUSES: &[&str] = &[
    "MX.typeOfOccurrenceOldRecords",
    "MX.typeOfOccurrenceExtirpated",
];

pub const DEFAULT_HISTORICAL_CUTOFF_YEAR: i32 = 1940;

// Output file names
pub const NEW_TAXA_ANOMALIES_FILE: &str = "new_taxa_anomalies.csv";
pub const NEW_TO_PROVINCES_FILE: &str = "new_to_bioprovinces.csv";
pub const NEW_TO_FINLAND_FILE: &str = "new_to_fi.csv";
pub const INVALID_NAMES_FILE: &str = "mistyped_speciesnames.csv";

pub const DEFAULT_CONFIG_FILE: &str = "finbif_checks.toml";
pub const ACCESS_TOKEN_ENV: &str = "LAJI_ACCESS_TOKEN";

/// Strip the `http://tun.fi/` prefix from an identifier
pub fn strip_tun_prefix(id: &str) -> &str {
    id.strip_prefix(TUN_PREFIX).unwrap_or(id)
}

pub fn is_occurs_status(status: &str) -> bool {
    OCCURS_STATUSES.contains(&status)
}
