use metrics::counter;
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::api::models::{Area, Page, TaxonSpecies, UnitRow};
use crate::app::ports::{HttpClientPort, HttpGetResult};
use crate::config::Config;
use crate::constants::{
    is_occurs_status, strip_tun_prefix, NO_QUALITY_ISSUES, PRESERVED_SPECIMEN,
    PROVINCE_AREA_TYPE, SPECIES_RANK,
};
use crate::error::{CheckError, Result};
use crate::types::{AcceptedDistribution, AcceptedSpeciesIndex, OccurrenceRecord, ProvinceNames};

/// Fields requested from the occurrence warehouse
const UNIT_SELECTED_FIELDS: &[&str] = &[
    "document.documentId",
    "document.modifiedDate",
    "gathering.eventDate.end",
    "gathering.interpretations.biogeographicalProvince",
    "unit.interpretations.reliability",
    "unit.linkings.taxon.id",
    "unit.linkings.taxon.scientificName",
    "unit.unitId",
];

type Params = Vec<(&'static str, String)>;

/// Fetcher for the laji.fi API.
///
/// All requests are issued one after another; every listing is paged until
/// the API reports its last page.
pub struct LajiClient {
    http: Arc<dyn HttpClientPort>,
    config: Config,
}

impl LajiClient {
    pub fn new(http: Arc<dyn HttpClientPort>, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Biogeographical provinces, id -> Finnish name
    #[instrument(skip(self))]
    pub async fn fetch_provinces(&self) -> Result<ProvinceNames> {
        let params: Params = vec![
            ("type", PROVINCE_AREA_TYPE.to_string()),
            ("lang", "fi".to_string()),
        ];
        let areas: Vec<Area> = self.get_all_pages("areas", &params, 50).await?;

        let provinces: ProvinceNames = areas
            .into_iter()
            .map(|area| (strip_tun_prefix(&area.id).to_string(), area.name))
            .collect();
        info!("Fetched {} biogeographical provinces", provinces.len());
        Ok(provinces)
    }

    /// Known Finnish distributions of all species under the configured taxa.
    #[instrument(skip(self))]
    pub async fn fetch_distribution(&self) -> Result<AcceptedDistribution> {
        let mut distribution = AcceptedDistribution::new();

        for taxon in &self.config.taxa {
            let params: Params = vec![
                ("lang", "fi".to_string()),
                ("langFallback", "true".to_string()),
                ("taxonRanks", SPECIES_RANK.to_string()),
                ("includeHidden", "false".to_string()),
                ("includeMedia", "false".to_string()),
                ("includeDescriptions", "false".to_string()),
                ("includeRedListEvaluations", "false".to_string()),
                ("selectedFields", "id,occurrences".to_string()),
                ("onlyFinnish", "true".to_string()),
                ("sortOrder", "taxonomic".to_string()),
            ];
            let path = format!("taxa/{}/species", taxon);
            let species: Vec<TaxonSpecies> = self
                .get_all_pages(&path, &params, self.config.taxon_page_size)
                .await?;

            for sp in species {
                let species_id = strip_tun_prefix(&sp.id);
                // listed as Finnish but without province-level data
                let Some(occurrences) = sp.occurrences else {
                    debug!(species = species_id, "no occurrence data, presumed present");
                    distribution.add_presumed_species(species_id);
                    continue;
                };
                distribution.add_species(species_id);
                for occurrence in occurrences {
                    distribution.add_status(
                        species_id,
                        strip_tun_prefix(&occurrence.area),
                        &occurrence.status,
                        is_occurs_status(&occurrence.status),
                    );
                }
            }
        }

        info!("Fetched distributions for {} species", distribution.species_count());
        Ok(distribution)
    }

    /// Every valid species under the configured taxa, Finnish or not.
    #[instrument(skip(self))]
    pub async fn fetch_species_index(&self) -> Result<AcceptedSpeciesIndex> {
        let mut ids = Vec::new();

        for taxon in &self.config.taxa {
            let params: Params = vec![
                ("taxonRanks", SPECIES_RANK.to_string()),
                ("selectedFields", "id".to_string()),
                ("onlyFinnish", "false".to_string()),
                ("includeHidden", "true".to_string()),
            ];
            let path = format!("taxa/{}/species", taxon);
            let species: Vec<TaxonSpecies> = self
                .get_all_pages(&path, &params, self.config.taxon_page_size)
                .await?;
            ids.extend(species.into_iter().map(|sp| strip_tun_prefix(&sp.id).to_string()));
        }

        let index: AcceptedSpeciesIndex = ids.into_iter().collect();
        info!("Fetched {} valid species identifiers", index.len());
        Ok(index)
    }

    /// Preserved specimens of the configured taxa identified to species level.
    ///
    /// With `provinces`, only specimens placed in one of those provinces are returned.
    #[instrument(skip(self, provinces))]
    pub async fn fetch_specimens(
        &self,
        provinces: Option<&ProvinceNames>,
    ) -> Result<Vec<OccurrenceRecord>> {
        let mut params: Params = vec![
            ("selected", UNIT_SELECTED_FIELDS.join(",")),
            ("cache", "false".to_string()),
            ("taxonId", self.config.taxa.join(",")),
            ("useIdentificationAnnotations", "true".to_string()),
            ("includeSubTaxa", "true".to_string()),
            ("includeNonValidTaxa", "true".to_string()),
            ("taxonRankId", SPECIES_RANK.to_string()),
            ("recordBasis", PRESERVED_SPECIMEN.to_string()),
            ("individualCountMin", "1".to_string()),
            ("qualityIssues", NO_QUALITY_ISSUES.to_string()),
        ];
        if let Some(provinces) = provinces {
            let mut ids: Vec<&str> = provinces.keys().map(String::as_str).collect();
            ids.sort_unstable();
            params.push(("biogeographicalProvinceId", ids.join(",")));
        }

        let rows: Vec<UnitRow> = self
            .get_all_pages("warehouse/query/unit/list", &params, self.config.specimen_page_size)
            .await?;
        let records = rows
            .into_iter()
            .map(UnitRow::into_record)
            .collect::<Result<Vec<_>>>()?;

        info!("Fetched {} specimen records", records.len());
        Ok(records)
    }

    /// Request `path` page by page until the last page, concatenating results.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &Params,
        page_size: u32,
    ) -> Result<Vec<T>> {
        let mut results = Vec::new();
        let mut page = 1u32;

        loop {
            let mut page_params = params.clone();
            page_params.push(("pageSize", page_size.to_string()));
            page_params.push(("page", page.to_string()));
            let url = self.build_url(path, &page_params)?;

            let body: Page<T> = self.get_json(&url).await?;
            counter!("finbif_pages_fetched_total", "path" => path_label(path)).increment(1);
            debug!(
                path,
                page,
                last_page = ?body.last_page,
                rows = body.results.len(),
                "Fetched page"
            );

            let done = body.is_last(page) || body.results.is_empty();
            results.extend(body.results);
            if done {
                break;
            }
            page += 1;
        }

        Ok(results)
    }

    fn build_url(&self, path: &str, params: &Params) -> Result<String> {
        let base = format!(
            "{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let token = self.config.require_token()?;
        let url = Url::parse_with_params(
            &base,
            params
                .iter()
                .map(|(k, v)| (*k, v.as_str()))
                .chain(std::iter::once(("access_token", token))),
        )
        .map_err(|e| CheckError::Config(format!("invalid API URL '{}': {}", base, e)))?;
        Ok(url.into())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let bytes = self.get_with_retry(url).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// GET with bounded exponential backoff on transport errors, 429 and 5xx.
    async fn get_with_retry(&self, url: &str) -> Result<Vec<u8>> {
        let retry = &self.config.retry;
        let mut attempt = 0u32;

        loop {
            let (error, retry_after) = match self.http.get(url).await {
                Ok(resp) if resp.is_success() => return Ok(resp.bytes),
                Ok(resp) => (status_error(&resp), resp.retry_after_secs),
                Err(message) => (CheckError::Http(message), None),
            };

            if !error.is_transient() {
                warn!(url = %redact_access_token(url), %error, "Request failed");
                return Err(error);
            }
            if attempt >= retry.max_retries {
                warn!(url = %redact_access_token(url), %error, attempts = attempt + 1, "Giving up");
                return Err(match error {
                    CheckError::Api { status: 429, .. } => {
                        CheckError::RateLimited { attempts: attempt + 1 }
                    }
                    other => other,
                });
            }

            let delay = retry.delay_for(attempt, retry_after);
            warn!(
                url = %redact_access_token(url),
                %error,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "Transient failure, retrying"
            );
            counter!("finbif_request_retries_total").increment(1);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn status_error(resp: &HttpGetResult) -> CheckError {
    match resp.status {
        401 | 403 => CheckError::Unauthorized { status: resp.status },
        status => {
            let mut message = resp.body_text();
            if message.len() > 200 {
                let cut = (0..=200).rev().find(|i| message.is_char_boundary(*i)).unwrap_or(0);
                message.truncate(cut);
            }
            CheckError::Api { status, message }
        }
    }
}

// Metric label without per-taxon ids
fn path_label(path: &str) -> String {
    if path.starts_with("taxa/") {
        "taxa/species".to_string()
    } else {
        path.to_string()
    }
}

/// Replace the `access_token` query value so URLs can be logged.
pub fn redact_access_token(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return "<invalid url>".to_string();
    };
    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "access_token" { "REDACTED".into() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    if pairs.is_empty() {
        return parsed.into();
    }
    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_redacted() {
        let url = "https://api.laji.fi/v0/areas?type=x&access_token=secret123&page=1";
        let redacted = redact_access_token(url);
        assert!(!redacted.contains("secret123"));
        assert!(redacted.contains("access_token=REDACTED"));
        assert!(redacted.contains("page=1"));
    }

    #[test]
    fn auth_statuses_are_not_transient() {
        let resp = HttpGetResult {
            status: 401,
            bytes: Vec::new(),
            retry_after_secs: None,
        };
        let err = status_error(&resp);
        assert!(matches!(err, CheckError::Unauthorized { status: 401 }));
        assert!(!err.is_transient());
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let resp = HttpGetResult {
            status: 400,
            bytes: "ä".repeat(300).into_bytes(),
            retry_after_secs: None,
        };
        match status_error(&resp) {
            CheckError::Api { status, message } => {
                assert_eq!(status, 400);
                assert!(message.len() <= 200);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
