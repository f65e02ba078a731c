use anyhow::Result;
use async_trait::async_trait;
use finbif_checks::api::LajiClient;
use finbif_checks::app::ports::{HttpClientPort, HttpGetResult};
use finbif_checks::config::{Config, RetryConfig};
use finbif_checks::error::CheckError;
use finbif_checks::pipeline::{run_invalid_names, run_new_taxa};
use reqwest::Url;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

/// Serves canned JSON keyed by API path and page number.
/// Scripted responses, when queued, are returned first.
#[derive(Default)]
struct MockHttp {
    routes: HashMap<(String, u32), Value>,
    scripted: Mutex<VecDeque<HttpGetResult>>,
    calls: Mutex<Vec<String>>,
}

impl MockHttp {
    fn route(mut self, path: &str, page: u32, body: Value) -> Self {
        self.routes.insert((path.to_string(), page), body);
        self
    }

    fn script(self, status: u16, retry_after_secs: Option<u64>) -> Self {
        self.scripted.lock().unwrap().push_back(HttpGetResult {
            status,
            bytes: b"{\"error\":\"nope\"}".to_vec(),
            retry_after_secs,
        });
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClientPort for MockHttp {
    async fn get(&self, url: &str) -> Result<HttpGetResult, String> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(resp) = self.scripted.lock().unwrap().pop_front() {
            return Ok(resp);
        }

        let parsed = Url::parse(url).map_err(|e| e.to_string())?;
        let path = parsed.path().trim_start_matches("/v0/").to_string();
        let page = parsed
            .query_pairs()
            .find(|(k, _)| k == "page")
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(1);

        let (status, body) = match self.routes.get(&(path, page)) {
            Some(body) => (200, body.to_string()),
            None => (404, "{\"error\":\"not found\"}".to_string()),
        };
        Ok(HttpGetResult {
            status,
            bytes: body.into_bytes(),
            retry_after_secs: None,
        })
    }
}

fn unit(species: Option<&str>, province: &str, id: &str, modified: &str, collected: &str) -> Value {
    let mut unit = json!({
        "unitId": id,
        "interpretations": {"reliability": "RELIABLE"}
    });
    if let Some(species) = species {
        unit["linkings"] = json!({
            "taxon": {"id": format!("http://tun.fi/{species}"), "scientificName": format!("Name of {species}")}
        });
    }
    json!({
        "document": {"documentId": format!("doc-{id}"), "modifiedDate": modified},
        "gathering": {
            "eventDate": {"end": collected},
            "interpretations": {"biogeographicalProvince": format!("http://tun.fi/{province}")}
        },
        "unit": unit
    })
}

fn laji_fixture() -> MockHttp {
    MockHttp::default()
        .route(
            "areas",
            1,
            json!({
                "currentPage": 1,
                "lastPage": 1,
                "results": [
                    {"id": "ML.251", "name": "Ahvenanmaa"},
                    {"id": "ML.252", "name": "Varsinais-Suomi"}
                ]
            }),
        )
        .route(
            "taxa/MX.1/species",
            1,
            json!({
                "currentPage": 1,
                "lastPage": 1,
                "results": [
                    {
                        "id": "MX.10",
                        "occurrences": [
                            {"area": "ML.251", "status": "MX.typeOfOccurrenceOccurs"},
                            {"area": "ML.252", "status": "MX.typeOfOccurrenceOldRecords"}
                        ]
                    },
                    {"id": "MX.11"}
                ]
            }),
        )
        .route(
            "warehouse/query/unit/list",
            1,
            json!({
                "currentPage": 1,
                "lastPage": 2,
                "results": [
                    unit(Some("MX.10"), "ML.251", "u1", "2020-01-01", "2019-05-01"),
                    unit(Some("MX.10"), "ML.252", "u2", "2021-01-01", "1990-05-01")
                ]
            }),
        )
        .route(
            "warehouse/query/unit/list",
            2,
            json!({
                "currentPage": 2,
                "lastPage": 2,
                "results": [
                    unit(Some("MX.12"), "ML.251", "u3", "2022-01-01", "2021-07-01"),
                    unit(None, "ML.251", "u4", "2022-02-01", "2021-08-01"),
                    unit(Some("MX.11"), "ML.252", "u5", "2022-03-01", "2021-09-01")
                ]
            }),
        )
}

fn test_config(output_dir: &Path) -> Config {
    Config {
        access_token: Some("test-token".to_string()),
        api_base_url: "http://mock.test/v0".to_string(),
        taxa: vec!["MX.1".to_string()],
        output_dir: output_dir.to_path_buf(),
        retry: RetryConfig {
            max_retries: 3,
            base_delay_ms: 0,
            max_delay_ms: 0,
        },
        ..Config::default()
    }
}

fn read_csv(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

#[tokio::test]
async fn new_taxa_pipeline_flags_and_reports() -> Result<()> {
    let temp_dir = tempdir()?;
    let http = Arc::new(laji_fixture());
    let client = LajiClient::new(http.clone(), test_config(temp_dir.path()))?;

    let result = run_new_taxa(&client).await?;

    // u5 belongs to a species known from Finland without province data
    assert_eq!(result.records_fetched, 5);
    assert_eq!(result.anomalies, 2);
    assert_eq!(result.new_to_province, 1);
    assert_eq!(result.new_to_finland, 1);

    let rows = read_csv(&temp_dir.path().join("new_taxa_anomalies.csv"))?;
    assert_eq!(rows.len(), 1 + result.anomalies);
    assert_eq!(rows[1][0], "new to province");
    assert_eq!(rows[1][1], "MX.10");
    assert_eq!(rows[1][4], "Varsinais-Suomi");
    assert_eq!(rows[1][5], "MX.typeOfOccurrenceOldRecords");
    assert_eq!(rows[2][0], "new to Finland");
    assert_eq!(rows[2][1], "MX.12");
    assert!(rows.iter().all(|row| row[1] != "MX.11"));

    let by_province = read_csv(&temp_dir.path().join("new_to_bioprovinces.csv"))?;
    assert_eq!(by_province.len(), 2);
    assert_eq!(by_province[1][0], "http://tun.fi/MX.10");
    assert_eq!(by_province[1][2], "Varsinais-Suomi");
    assert_eq!(by_province[1][4], "u2");

    let by_species = read_csv(&temp_dir.path().join("new_to_fi.csv"))?;
    assert_eq!(by_species.len(), 2);
    assert_eq!(by_species[1][0], "http://tun.fi/MX.12");

    // both specimen pages fetched, province filter and token sent
    let calls = http.calls();
    let unit_calls: Vec<_> = calls.iter().filter(|u| u.contains("unit/list")).collect();
    assert_eq!(unit_calls.len(), 2);
    assert!(unit_calls[0].contains("biogeographicalProvinceId=ML.251%2CML.252"));
    assert!(calls.iter().all(|u| u.contains("access_token=test-token")));
    Ok(())
}

#[tokio::test]
async fn new_taxa_stays_within_finnish_provinces() -> Result<()> {
    let temp_dir = tempdir()?;
    let http = Arc::new(laji_fixture());
    let config = Config {
        only_finnish_provinces: false,
        ..test_config(temp_dir.path())
    };
    let client = LajiClient::new(http.clone(), config)?;

    run_new_taxa(&client).await?;

    let calls = http.calls();
    let unit_calls: Vec<_> = calls.iter().filter(|u| u.contains("unit/list")).collect();
    assert_eq!(unit_calls.len(), 2);
    assert!(unit_calls
        .iter()
        .all(|u| u.contains("biogeographicalProvinceId=ML.251%2CML.252")));
    Ok(())
}

#[tokio::test]
async fn invalid_names_can_cover_all_provinces() -> Result<()> {
    let temp_dir = tempdir()?;
    let http = Arc::new(laji_fixture());
    let config = Config {
        only_finnish_provinces: false,
        ..test_config(temp_dir.path())
    };
    let client = LajiClient::new(http.clone(), config)?;

    run_invalid_names(&client).await?;

    let calls = http.calls();
    assert!(calls.iter().all(|u| !u.contains("/areas")));
    assert!(calls
        .iter()
        .filter(|u| u.contains("unit/list"))
        .all(|u| !u.contains("biogeographicalProvinceId")));
    Ok(())
}

#[tokio::test]
async fn invalid_names_pipeline_flags_unknown_and_unlinked() -> Result<()> {
    let temp_dir = tempdir()?;
    let http = Arc::new(laji_fixture());
    let client = LajiClient::new(http, test_config(temp_dir.path()))?;

    let result = run_invalid_names(&client).await?;

    assert_eq!(result.records_fetched, 5);
    assert_eq!(result.anomalies, 2);
    assert_eq!(result.invalid_names, 2);

    let rows = read_csv(&temp_dir.path().join("mistyped_speciesnames.csv"))?;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1][1], "MX.12");
    assert_eq!(rows[2][1], "");
    assert_eq!(rows[2][6], "u4");
    Ok(())
}

#[tokio::test]
async fn transient_failures_are_retried() -> Result<()> {
    let temp_dir = tempdir()?;
    let http = Arc::new(laji_fixture().script(503, None).script(429, Some(0)));
    let client = LajiClient::new(http.clone(), test_config(temp_dir.path()))?;

    let result = run_new_taxa(&client).await?;

    assert_eq!(result.anomalies, 2);
    // first areas request failed twice before succeeding
    let calls = http.calls();
    assert!(calls[0].contains("/areas") && calls[1].contains("/areas") && calls[2].contains("/areas"));
    Ok(())
}

#[tokio::test]
async fn unauthorized_aborts_without_retry_or_output() -> Result<()> {
    let temp_dir = tempdir()?;
    let http = Arc::new(laji_fixture().script(401, None));
    let client = LajiClient::new(http.clone(), test_config(temp_dir.path()))?;

    let err = run_new_taxa(&client).await.unwrap_err();

    assert!(matches!(err, CheckError::Unauthorized { status: 401 }));
    assert_eq!(http.calls().len(), 1);
    assert_eq!(std::fs::read_dir(temp_dir.path())?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn persistent_rate_limiting_gives_up() -> Result<()> {
    let temp_dir = tempdir()?;
    let mut mock = laji_fixture();
    for _ in 0..4 {
        mock = mock.script(429, None);
    }
    let http = Arc::new(mock);
    let client = LajiClient::new(http.clone(), test_config(temp_dir.path()))?;

    let err = run_invalid_names(&client).await.unwrap_err();

    assert!(matches!(err, CheckError::RateLimited { attempts: 4 }));
    assert_eq!(http.calls().len(), 4);
    Ok(())
}

#[test]
fn client_requires_token() {
    let temp_dir = tempdir().unwrap();
    let config = Config {
        access_token: None,
        ..test_config(temp_dir.path())
    };

    let err = LajiClient::new(Arc::new(MockHttp::default()), config).err();

    assert!(matches!(err, Some(CheckError::Config(_))));
}
