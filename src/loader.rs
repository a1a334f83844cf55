use crate::config::DataConfig;
use crate::error::MapError;
use crate::types::DensityRecord;
use geojson::{Feature, GeoJson};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} responded with {status}")]
    Status { url: String, status: StatusCode },
    #[error("invalid resource name '{0}'")]
    Resource(String),
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub enum DataSource {
    Http(Url),
    Directory(PathBuf),
}

impl DataSource {
    pub fn parse(source: &str) -> Result<Self, MapError> {
        if source.starts_with("http://") || source.starts_with("https://") {
            let mut url = Url::parse(source).map_err(|_| MapError::InvalidSource(source.to_string()))?;
            // Url::join replaces the last segment unless the path ends in '/'
            if !url.path().ends_with('/') {
                let path = format!("{}/", url.path());
                url.set_path(&path);
            }
            Ok(DataSource::Http(url))
        } else if source.is_empty() {
            Err(MapError::InvalidSource(source.to_string()))
        } else {
            Ok(DataSource::Directory(PathBuf::from(source)))
        }
    }
}

pub struct Datasets {
    pub records: Vec<DensityRecord>,
    pub zones: Vec<Feature>,
}

pub struct DataLoader {
    source: DataSource,
    client: Client,
}

impl DataLoader {
    pub fn new(source: DataSource) -> Self {
        Self {
            source,
            client: Client::new(),
        }
    }

    pub fn from_config(config: &DataConfig) -> Result<Self, MapError> {
        Ok(Self::new(DataSource::parse(&config.source)?))
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    // Never fails; transport, status and parse problems are logged as None
    pub async fn load(&self, resource: &str) -> Option<Value> {
        match self.fetch(resource).await {
            Ok(value) => Some(value),
            Err(err) => {
                error!(resource, error = %err, "Failed to load data");
                None
            }
        }
    }

    async fn fetch(&self, resource: &str) -> Result<Value, LoadError> {
        match &self.source {
            DataSource::Http(base) => {
                let url = base
                    .join(resource)
                    .map_err(|_| LoadError::Resource(resource.to_string()))?;
                debug!(%url, "fetching");
                let response = self.client.get(url.clone()).send().await?;
                if !response.status().is_success() {
                    return Err(LoadError::Status {
                        url: url.to_string(),
                        status: response.status(),
                    });
                }
                Ok(response.json::<Value>().await?)
            }
            DataSource::Directory(dir) => {
                let path = dir.join(resource);
                debug!(?path, "reading");
                let read = tokio::fs::read(&path).await;
                let bytes = read.map_err(|source| LoadError::Io { path, source })?;
                Ok(serde_json::from_slice(&bytes)?)
            }
        }
    }

    /// Loads population data, then zone boundaries. Either one missing is
    /// fatal for zone rendering.
    pub async fn load_datasets(&self, config: &DataConfig) -> Result<Datasets, MapError> {
        let population = self
            .load(&config.population)
            .await
            .ok_or_else(|| MapError::DataUnavailable(config.population.clone()))?;
        let records = parse_records(population)?;

        let boundaries = self
            .load(&config.zones)
            .await
            .ok_or_else(|| MapError::DataUnavailable(config.zones.clone()))?;
        let zones = parse_zones(boundaries)?;

        info!(records = records.len(), features = zones.len(), "Datasets loaded");
        Ok(Datasets { records, zones })
    }
}

// Malformed rows are skipped; only a non-array document is an error
pub fn parse_records(value: Value) -> Result<Vec<DensityRecord>, MapError> {
    let items: Vec<Value> = serde_json::from_value(value)?;
    let total = items.len();

    let mut records = Vec::with_capacity(total);
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<DensityRecord>(item) {
            Ok(record) => records.push(record),
            Err(err) => warn!(index, error = %err, "Skipping malformed density record"),
        }
    }

    let skipped = total - records.len();
    if skipped > 0 {
        warn!(skipped, kept = records.len(), "Density records skipped");
    }
    Ok(records)
}

/// Flattens a FeatureCollection, a single Feature, or an array of either into
/// features, keeping input order.
pub fn parse_zones(value: Value) -> Result<Vec<Feature>, MapError> {
    if let Value::Array(items) = value {
        let mut features = Vec::new();
        for item in items {
            features.extend(parse_zones(item)?);
        }
        return Ok(features);
    }

    let geojson: GeoJson =
        serde_json::from_value(value).map_err(|e| MapError::InvalidZones(e.to_string()))?;
    match geojson {
        GeoJson::FeatureCollection(fc) => Ok(fc.features),
        GeoJson::Feature(f) => Ok(vec![f]),
        GeoJson::Geometry(_) => Err(MapError::InvalidZones("bare geometry without properties".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Json, Router};
    use serde_json::json;
    use std::net::SocketAddr;

    async fn spawn(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn collection(codes: &[&str]) -> Value {
        let features: Vec<Value> = codes
            .iter()
            .map(|code| {
                json!({
                    "type": "Feature",
                    "properties": { "codzona": code },
                    "geometry": { "type": "Point", "coordinates": [11.34, 44.49] }
                })
            })
            .collect();
        json!({ "type": "FeatureCollection", "features": features })
    }

    #[test]
    fn source_parsing() {
        match DataSource::parse("http://localhost:3000/data").unwrap() {
            DataSource::Http(url) => assert_eq!(url.as_str(), "http://localhost:3000/data/"),
            other => panic!("unexpected source {:?}", other),
        }
        assert!(matches!(DataSource::parse("data").unwrap(), DataSource::Directory(_)));
        assert!(DataSource::parse("").is_err());
        assert!(DataSource::parse("http://").is_err());
    }

    #[tokio::test]
    async fn http_error_status_resolves_to_none() {
        let addr = spawn(Router::new()).await;
        let loader = DataLoader::new(DataSource::parse(&format!("http://{}/data/", addr)).unwrap());
        assert_eq!(loader.load("population_density.json").await, None);
    }

    #[tokio::test]
    async fn http_success_returns_json() {
        let app = Router::new().route(
            "/data/population_density.json",
            get(|| async { Json(json!([{ "zone_code": "A" }])) }),
        );
        let addr = spawn(app).await;
        let loader = DataLoader::new(DataSource::parse(&format!("http://{}/data", addr)).unwrap());

        let value = loader.load("population_density.json").await.unwrap();
        assert_eq!(value[0]["zone_code"], "A");
    }

    #[tokio::test]
    async fn unreachable_host_resolves_to_none() {
        // Bind then drop so the port is closed.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let loader = DataLoader::new(DataSource::parse(&format!("http://{}/", addr)).unwrap());
        assert_eq!(loader.load("zones.geojson").await, None);
    }

    #[tokio::test]
    async fn directory_source_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ok.json"), "[1, 2, 3]").unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

        let loader = DataLoader::new(DataSource::Directory(dir.path().to_path_buf()));
        assert_eq!(loader.load("ok.json").await, Some(json!([1, 2, 3])));
        assert_eq!(loader.load("broken.json").await, None);
        assert_eq!(loader.load("missing.json").await, None);
    }

    #[tokio::test]
    async fn load_datasets_reports_missing_resource() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("population_density.json"),
            json!([{
                "zone_code": "A", "zone": "Centro", "population": 36900,
                "surface": 4.5, "population_density": 8200, "historic_center": true
            }])
            .to_string(),
        )
        .unwrap();

        let loader = DataLoader::new(DataSource::Directory(dir.path().to_path_buf()));
        let config = DataConfig::default();
        match loader.load_datasets(&config).await {
            Err(MapError::DataUnavailable(resource)) => assert_eq!(resource, "zones.geojson"),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("zones should be missing"),
        }

        std::fs::write(dir.path().join("zones.geojson"), collection(&["A", "B"]).to_string()).unwrap();
        let datasets = loader.load_datasets(&config).await.unwrap();
        assert_eq!(datasets.records.len(), 1);
        assert_eq!(datasets.records[0].zone, "Centro");
        assert_eq!(datasets.zones.len(), 2);
    }

    #[test]
    fn malformed_records_are_skipped() {
        let records = parse_records(json!([
            {
                "zone_code": "1", "zone": "Irnerio", "population": 12000,
                "surface": 1.5, "population_density": 8000
            },
            {
                "zone_code": "2", "zone": "Galvani", "population": null,
                "surface": 1.0, "population_density": 9000
            },
            { "zone_code": "3", "zone": "Malpighi" }
        ]))
        .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].zone, "Irnerio");
        assert!(!records[0].historic_center);

        assert!(matches!(
            parse_records(json!({ "zone_code": "1" })),
            Err(MapError::InvalidRecords(_))
        ));
    }

    #[test]
    fn zones_flatten_collections_in_order() {
        let value = json!([collection(&["A", "B"]), collection(&["C"])]);
        let codes: Vec<String> = parse_zones(value)
            .unwrap()
            .iter()
            .filter_map(crate::matcher::feature_zone_code)
            .collect();
        assert_eq!(codes, vec!["A", "B", "C"]);
    }

    #[test]
    fn zones_reject_non_geojson() {
        assert!(matches!(parse_zones(json!({ "foo": 1 })), Err(MapError::InvalidZones(_))));
        assert!(matches!(
            parse_zones(json!({ "type": "Point", "coordinates": [1.0, 2.0] })),
            Err(MapError::InvalidZones(_))
        ));
    }
}
