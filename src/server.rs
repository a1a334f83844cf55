use crate::color::{Color, ColorScale};
use crate::config::AppConfig;
use crate::info::InfoFields;
use crate::legend::{Legend, LegendEntry};
use crate::loader::{DataLoader, DataSource, Datasets};
use crate::matcher::ZoneMatcher;
use crate::types::{LatLng, ZoneShape};
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info};

// Wrapper for RTree indexing
struct ZoneIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for ZoneIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

pub struct IndexedZone {
    pub zone_code: String,
    pub shape: ZoneShape,
    pub color: Color,
    pub info: InfoFields,
}

pub struct AppState {
    zones: Vec<IndexedZone>,
    tree: RTree<ZoneIndex>,
    legend: Legend,
}

impl AppState {
    /// Without datasets the zone index is empty; the legend is always served.
    pub fn new(datasets: Option<&Datasets>, scale: &ColorScale) -> Self {
        let mut zones = Vec::new();
        if let Some(datasets) = datasets {
            let matcher = ZoneMatcher::new(&datasets.records);
            for feature in &datasets.zones {
                let Some(record) = matcher.match_feature(feature) else { continue };
                let Some(shape) = ZoneShape::from_feature(feature) else { continue };
                zones.push(IndexedZone {
                    zone_code: record.zone_code.clone(),
                    shape,
                    color: scale.color_for(record.population_density),
                    info: InfoFields::from(record),
                });
            }
        }

        let tree_items: Vec<ZoneIndex> = zones
            .iter()
            .enumerate()
            .filter_map(|(index, zone)| {
                let rect = zone.shape.hit_bounds()?;
                Some(ZoneIndex {
                    index,
                    aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                })
            })
            .collect();

        Self {
            zones,
            tree: RTree::bulk_load(tree_items),
            legend: Legend::from_scale(scale),
        }
    }

    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    /// Zone under the point; later zones are drawn on top of earlier ones.
    pub fn zone_at(&self, position: LatLng) -> Option<&IndexedZone> {
        let point = position.to_point();
        let envelope = AABB::from_point([point.x(), point.y()]);

        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|candidate| candidate.index)
            .filter(|&i| self.zones[i].shape.hit(&point))
            .max()
            .map(|i| &self.zones[i])
    }
}

#[derive(Deserialize)]
pub struct QueryParams {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Serialize)]
pub struct ZoneResponse {
    zone_code: String,
    color: Color,
    info: InfoFields,
}

pub fn router(config: &AppConfig, source: &DataSource, state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/api/zone", get(zone_handler))
        .route("/api/legend", get(legend_handler))
        .nest_service("/tiles", ServeDir::new(&config.output.tile_dir));

    // Remote sources are served by whoever hosts them
    if let DataSource::Directory(dir) = source {
        app = app.nest_service("/data", ServeDir::new(dir));
    }

    app.fallback_service(ServeDir::new(&config.server.static_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig, loader: DataLoader) -> Result<()> {
    let scale = ColorScale::density();
    let datasets = match loader.load_datasets(&config.data).await {
        Ok(datasets) => Some(datasets),
        Err(err) => {
            error!(error = %err, "Zone boundaries unavailable, serving base map and legend only");
            None
        }
    };

    info!("Building spatial index for API...");
    let state = Arc::new(AppState::new(datasets.as_ref(), &scale));
    info!(zones = state.zone_count(), "Spatial index built");

    let app = router(&config, loader.source(), state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.server.port));
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn zone_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Json<Option<ZoneResponse>> {
    let zone = state.zone_at(LatLng::new(params.lat, params.lon));
    Json(zone.map(|zone| ZoneResponse {
        zone_code: zone.zone_code.clone(),
        color: zone.color,
        info: zone.info.clone(),
    }))
}

async fn legend_handler(State(state): State<Arc<AppState>>) -> Json<Vec<LegendEntry>> {
    Json(state.legend.entries.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parse_zones;
    use crate::types::DensityRecord;
    use serde_json::json;

    fn datasets() -> Datasets {
        let square = |code: &str, lon: f64, lat: f64, size: f64| {
            json!({
                "type": "Feature",
                "properties": { "codzona": code },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [lon, lat], [lon + size, lat], [lon + size, lat + size], [lon, lat + size], [lon, lat]
                    ]]
                }
            })
        };
        Datasets {
            records: vec![
                DensityRecord {
                    zone_code: "A".to_string(),
                    zone: "Centro".to_string(),
                    population: 36900.0,
                    surface: 4.5,
                    population_density: 8200.0,
                    historic_center: true,
                },
                DensityRecord {
                    zone_code: "B".to_string(),
                    zone: "Piazza".to_string(),
                    population: 10.0,
                    surface: 0.01,
                    population_density: 1000.0,
                    historic_center: true,
                },
            ],
            zones: parse_zones(json!([
                square("A", 11.30, 44.45, 0.1),
                square("B", 11.34, 44.49, 0.01),
                square("Z", 12.00, 45.00, 0.1),
            ]))
            .unwrap(),
        }
    }

    fn query(lat: f64, lon: f64) -> Query<QueryParams> {
        Query(QueryParams { lat, lon })
    }

    #[tokio::test]
    async fn zone_lookup_returns_topmost_match() {
        let state = Arc::new(AppState::new(Some(&datasets()), &ColorScale::density()));
        assert_eq!(state.zone_count(), 2);

        let Json(hit) = zone_handler(State(state.clone()), query(44.46, 11.31)).await;
        let hit = hit.unwrap();
        assert_eq!(hit.zone_code, "A");
        assert_eq!(hit.info.zone, "Centro");
        assert_eq!(hit.color, Color::rgb(0xd7, 0x30, 0x1f));

        let Json(nested) = zone_handler(State(state.clone()), query(44.495, 11.345)).await;
        assert_eq!(nested.unwrap().zone_code, "B");

        // Unmatched zone Z is not indexed
        let Json(miss) = zone_handler(State(state), query(45.05, 12.05)).await;
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn markers_are_found_within_tolerance() {
        let mut datasets = datasets();
        datasets.records.push(DensityRecord {
            zone_code: "P".to_string(),
            zone: "Stazione".to_string(),
            population: 600.0,
            surface: 0.05,
            population_density: 12000.0,
            historic_center: false,
        });
        datasets.zones.extend(
            parse_zones(json!({
                "type": "Feature",
                "properties": { "codzona": "P" },
                "geometry": { "type": "Point", "coordinates": [11.60, 44.50] }
            }))
            .unwrap(),
        );
        let state = Arc::new(AppState::new(Some(&datasets), &ColorScale::density()));
        assert_eq!(state.zone_count(), 3);

        let Json(hit) = zone_handler(State(state.clone()), query(44.50005, 11.59995)).await;
        let hit = hit.unwrap();
        assert_eq!(hit.zone_code, "P");
        assert_eq!(hit.color, Color::rgb(0xb3, 0x00, 0x00));

        let Json(miss) = zone_handler(State(state), query(44.501, 11.60)).await;
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn legend_is_served_without_data() {
        let state = Arc::new(AppState::new(None, &ColorScale::density()));
        assert_eq!(state.zone_count(), 0);

        let Json(entries) = legend_handler(State(state.clone())).await;
        assert_eq!(entries.len(), 9);
        assert_eq!(entries[8].label, "15000+");

        let Json(miss) = zone_handler(State(state), query(44.4949, 11.3426)).await;
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn serves_datasets_and_api_over_http() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("population_density.json"), "[]").unwrap();

        let source = DataSource::Directory(dir.path().to_path_buf());
        let state = Arc::new(AppState::new(Some(&datasets()), &ColorScale::density()));
        let app = router(&AppConfig::default(), &source, state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let loader = DataLoader::new(DataSource::parse(&format!("http://{}/data/", addr)).unwrap());
        assert_eq!(loader.load("population_density.json").await, Some(json!([])));
        assert_eq!(loader.load("zones.geojson").await, None);

        let api = DataLoader::new(DataSource::parse(&format!("http://{}/api/", addr)).unwrap());
        let zone = api.load("zone?lat=44.46&lon=11.31").await.unwrap();
        assert_eq!(zone["zone_code"], "A");
        assert_eq!(zone["color"], "#d7301f");
        assert_eq!(zone["info"]["historic_center"], true);
    }
}
