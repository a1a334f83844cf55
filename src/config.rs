use crate::style::StyleConfig;
use crate::types::LatLng;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub map: MapConfig,
    pub style: StyleConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DataConfig {
    /// Local directory or http(s) base URL holding both datasets.
    pub source: String,
    pub population: String,
    pub zones: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: "data".to_string(),
            population: "population_density.json".to_string(),
            zones: "zones.geojson".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    pub title: String,
    /// `[lat, lng]`
    pub center: [f64; 2],
    pub zoom: u8,
    pub tiles: TileLayerConfig,
}

impl MapConfig {
    pub fn center(&self) -> LatLng {
        LatLng::new(self.center[0], self.center[1])
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            title: "Bologna Population Density".to_string(),
            center: [44.4949, 11.3426],
            zoom: 13,
            tiles: TileLayerConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TileLayerConfig {
    pub url: String,
    pub attribution: String,
    pub max_zoom: u8,
}

impl Default for TileLayerConfig {
    fn default() -> Self {
        Self {
            url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            attribution: "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors"
                .to_string(),
            max_zoom: 19,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub tile_dir: PathBuf,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            tile_dir: PathBuf::from("output/tiles"),
            min_zoom: 11,
            max_zoom: 15,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            static_dir: PathBuf::from("."),
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.data.population, "population_density.json");
        assert_eq!(config.data.zones, "zones.geojson");
        assert_eq!(config.map.center(), LatLng::new(44.4949, 11.3426));
        assert_eq!(config.map.zoom, 13);
        assert_eq!(config.map.tiles.max_zoom, 19);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn loads_overrides_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[data]\nsource = \"http://localhost:3000/data/\"\n\n[map]\nzoom = 12\n\n[output]\nmin_zoom = 13\nmax_zoom = 13\n"
        )
        .unwrap();

        let config = AppConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.data.source, "http://localhost:3000/data/");
        assert_eq!(config.data.zones, "zones.geojson");
        assert_eq!(config.map.zoom, 12);
        assert_eq!(config.map.title, "Bologna Population Density");
        assert_eq!((config.output.min_zoom, config.output.max_zoom), (13, 13));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = AppConfig::load_from_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
