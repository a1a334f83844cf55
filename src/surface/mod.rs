pub mod headless;
pub mod raster;

use crate::config::TileLayerConfig;
use crate::style::PathStyle;
use crate::types::{LatLng, ZoneShape};
use geo::Rect;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LayerHandle(pub usize);

#[derive(Debug, Clone)]
pub struct Overlay {
    pub shape: ZoneShape,
    pub style: PathStyle,
    /// Paint order; higher draws on top.
    pub z: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlPosition {
    TopRight,
    BottomRight,
}

pub type TileLayer = TileLayerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub bring_to_front: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self { bring_to_front: true }
    }
}

impl Capabilities {
    /// Legacy engines (Internet Explorer, EdgeHTML, Presto Opera) cannot
    /// reorder vector overlays.
    pub fn from_user_agent(user_agent: &str) -> Self {
        let legacy = ["MSIE ", "Trident/", "Edge/", "Presto/", "Opera/"]
            .iter()
            .any(|marker| user_agent.contains(marker));
        Self {
            bring_to_front: !legacy,
        }
    }
}

pub trait Surface {
    fn set_view(&mut self, center: LatLng, zoom: u8);

    fn add_tile_layer(&mut self, layer: &TileLayer);

    fn mount_control(&mut self, position: ControlPosition, html: String) -> ControlId;

    fn update_control(&mut self, id: ControlId, html: String);

    fn add_overlay(&mut self, shape: &ZoneShape, style: &PathStyle) -> LayerHandle;

    fn set_style(&mut self, layer: LayerHandle, style: &PathStyle);

    fn bring_to_front(&mut self, layer: LayerHandle);

    /// Shows `bounds` at the highest zoom that fits them.
    fn fit_bounds(&mut self, bounds: Rect<f64>);

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_engines_cannot_bring_to_front() {
        let ie = "Mozilla/5.0 (Windows NT 6.1; Trident/7.0; rv:11.0) like Gecko";
        let edge = "Mozilla/5.0 (Windows NT 10.0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/64.0 Safari/537.36 Edge/17.17134";
        let opera = "Opera/9.80 (Windows NT 6.1) Presto/2.12.388 Version/12.18";
        for ua in [ie, edge, opera] {
            assert!(!Capabilities::from_user_agent(ua).bring_to_front, "{ua}");
        }
    }

    #[test]
    fn modern_engines_can_bring_to_front() {
        let chromium_edge = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36 Edg/120.0";
        let firefox = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
        assert!(Capabilities::from_user_agent(chromium_edge).bring_to_front);
        assert!(Capabilities::from_user_agent(firefox).bring_to_front);
    }
}
