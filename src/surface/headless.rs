use super::{Capabilities, ControlId, ControlPosition, LayerHandle, Overlay, Surface, TileLayer};
use crate::style::PathStyle;
use crate::types::{LatLng, ZoneShape};
use geo::{Point, Rect};

#[derive(Debug, Clone)]
pub struct Control {
    pub position: ControlPosition,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Viewport {
    Centered { center: LatLng, zoom: u8 },
    Bounds(Rect<f64>),
}

#[derive(Debug, Default)]
pub struct HeadlessSurface {
    pub viewport: Option<Viewport>,
    pub tile_layers: Vec<TileLayer>,
    pub controls: Vec<Control>,
    pub overlays: Vec<Overlay>,
    /// Number of `set_style` calls, per overlay index.
    pub restyles: Vec<usize>,
    capabilities: Capabilities,
    next_z: usize,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            ..Self::default()
        }
    }

    pub fn overlay(&self, layer: LayerHandle) -> Option<&Overlay> {
        self.overlays.get(layer.0)
    }

    pub fn control(&self, id: ControlId) -> Option<&Control> {
        self.controls.get(id.0)
    }

    /// Topmost overlay under the point.
    pub fn layer_at(&self, position: LatLng) -> Option<LayerHandle> {
        let point: Point<f64> = position.to_point();
        self.overlays
            .iter()
            .enumerate()
            .filter(|(_, o)| o.shape.hit(&point))
            .max_by_key(|(_, o)| o.z)
            .map(|(i, _)| LayerHandle(i))
    }

    fn raise(&mut self) -> usize {
        let z = self.next_z;
        self.next_z += 1;
        z
    }
}

impl Surface for HeadlessSurface {
    fn set_view(&mut self, center: LatLng, zoom: u8) {
        self.viewport = Some(Viewport::Centered { center, zoom });
    }

    fn add_tile_layer(&mut self, layer: &TileLayer) {
        self.tile_layers.push(layer.clone());
    }

    fn mount_control(&mut self, position: ControlPosition, html: String) -> ControlId {
        self.controls.push(Control { position, html });
        ControlId(self.controls.len() - 1)
    }

    fn update_control(&mut self, id: ControlId, html: String) {
        if let Some(control) = self.controls.get_mut(id.0) {
            control.html = html;
        }
    }

    fn add_overlay(&mut self, shape: &ZoneShape, style: &PathStyle) -> LayerHandle {
        let z = self.raise();
        self.overlays.push(Overlay {
            shape: shape.clone(),
            style: *style,
            z,
        });
        self.restyles.push(0);
        LayerHandle(self.overlays.len() - 1)
    }

    fn set_style(&mut self, layer: LayerHandle, style: &PathStyle) {
        if let Some(overlay) = self.overlays.get_mut(layer.0) {
            overlay.style = *style;
            self.restyles[layer.0] += 1;
        }
    }

    fn bring_to_front(&mut self, layer: LayerHandle) {
        if layer.0 < self.overlays.len() {
            let z = self.raise();
            self.overlays[layer.0].z = z;
        }
    }

    fn fit_bounds(&mut self, bounds: Rect<f64>) {
        self.viewport = Some(Viewport::Bounds(bounds));
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}
