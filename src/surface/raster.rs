use super::{ControlId, ControlPosition, LayerHandle, Overlay, Surface, TileLayer};
use crate::config::OutputConfig;
use crate::style::PathStyle;
use crate::types::{LatLng, ZoneShape};
use anyhow::{ensure, Context, Result};
use geo::{Point, Rect};
use image::{ImageBuffer, RgbaImage};
use rayon::prelude::*;
use rstar::{RTree, RTreeObject, AABB};
use std::f64::consts::PI;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

// Constants for Web Mercator
pub const TILE_SIZE: u32 = 256;
const MAX_LATITUDE: f64 = 85.051_128_78;
// Deepest zoom whose tile indices still fit u32 arithmetic
pub const MAX_TILE_ZOOM: u8 = 30;

// R-tree entry for an area overlay
struct OverlayIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for OverlayIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

#[derive(Debug, Default)]
pub struct RasterSurface {
    overlays: Vec<Overlay>,
    controls: usize,
    next_z: usize,
}

impl RasterSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn extent(&self) -> Option<Rect<f64>> {
        self.overlays
            .iter()
            .filter_map(|o| o.shape.bounds())
            .reduce(|a, b| {
                Rect::new(
                    (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
                    (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
                )
            })
    }

    /// Renders every tile touching a zone for each zoom level and returns the
    /// number of tiles written. Tiles without painted pixels are skipped.
    pub fn write_tiles(&self, output: &OutputConfig) -> Result<usize> {
        ensure!(
            output.min_zoom <= output.max_zoom && output.max_zoom <= MAX_TILE_ZOOM,
            "Invalid zoom range {}..={} (zoom levels go from 0 to {})",
            output.min_zoom,
            output.max_zoom,
            MAX_TILE_ZOOM
        );

        info!(
            min_zoom = output.min_zoom,
            max_zoom = output.max_zoom,
            overlays = self.overlays.len(),
            "Generating tiles"
        );

        let Some(extent) = self.extent() else {
            warn!("No zones to render");
            return Ok(0);
        };

        let entries: Vec<OverlayIndex> = self
            .overlays
            .iter()
            .enumerate()
            .filter(|(_, o)| matches!(o.shape, ZoneShape::Area(_)))
            .filter_map(|(index, o)| {
                let rect = o.shape.bounds()?;
                Some(OverlayIndex {
                    index,
                    aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                })
            })
            .collect();
        let tree = RTree::bulk_load(entries);

        let written = (output.min_zoom..=output.max_zoom)
            .into_par_iter()
            .map(|z| self.render_zoom_level(&output.tile_dir, z, &extent, &tree))
            .collect::<Result<Vec<usize>>>()?;

        Ok(written.iter().sum())
    }

    fn render_zoom_level(
        &self,
        tile_dir: &Path,
        zoom: u8,
        extent: &Rect<f64>,
        tree: &RTree<OverlayIndex>,
    ) -> Result<usize> {
        let last = (1u32 << zoom) - 1;
        let (x0, y0, _, _) = lat_lon_to_tile_pixel(extent.max().y, extent.min().x, zoom);
        let (x1, y1, _, _) = lat_lon_to_tile_pixel(extent.min().y, extent.max().x, zoom);

        // One tile of margin so marker circles near an edge are not cut off
        let tiles: Vec<(u32, u32)> = (x0.saturating_sub(1)..=(x1 + 1).min(last))
            .flat_map(|x| (y0.saturating_sub(1)..=(y1 + 1).min(last)).map(move |y| (x, y)))
            .collect();

        let z_dir = tile_dir.join(zoom.to_string());
        let written: usize = tiles
            .par_iter()
            .map(|&(x, y)| -> Result<usize> {
                let Some(img) = self.render_tile(zoom, x, y, tree) else {
                    return Ok(0);
                };
                let x_dir = z_dir.join(x.to_string());
                fs::create_dir_all(&x_dir)
                    .with_context(|| format!("Failed to create tile directory {:?}", x_dir))?;
                let path = x_dir.join(format!("{}.png", y));
                img.save(&path)
                    .with_context(|| format!("Failed to save tile {:?}", path))?;
                Ok(1)
            })
            .collect::<Result<Vec<usize>>>()?
            .iter()
            .sum();

        debug!(zoom, tiles = tiles.len(), written, "Rendered zoom level");
        Ok(written)
    }

    fn render_tile(&self, zoom: u8, tx: u32, ty: u32, tree: &RTree<OverlayIndex>) -> Option<RgbaImage> {
        let mut img: RgbaImage = ImageBuffer::new(TILE_SIZE, TILE_SIZE);
        let mut painted = false;

        let (north, west) = tile_pixel_to_lat_lon(tx, ty, 0.0, 0.0, zoom);
        let (south, east) = tile_pixel_to_lat_lon(tx, ty, TILE_SIZE as f64, TILE_SIZE as f64, zoom);
        let envelope = AABB::from_corners([west, south], [east, north]);

        let mut candidates: Vec<usize> = tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.index)
            .collect();
        candidates.sort_by_key(|&i| self.overlays[i].z);

        if !candidates.is_empty() {
            // Topmost overlay per pixel, then fill and outline
            let side = TILE_SIZE as usize;
            let mut owner: Vec<Option<usize>> = vec![None; side * side];
            for py in 0..TILE_SIZE {
                for px in 0..TILE_SIZE {
                    let (lat, lon) = tile_pixel_to_lat_lon(tx, ty, px as f64 + 0.5, py as f64 + 0.5, zoom);
                    let point = Point::new(lon, lat);
                    owner[py as usize * side + px as usize] = candidates
                        .iter()
                        .rev()
                        .copied()
                        .find(|&i| self.overlays[i].shape.contains(&point));
                }
            }

            for py in 0..side {
                for px in 0..side {
                    let Some(i) = owner[py * side + px] else { continue };
                    let style = &self.overlays[i].style;
                    let border = [(px.wrapping_sub(1), py), (px + 1, py), (px, py.wrapping_sub(1)), (px, py + 1)]
                        .iter()
                        .filter(|(nx, ny)| *nx < side && *ny < side)
                        .any(|&(nx, ny)| owner[ny * side + nx] != Some(i));
                    let pixel = if border {
                        style.color.to_rgba(style.opacity)
                    } else {
                        style.fill_color.to_rgba(style.fill_opacity)
                    };
                    img.put_pixel(px as u32, py as u32, pixel);
                    painted = true;
                }
            }
        }

        let mut markers: Vec<&Overlay> = self
            .overlays
            .iter()
            .filter(|o| matches!(o.shape, ZoneShape::Marker(_)))
            .collect();
        markers.sort_by_key(|o| o.z);
        for marker in markers {
            painted |= paint_marker(&mut img, marker, zoom, tx, ty);
        }

        painted.then_some(img)
    }
}

/// Draws a filled circle with a stroke ring; returns whether any pixel of
/// the tile was touched.
fn paint_marker(img: &mut RgbaImage, overlay: &Overlay, zoom: u8, tx: u32, ty: u32) -> bool {
    let ZoneShape::Marker(point) = &overlay.shape else {
        return false;
    };
    let style = &overlay.style;
    let radius = style.radius.unwrap_or(0.0);
    if radius <= 0.0 {
        return false;
    }

    let (wx, wy) = lat_lon_to_world(point.y(), point.x(), zoom);
    let cx = (wx - tx as f64) * TILE_SIZE as f64;
    let cy = (wy - ty as f64) * TILE_SIZE as f64;
    let reach = radius + style.weight / 2.0;

    let min_x = (cx - reach).floor().max(0.0) as u32;
    let min_y = (cy - reach).floor().max(0.0) as u32;
    let max_x = (cx + reach).ceil().min(TILE_SIZE as f64 - 1.0);
    let max_y = (cy + reach).ceil().min(TILE_SIZE as f64 - 1.0);
    if max_x < 0.0 || max_y < 0.0 {
        return false;
    }

    let mut painted = false;
    for py in min_y..=max_y as u32 {
        for px in min_x..=max_x as u32 {
            let dx = px as f64 + 0.5 - cx;
            let dy = py as f64 + 0.5 - cy;
            let distance = (dx * dx + dy * dy).sqrt();
            let pixel = if distance <= radius - style.weight / 2.0 {
                style.fill_color.to_rgba(style.fill_opacity)
            } else if distance <= reach {
                style.color.to_rgba(style.opacity)
            } else {
                continue;
            };
            img.put_pixel(px, py, pixel);
            painted = true;
        }
    }
    painted
}

impl Surface for RasterSurface {
    fn set_view(&mut self, _center: LatLng, _zoom: u8) {}

    fn add_tile_layer(&mut self, layer: &TileLayer) {
        debug!(url = %layer.url, "Raster output does not include background tiles");
    }

    fn mount_control(&mut self, _position: ControlPosition, _html: String) -> ControlId {
        self.controls += 1;
        ControlId(self.controls - 1)
    }

    fn update_control(&mut self, _id: ControlId, _html: String) {}

    fn add_overlay(&mut self, shape: &ZoneShape, style: &PathStyle) -> LayerHandle {
        self.overlays.push(Overlay {
            shape: shape.clone(),
            style: *style,
            z: self.next_z,
        });
        self.next_z += 1;
        LayerHandle(self.overlays.len() - 1)
    }

    fn set_style(&mut self, layer: LayerHandle, style: &PathStyle) {
        if let Some(overlay) = self.overlays.get_mut(layer.0) {
            overlay.style = *style;
        }
    }

    fn bring_to_front(&mut self, layer: LayerHandle) {
        if let Some(overlay) = self.overlays.get_mut(layer.0) {
            overlay.z = self.next_z;
            self.next_z += 1;
        }
    }

    fn fit_bounds(&mut self, _bounds: Rect<f64>) {}
}

// Coordinate conversions

/// Position in tile units (`0..2^zoom` on both axes).
fn lat_lon_to_world(lat: f64, lon: f64, zoom: u8) -> (f64, f64) {
    let n = 2.0_f64.powi(zoom as i32);
    let x_t = (lon + 180.0) / 360.0 * n;
    let lat_rad = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let y_t = (1.0 - (lat_rad.tan() + (1.0 / lat_rad.cos())).ln() / PI) / 2.0 * n;
    (x_t, y_t)
}

pub fn lat_lon_to_tile_pixel(lat: f64, lon: f64, zoom: u8) -> (u32, u32, u32, u32) {
    let (x_t, y_t) = lat_lon_to_world(lat, lon, zoom);
    let last = 2.0_f64.powi(zoom as i32) - 1.0;

    let tx = x_t.floor().clamp(0.0, last) as u32;
    let ty = y_t.floor().clamp(0.0, last) as u32;

    let px = ((x_t - tx as f64) * TILE_SIZE as f64).clamp(0.0, TILE_SIZE as f64 - 1.0) as u32;
    let py = ((y_t - ty as f64) * TILE_SIZE as f64).clamp(0.0, TILE_SIZE as f64 - 1.0) as u32;

    (tx, ty, px, py)
}

pub fn tile_pixel_to_lat_lon(tx: u32, ty: u32, px: f64, py: f64, zoom: u8) -> (f64, f64) {
    let n = 2.0_f64.powi(zoom as i32);
    let x = tx as f64 + px / TILE_SIZE as f64;
    let y = ty as f64 + py / TILE_SIZE as f64;
    let lon = x / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();
    (lat, lon)
}
