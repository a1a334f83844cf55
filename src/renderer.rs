use crate::color::ColorScale;
use crate::config::{DataConfig, MapConfig};
use crate::error::MapError;
use crate::info::{InfoFields, InfoPanel};
use crate::interaction::{handler, EventRegistry, Interactions, MapContext, PointerEvent, PointerKind};
use crate::legend::Legend;
use crate::loader::{DataLoader, Datasets};
use crate::matcher::ZoneMatcher;
use crate::style::StyleConfig;
use crate::surface::{ControlId, ControlPosition, LayerHandle, Surface};
use crate::types::{DensityRecord, ZoneShape};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedZone {
    pub layer: LayerHandle,
    pub zone_code: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub rendered: usize,
    /// Features whose zone code has no density record.
    pub unmatched: usize,
    /// Matched features with a geometry that cannot be drawn.
    pub unsupported: usize,
}

pub struct MapRenderer<S: Surface> {
    surface: S,
    map: MapConfig,
    styles: StyleConfig,
    scale: ColorScale,
    info: InfoPanel,
    info_control: Option<ControlId>,
    legend_control: Option<ControlId>,
    registry: EventRegistry,
    zones: Vec<RenderedZone>,
    hovered: Option<LayerHandle>,
}

impl<S: Surface> MapRenderer<S> {
    pub fn new(surface: S, map: MapConfig, styles: StyleConfig, scale: ColorScale) -> Self {
        let info = InfoPanel::new(map.title.clone());
        Self {
            surface,
            map,
            styles,
            scale,
            info,
            info_control: None,
            legend_control: None,
            registry: EventRegistry::new(),
            zones: Vec::new(),
            hovered: None,
        }
    }

    pub fn init(&mut self) {
        self.surface.set_view(self.map.center(), self.map.zoom);
        self.surface.add_tile_layer(&self.map.tiles);

        let info = self
            .surface
            .mount_control(ControlPosition::TopRight, self.info.render_html());
        self.info_control = Some(info);

        let legend = Legend::from_scale(&self.scale);
        let legend = self
            .surface
            .mount_control(ControlPosition::BottomRight, legend.render_html());
        self.legend_control = Some(legend);
    }

    /// Loads both datasets and renders the zones. On failure nothing is
    /// added, and the base map and legend stay as they are.
    pub async fn draw_zones(
        &mut self,
        loader: &DataLoader,
        data: &DataConfig,
    ) -> Result<RenderSummary, MapError> {
        let datasets = loader.load_datasets(data).await?;
        Ok(self.render_zones(&datasets))
    }

    pub fn render_zones(&mut self, datasets: &Datasets) -> RenderSummary {
        let matcher = ZoneMatcher::new(&datasets.records);
        let mut summary = RenderSummary::default();

        // One overlay per feature, each with its own handlers
        for feature in &datasets.zones {
            let Some(record) = matcher.match_feature(feature) else {
                summary.unmatched += 1;
                continue;
            };
            let Some(shape) = ZoneShape::from_feature(feature) else {
                debug!(zone_code = %record.zone_code, "Skipping zone with unsupported geometry");
                summary.unsupported += 1;
                continue;
            };
            self.bind_zone(&shape, record);
            summary.rendered += 1;
        }

        info!(
            rendered = summary.rendered,
            unmatched = summary.unmatched,
            unsupported = summary.unsupported,
            "Zone boundaries drawn"
        );
        summary
    }

    fn bind_zone(&mut self, shape: &ZoneShape, record: &DensityRecord) {
        let color = self.scale.color_for(record.population_density);
        let base = match shape {
            ZoneShape::Area(_) => self.styles.area(color),
            ZoneShape::Marker(_) => self.styles.marker(color),
        };
        let highlight = self.styles.highlight(&base);
        let fields = InfoFields::from(record);
        let bounds = shape.bounds();

        let layer = self.surface.add_overlay(shape, &base);

        let hover_fields = fields.clone();
        self.registry.on_hover(
            layer,
            handler(move |ctx| ctx.highlight(layer, &highlight, &hover_fields)),
        );
        self.registry
            .on_leave(layer, handler(move |ctx| ctx.reset(layer, &base)));
        self.registry.on_activate(
            layer,
            handler(move |ctx| {
                ctx.highlight(layer, &highlight, &fields);
                if let Some(bounds) = bounds {
                    ctx.fit_bounds(bounds);
                }
            }),
        );

        self.zones.push(RenderedZone {
            layer,
            zone_code: record.zone_code.clone(),
        });
    }

    /// Routes a pointer event to the overlay's handlers. Entering or clicking
    /// a zone first leaves the one currently active.
    pub fn dispatch(&mut self, event: PointerEvent) -> bool {
        if matches!(event.kind, PointerKind::Enter | PointerKind::Click) {
            if let Some(previous) = self.hovered.filter(|&layer| layer != event.layer) {
                self.fire(PointerEvent::leave(previous));
            }
        }
        self.fire(event)
    }

    fn fire(&mut self, event: PointerEvent) -> bool {
        let mut ctx = MapContext {
            surface: &mut self.surface,
            info: &mut self.info,
            info_control: self.info_control,
            hovered: &mut self.hovered,
        };
        self.registry.dispatch(event, &mut ctx)
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn info(&self) -> &InfoPanel {
        &self.info
    }

    pub fn info_control(&self) -> Option<ControlId> {
        self.info_control
    }

    pub fn legend_control(&self) -> Option<ControlId> {
        self.legend_control
    }

    pub fn zones(&self) -> &[RenderedZone] {
        &self.zones
    }

    pub fn hovered(&self) -> Option<LayerHandle> {
        self.hovered
    }

    pub fn into_surface(self) -> S {
        self.surface
    }
}
