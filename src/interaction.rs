use crate::info::{InfoFields, InfoPanel};
use crate::style::PathStyle;
use crate::surface::{ControlId, LayerHandle, Surface};
use geo::Rect;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerKind {
    Enter,
    Leave,
    Click,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    pub layer: LayerHandle,
    pub kind: PointerKind,
}

impl PointerEvent {
    pub fn enter(layer: LayerHandle) -> Self {
        Self { layer, kind: PointerKind::Enter }
    }

    pub fn leave(layer: LayerHandle) -> Self {
        Self { layer, kind: PointerKind::Leave }
    }

    pub fn click(layer: LayerHandle) -> Self {
        Self { layer, kind: PointerKind::Click }
    }
}

pub struct MapContext<'a> {
    pub surface: &'a mut dyn Surface,
    pub info: &'a mut InfoPanel,
    pub info_control: Option<ControlId>,
    /// The single active zone, if any.
    pub hovered: &'a mut Option<LayerHandle>,
}

impl MapContext<'_> {
    /// Emphasizes `layer`, raises it when the surface allows, and shows its
    /// attributes in the info panel.
    pub fn highlight(&mut self, layer: LayerHandle, style: &PathStyle, fields: &InfoFields) {
        self.info.show(fields.clone());
        self.refresh_info();

        self.surface.set_style(layer, style);
        if self.surface.capabilities().bring_to_front {
            self.surface.bring_to_front(layer);
        }
        *self.hovered = Some(layer);
    }

    pub fn reset(&mut self, layer: LayerHandle, style: &PathStyle) {
        self.info.clear();
        self.refresh_info();

        self.surface.set_style(layer, style);
        if *self.hovered == Some(layer) {
            *self.hovered = None;
        }
    }

    pub fn fit_bounds(&mut self, bounds: Rect<f64>) {
        self.surface.fit_bounds(bounds);
    }

    fn refresh_info(&mut self) {
        if let Some(id) = self.info_control {
            self.surface.update_control(id, self.info.render_html());
        }
    }
}

pub type Handler = Box<dyn FnMut(&mut MapContext<'_>)>;

pub fn handler<F>(f: F) -> Handler
where
    F: FnMut(&mut MapContext<'_>) + 'static,
{
    Box::new(f)
}

pub trait Interactions {
    fn on_hover(&mut self, layer: LayerHandle, handler: Handler);
    fn on_leave(&mut self, layer: LayerHandle, handler: Handler);
    fn on_activate(&mut self, layer: LayerHandle, handler: Handler);
}

#[derive(Default)]
pub struct EventRegistry {
    handlers: HashMap<(LayerHandle, PointerKind), Handler>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_bound(&self, layer: LayerHandle) -> bool {
        self.handlers.keys().any(|(l, _)| *l == layer)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs the handler bound to the event, returning whether one existed.
    pub fn dispatch(&mut self, event: PointerEvent, ctx: &mut MapContext<'_>) -> bool {
        match self.handlers.get_mut(&(event.layer, event.kind)) {
            Some(handler) => {
                handler(ctx);
                true
            }
            None => {
                debug!(?event, "no handler bound");
                false
            }
        }
    }
}

impl Interactions for EventRegistry {
    fn on_hover(&mut self, layer: LayerHandle, handler: Handler) {
        self.handlers.insert((layer, PointerKind::Enter), handler);
    }

    fn on_leave(&mut self, layer: LayerHandle, handler: Handler) {
        self.handlers.insert((layer, PointerKind::Leave), handler);
    }

    fn on_activate(&mut self, layer: LayerHandle, handler: Handler) {
        self.handlers.insert((layer, PointerKind::Click), handler);
    }
}
