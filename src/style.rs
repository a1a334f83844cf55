use crate::color::Color;
use serde::{Deserialize, Serialize};

/// Style applied to one overlay on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PathStyle {
    pub color: Color,
    pub weight: f64,
    pub opacity: f64,
    pub fill_color: Color,
    pub fill_opacity: f64,
    /// Circle radius in pixels, markers only.
    pub radius: Option<f64>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct StrokeConfig {
    pub weight: f64,
    pub opacity: f64,
    pub fill_opacity: f64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct MarkerConfig {
    pub radius: f64,
    pub stroke: Color,
    pub weight: f64,
    pub opacity: f64,
    pub fill_opacity: f64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct StyleConfig {
    pub default: StrokeConfig,
    pub highlight: StrokeConfig,
    pub marker: MarkerConfig,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            default: StrokeConfig {
                weight: 2.0,
                opacity: 0.5,
                fill_opacity: 0.5,
            },
            highlight: StrokeConfig {
                weight: 3.0,
                opacity: 1.0,
                fill_opacity: 0.75,
            },
            marker: MarkerConfig {
                radius: 8.0,
                stroke: Color::BLACK,
                weight: 3.0,
                opacity: 1.0,
                fill_opacity: 0.7,
            },
        }
    }
}

impl StyleConfig {
    pub fn area(&self, color: Color) -> PathStyle {
        stroke_style(&self.default, color)
    }

    /// Emphasized version of `base`; the fill color and marker radius carry over.
    pub fn highlight(&self, base: &PathStyle) -> PathStyle {
        PathStyle {
            radius: base.radius,
            ..stroke_style(&self.highlight, base.fill_color)
        }
    }

    pub fn marker(&self, color: Color) -> PathStyle {
        PathStyle {
            color: self.marker.stroke,
            weight: self.marker.weight,
            opacity: self.marker.opacity,
            fill_color: color,
            fill_opacity: self.marker.fill_opacity,
            radius: Some(self.marker.radius),
        }
    }
}

fn stroke_style(stroke: &StrokeConfig, color: Color) -> PathStyle {
    PathStyle {
        color,
        weight: stroke.weight,
        opacity: stroke.opacity,
        fill_color: color,
        fill_opacity: stroke.fill_opacity,
        radius: None,
    }
}
