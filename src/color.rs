use crate::error::MapError;
use image::Rgba;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_rgba(self, opacity: f64) -> Rgba<u8> {
        let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        Rgba([self.r, self.g, self.b, alpha])
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(MapError::InvalidColor(s.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| MapError::InvalidColor(s.to_string()))
        };
        Ok(Color::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

pub const DENSITY_THRESHOLDS: [(f64, Color); 9] = [
    (0.0, Color::rgb(0xff, 0xf7, 0xec)),
    (500.0, Color::rgb(0xfe, 0xe8, 0xc8)),
    (1000.0, Color::rgb(0xfd, 0xd4, 0x9e)),
    (2500.0, Color::rgb(0xfd, 0xbb, 0x84)),
    (5000.0, Color::rgb(0xfc, 0x8d, 0x59)),
    (7500.0, Color::rgb(0xef, 0x65, 0x48)),
    (10000.0, Color::rgb(0xd7, 0x30, 0x1f)),
    (12500.0, Color::rgb(0xb3, 0x00, 0x00)),
    (15000.0, Color::rgb(0x7f, 0x00, 0x00)),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Threshold {
    pub bound: f64,
    pub color: Color,
}

/// Maps a value to the color of the smallest threshold not below it.
///
/// Values at or above the last threshold share its color, so the table
/// covers the whole real line. Bounds are strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorScale {
    thresholds: Vec<Threshold>,
}

impl ColorScale {
    pub fn new(thresholds: impl IntoIterator<Item = (f64, Color)>) -> Result<Self, MapError> {
        let thresholds: Vec<Threshold> = thresholds
            .into_iter()
            .map(|(bound, color)| Threshold { bound, color })
            .collect();

        if thresholds.is_empty() {
            return Err(MapError::InvalidScale("no thresholds".to_string()));
        }
        if let Some(t) = thresholds.iter().find(|t| !t.bound.is_finite()) {
            return Err(MapError::InvalidScale(format!("bound {} is not finite", t.bound)));
        }
        if let Some(pair) = thresholds.windows(2).find(|w| w[0].bound >= w[1].bound) {
            return Err(MapError::InvalidScale(format!(
                "bounds must increase, got {} then {}",
                pair[0].bound, pair[1].bound
            )));
        }

        Ok(Self { thresholds })
    }

    pub fn density() -> Self {
        Self {
            thresholds: DENSITY_THRESHOLDS
                .iter()
                .map(|&(bound, color)| Threshold { bound, color })
                .collect(),
        }
    }

    pub fn thresholds(&self) -> &[Threshold] {
        &self.thresholds
    }

    pub fn color_for(&self, value: f64) -> Color {
        // Non-empty by construction.
        let top = self.thresholds[self.thresholds.len() - 1];
        if value >= top.bound {
            return top.color;
        }

        self.thresholds
            .iter()
            .find(|t| value <= t.bound)
            // NaN compares false everywhere; treat it as the lowest bucket
            .unwrap_or(&self.thresholds[0])
            .color
    }
}

impl Default for ColorScale {
    fn default() -> Self {
        Self::density()
    }
}
