use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::{MultiPolygon, Point, Rect};
use geojson::Feature;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityRecord {
    pub zone_code: String,
    pub zone: String,
    pub population: f64,
    pub surface: f64,
    pub population_density: f64,
    #[serde(default)]
    pub historic_center: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    // geo works in x = lon, y = lat
    pub fn to_point(self) -> Point<f64> {
        Point::new(self.lng, self.lat)
    }
}

// Pointer tolerance around a marker, on both axes
pub const MARKER_HIT_DEGREES: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq)]
pub enum ZoneShape {
    Area(MultiPolygon<f64>),
    Marker(Point<f64>),
}

impl ZoneShape {
    /// Converts the feature geometry, or `None` for missing or unsupported
    /// geometry kinds (lines, collections).
    pub fn from_feature(feature: &Feature) -> Option<Self> {
        let geometry = feature.geometry.as_ref()?;
        let geometry: geo::Geometry<f64> = geometry.value.clone().try_into().ok()?;

        match geometry {
            geo::Geometry::MultiPolygon(mp) => Some(ZoneShape::Area(mp)),
            geo::Geometry::Polygon(p) => Some(ZoneShape::Area(MultiPolygon::new(vec![p]))),
            geo::Geometry::Point(p) => Some(ZoneShape::Marker(p)),
            _ => None,
        }
    }

    pub fn bounds(&self) -> Option<Rect<f64>> {
        match self {
            ZoneShape::Area(mp) => mp.bounding_rect(),
            ZoneShape::Marker(p) => Some(Rect::new(p.0, p.0)),
        }
    }

    /// Markers have no area and never contain a point.
    pub fn contains(&self, point: &Point<f64>) -> bool {
        match self {
            ZoneShape::Area(mp) => mp.contains(point),
            ZoneShape::Marker(_) => false,
        }
    }

    /// Whether a pointer at `point` is over the shape: containment for areas,
    /// [`MARKER_HIT_DEGREES`] for markers.
    pub fn hit(&self, point: &Point<f64>) -> bool {
        match self {
            ZoneShape::Area(_) => self.contains(point),
            ZoneShape::Marker(p) => {
                (p.x() - point.x()).abs() <= MARKER_HIT_DEGREES
                    && (p.y() - point.y()).abs() <= MARKER_HIT_DEGREES
            }
        }
    }

    // Bounds widened by the marker hit tolerance, for spatial indexes
    pub fn hit_bounds(&self) -> Option<Rect<f64>> {
        let rect = self.bounds()?;
        match self {
            ZoneShape::Area(_) => Some(rect),
            ZoneShape::Marker(_) => Some(Rect::new(
                (rect.min().x - MARKER_HIT_DEGREES, rect.min().y - MARKER_HIT_DEGREES),
                (rect.max().x + MARKER_HIT_DEGREES, rect.max().y + MARKER_HIT_DEGREES),
            )),
        }
    }
}
