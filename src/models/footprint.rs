//! Building footprints and geocoded targets.

use geo::{BoundingRect, Centroid, Coord, LineString, Point, Polygon};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a building footprint as it appears in the source dataset
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FootprintId(pub String);

impl FootprintId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FootprintId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FootprintId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for FootprintId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FootprintError {
    #[error("footprint {id}: ring needs at least 3 distinct vertices, got {got}")]
    TooFewVertices { id: String, got: usize },
    #[error("footprint {id}: vertex ({x}, {y}) is not finite")]
    NonFiniteVertex { id: String, x: f64, y: f64 },
    #[error("footprint {id}: polygon has no centroid")]
    NoCentroid { id: String },
}

/// A building boundary with its derived centroid.
///
/// Coordinates are (longitude, latitude). The exterior ring is always closed.
#[derive(Debug, Clone)]
pub struct Footprint {
    pub id: FootprintId,
    pub polygon: Polygon<f64>,
    pub centroid: Point<f64>,
    /// Extra columns from the source row, in column order
    pub attributes: Vec<(String, String)>,
}

impl Footprint {
    /// Build a footprint from a boundary ring, closing it if needed
    pub fn new(id: impl Into<FootprintId>, ring: Vec<Coord<f64>>) -> Result<Self, FootprintError> {
        let id = id.into();

        if let Some(bad) = ring.iter().find(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err(FootprintError::NonFiniteVertex {
                id: id.0,
                x: bad.x,
                y: bad.y,
            });
        }

        let mut ring = ring;
        if ring.len() >= 3 && ring.first() != ring.last() {
            ring.push(ring[0]);
        }

        // Closed ring: 3 distinct vertices plus the closing one
        if ring.len() < 4 {
            return Err(FootprintError::TooFewVertices {
                id: id.0,
                got: ring.len(),
            });
        }

        Self::from_polygon(id, Polygon::new(LineString::new(ring), vec![]))
    }

    /// Build a footprint from an existing polygon
    pub fn from_polygon(
        id: impl Into<FootprintId>,
        polygon: Polygon<f64>,
    ) -> Result<Self, FootprintError> {
        let id = id.into();
        let centroid = polygon
            .centroid()
            .ok_or_else(|| FootprintError::NoCentroid { id: id.0.clone() })?;

        Ok(Self {
            id,
            polygon,
            centroid,
            attributes: Vec::new(),
        })
    }

    pub fn with_attributes(mut self, attributes: Vec<(String, String)>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Bounding box as (min_lon, min_lat, max_lon, max_lat)
    pub fn bbox(&self) -> Option<(f64, f64, f64, f64)> {
        self.polygon
            .bounding_rect()
            .map(|rect| (rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }
}

/// What the geocoder produced for an address
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Point(Point<f64>),
    Polygon {
        polygon: Polygon<f64>,
        centroid: Point<f64>,
    },
}

impl Target {
    pub fn point(lon: f64, lat: f64) -> Self {
        Target::Point(Point::new(lon, lat))
    }

    /// Polygon target with a centroid derived from its geometry
    pub fn polygon(polygon: Polygon<f64>) -> Option<Self> {
        let centroid = polygon.centroid()?;
        Some(Target::Polygon { polygon, centroid })
    }

    /// Polygon target whose centroid was supplied by the geocoder
    pub fn polygon_with_centroid(polygon: Polygon<f64>, centroid: Point<f64>) -> Self {
        Target::Polygon { polygon, centroid }
    }

    pub fn centroid(&self) -> Point<f64> {
        match self {
            Target::Point(p) => *p,
            Target::Polygon { centroid, .. } => *centroid,
        }
    }

    pub fn is_point(&self) -> bool {
        matches!(self, Target::Point(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Coord<f64>> {
        vec![
            Coord { x: x0, y: y0 },
            Coord { x: x0 + size, y: y0 },
            Coord {
                x: x0 + size,
                y: y0 + size,
            },
            Coord { x: x0, y: y0 + size },
        ]
    }

    #[test]
    fn test_open_ring_is_closed() {
        let fp = Footprint::new("a", square(0.0, 0.0, 1.0)).unwrap();
        let ring = fp.polygon.exterior();
        assert_eq!(ring.0.len(), 5);
        assert_eq!(ring.0.first(), ring.0.last());
    }

    #[test]
    fn test_centroid_of_unit_square() {
        let fp = Footprint::new("a", square(0.0, 0.0, 1.0)).unwrap();
        assert!((fp.centroid.x() - 0.5).abs() < 1e-12);
        assert!((fp.centroid.y() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_too_few_vertices() {
        let ring = vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 0.0 }];
        let err = Footprint::new("x", ring).unwrap_err();
        assert_eq!(
            err,
            FootprintError::TooFewVertices {
                id: "x".to_string(),
                got: 2
            }
        );
    }

    #[test]
    fn test_non_finite_vertex() {
        let mut ring = square(0.0, 0.0, 1.0);
        ring[1].x = f64::NAN;
        assert!(matches!(
            Footprint::new("x", ring),
            Err(FootprintError::NonFiniteVertex { .. })
        ));
    }

    #[test]
    fn test_polygon_target_centroid() {
        let poly = Polygon::new(LineString::from(square(2.0, 2.0, 2.0)), vec![]);
        let target = Target::polygon(poly).unwrap();
        assert!(!target.is_point());
        assert!((target.centroid().x() - 3.0).abs() < 1e-12);
        assert!((target.centroid().y() - 3.0).abs() < 1e-12);
    }
}
