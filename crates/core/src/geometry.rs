//! Geometry collections consumed by the weights constructors.
//!
//! The surrounding table/geometry provider (shapefile readers, geo-dataframe
//! bindings, ...) hands the core either a set of points or a set of
//! (multi)polygons. Everything downstream works on observation indices
//! `0..n-1`; this module only answers geometric questions about feature `i`.

use geo::{Area, Centroid, Euclidean, Length};
use geo_types::{MultiPolygon, Point, Polygon};

use crate::{Error, Result};

/// A homogeneous collection of observation geometries.
///
/// Polygon features may have multiple parts (islands), so polygons are stored
/// as [`MultiPolygon`]s. Mixed collections are not supported.
#[derive(Debug, Clone)]
pub enum GeometrySet {
    /// Point observations (x, y coordinates).
    Points(Vec<Point<f64>>),
    /// Polygon observations, possibly multi-part.
    Polygons(Vec<MultiPolygon<f64>>),
}

impl GeometrySet {
    /// Build a point collection from raw coordinates.
    pub fn from_coords(coords: &[(f64, f64)]) -> Self {
        GeometrySet::Points(coords.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    /// Build a polygon collection from single-part polygons.
    pub fn from_polygons(polys: Vec<Polygon<f64>>) -> Self {
        GeometrySet::Polygons(polys.into_iter().map(MultiPolygon::from).collect())
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        match self {
            GeometrySet::Points(p) => p.len(),
            GeometrySet::Polygons(p) => p.len(),
        }
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the collection holds polygons.
    pub fn is_polygonal(&self) -> bool {
        matches!(self, GeometrySet::Polygons(_))
    }

    /// Fail unless the collection is non-empty.
    pub fn ensure_non_empty(&self) -> Result<()> {
        if self.is_empty() {
            Err(Error::EmptyInput("geometry collection"))
        } else {
            Ok(())
        }
    }

    /// Representative point of observation `i`: the point itself, or the
    /// polygon centroid (first exterior vertex for degenerate polygons).
    pub fn centroid(&self, i: usize) -> Point<f64> {
        match self {
            GeometrySet::Points(pts) => pts[i],
            GeometrySet::Polygons(polys) => polys[i].centroid().unwrap_or_else(|| {
                let c = polys[i]
                    .0
                    .first()
                    .and_then(|p| p.exterior().0.first())
                    .copied()
                    .unwrap_or_default();
                Point::new(c.x, c.y)
            }),
        }
    }

    /// Representative points of all observations.
    pub fn centroids(&self) -> Vec<Point<f64>> {
        (0..self.len()).map(|i| self.centroid(i)).collect()
    }

    /// Unsigned area of observation `i` (0 for points).
    pub fn area(&self, i: usize) -> f64 {
        match self {
            GeometrySet::Points(_) => 0.0,
            GeometrySet::Polygons(polys) => polys[i].unsigned_area(),
        }
    }

    /// Perimeter of observation `i`: total length of exterior and interior
    /// rings (0 for points).
    pub fn perimeter(&self, i: usize) -> f64 {
        match self {
            GeometrySet::Points(_) => 0.0,
            GeometrySet::Polygons(polys) => polys[i]
                .0
                .iter()
                .map(|p| {
                    let ext = p.exterior().length::<Euclidean>();
                    let int: f64 = p.interiors().iter().map(|r| r.length::<Euclidean>()).sum();
                    ext + int
                })
                .sum(),
        }
    }

    /// The multipolygon of observation `i`, if the collection is polygonal.
    pub fn polygon(&self, i: usize) -> Option<&MultiPolygon<f64>> {
        match self {
            GeometrySet::Points(_) => None,
            GeometrySet::Polygons(polys) => polys.get(i),
        }
    }
}

/// Build a square lattice of unit-cell polygons, row-major.
///
/// Handy for tests and examples: a `rows x cols` grid where cell `(r, c)` has
/// index `r * cols + c`, so queen/rook adjacency is known in advance.
pub fn unit_lattice(rows: usize, cols: usize) -> GeometrySet {
    use geo_types::LineString;

    let mut polys = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            let (x, y) = (c as f64, r as f64);
            polys.push(Polygon::new(
                LineString::from(vec![
                    (x, y),
                    (x + 1.0, y),
                    (x + 1.0, y + 1.0),
                    (x, y + 1.0),
                    (x, y),
                ]),
                vec![],
            ));
        }
    }
    GeometrySet::from_polygons(polys)
}
