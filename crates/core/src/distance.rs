//! Pairwise distance functions for weights construction.
//!
//! Distance-based weights support planar Euclidean distance and great-circle
//! arc distance on lon/lat coordinates (mile or kilometer units, matching the
//! GeoDa conventions).

use geo_types::Point;

/// Earth radius in miles.
const EARTH_RADIUS_MI: f64 = 3959.0;
/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// How to measure the distance between two observation locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoDistance {
    /// Planar Euclidean distance in coordinate units.
    Euclidean,
    /// Great-circle distance over lon/lat coordinates.
    Arc { miles: bool },
}

impl GeoDistance {
    /// Resolve the `(is_arc, is_mile)` flag pair taken by the distance-weight
/// constructors.
    pub fn from_flags(is_arc: bool, is_mile: bool) -> Self {
        if is_arc {
            GeoDistance::Arc { miles: is_mile }
        } else {
            GeoDistance::Euclidean
        }
    }

    /// Distance between two points under this metric.
    pub fn distance(&self, a: Point<f64>, b: Point<f64>) -> f64 {
        match *self {
            GeoDistance::Euclidean => {
                let dx = a.x() - b.x();
                let dy = a.y() - b.y();
                (dx * dx + dy * dy).sqrt()
            }
            GeoDistance::Arc { miles } => {
                let r = if miles { EARTH_RADIUS_MI } else { EARTH_RADIUS_KM };
                haversine(a, b) * r
            }
        }
    }

    /// Whether this metric operates on planar coordinates (and can therefore
    /// be served by the k-d tree index).
    pub fn is_planar(&self) -> bool {
        matches!(self, GeoDistance::Euclidean)
    }
}

/// Central angle between two lon/lat points (radians), haversine formula.
fn haversine(a: Point<f64>, b: Point<f64>) -> f64 {
    let (lon1, lat1) = (a.x().to_radians(), a.y().to_radians());
    let (lon2, lat2) = (b.x().to_radians(), b.y().to_radians());

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * h.sqrt().min(1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean() {
        let d = GeoDistance::Euclidean.distance(Point::new(0.0, 0.0), Point::new(3.0, 4.0));
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_arc_quarter_meridian() {
        // Equator to pole along a meridian is a quarter circumference.
        let d = GeoDistance::Arc { miles: false }
            .distance(Point::new(0.0, 0.0), Point::new(0.0, 90.0));
        let expected = std::f64::consts::PI * 6371.0 / 2.0;
        assert!((d - expected).abs() < 1e-6, "got {d}, expected {expected}");
    }

    #[test]
    fn test_arc_units() {
        let a = Point::new(-87.0, 41.0);
        let b = Point::new(-122.0, 37.0);
        let mi = GeoDistance::Arc { miles: true }.distance(a, b);
        let km = GeoDistance::Arc { miles: false }.distance(a, b);
        assert!((km / mi - 6371.0 / 3959.0).abs() < 1e-9);
    }

    #[test]
    fn test_from_flags() {
        assert_eq!(GeoDistance::from_flags(false, true), GeoDistance::Euclidean);
        assert_eq!(
            GeoDistance::from_flags(true, false),
            GeoDistance::Arc { miles: false }
        );
    }
}
