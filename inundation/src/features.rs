use geo::geometry::{Coord, Point, Polygon};
use geo::Centroid;

/// Identifier assigned by a feature's source collection.
pub type FeatureId = i64;

/// A village represented by a single coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct PointFeature {
    pub id: FeatureId,
    pub coord: Coord<f64>,
}

/// A village represented by a boundary polygon.
///
/// For flood classification a polygon is reduced to its centroid.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonFeature {
    pub id: FeatureId,
    pub polygon: Polygon<f64>,
}

impl PolygonFeature {
    /// Returns the polygon's representative sample location, or
    /// `None` for a degenerate polygon with no centroid.
    pub fn representative_point(&self) -> Option<Point<f64>> {
        self.polygon.centroid()
    }
}

#[cfg(test)]
mod tests {
    use super::PolygonFeature;
    use assert_approx_eq::assert_approx_eq;
    use geo::polygon;

    #[test]
    fn test_representative_point_is_centroid() {
        let feature = PolygonFeature {
            id: 1,
            polygon: polygon![
                (x: 0.0, y: 0.0),
                (x: 2.0, y: 0.0),
                (x: 2.0, y: 2.0),
                (x: 0.0, y: 2.0),
                (x: 0.0, y: 0.0),
            ],
        };
        let centroid = feature.representative_point().unwrap();
        assert_approx_eq!(centroid.x(), 1.0);
        assert_approx_eq!(centroid.y(), 1.0);
    }

    #[test]
    fn test_degenerate_polygon_has_no_representative_point() {
        let feature = PolygonFeature {
            id: 2,
            polygon: geo::Polygon::new(geo::LineString::new(vec![]), vec![]),
        };
        assert!(feature.representative_point().is_none());
    }
}
