//! Flood classification of village features against a DEM.

use crate::{
    cancel::Cancel,
    features::{PointFeature, PolygonFeature},
    mask::FloodMask,
    FloodError,
};
use demtile::Tile;
use geo::geometry::Coord;
use log::debug;
use std::path::{Path, PathBuf};

/// A sampled mask value above this counts as flooded. Comparing
/// against the midpoint rather than exactly `1` tolerates resampling
/// artifacts from the underlying sampler.
const FLOODED_ABOVE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Point,
    Polygon,
}

impl FeatureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::Polygon => "Polygon",
        }
    }
}

/// One flooded feature: the coordinates are the feature's own
/// location for points and the centroid for polygons.
#[derive(Debug, Clone, PartialEq)]
pub struct Flooded {
    pub kind: FeatureKind,
    pub name: String,
    pub id: i64,
    pub x: f64,
    pub y: f64,
}

/// Result of one classification run. `interrupted` marks a run that
/// stopped at a cancellation checkpoint; results classified before
/// the checkpoint remain valid.
#[derive(Debug, Default)]
pub struct Classification {
    pub flooded_points: Vec<Flooded>,
    pub flooded_polygons: Vec<Flooded>,
    pub interrupted: bool,
}

/// Flood classification job.
///
/// ```no_run
/// # fn main() -> Result<(), inundation::FloodError> {
/// # let dem = demtile::Tile::load("N44W072.hgt")?;
/// # let points = vec![];
/// use inundation::{Classify, NeverCancel};
///
/// let classification = Classify::new(&dem, 50.0)
///     .points(&points)
///     .run(&NeverCancel)?;
/// # Ok(())
/// # }
/// ```
pub struct Classify<'a> {
    dem: &'a Tile,
    water_level: f64,
    points: Option<&'a [PointFeature]>,
    polygons: Option<&'a [PolygonFeature]>,
    mask_dir: Option<PathBuf>,
}

impl<'a> Classify<'a> {
    pub fn new(dem: &'a Tile, water_level: f64) -> Self {
        Self {
            dem,
            water_level,
            points: None,
            polygons: None,
            mask_dir: None,
        }
    }

    pub fn points(mut self, points: &'a [PointFeature]) -> Self {
        self.points = Some(points);
        self
    }

    pub fn polygons(mut self, polygons: &'a [PolygonFeature]) -> Self {
        self.polygons = Some(polygons);
        self
    }

    /// Directory for the mask's temporary backing file. Defaults to
    /// the system temp directory.
    pub fn mask_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.mask_dir = Some(dir.as_ref().to_owned());
        self
    }

    /// Runs the classification, polling `cancel` before each feature.
    ///
    /// Points are classified before polygons, each collection in its
    /// native order. The flood mask's backing file is removed on
    /// every exit path.
    pub fn run<C: Cancel>(&self, cancel: &C) -> Result<Classification, FloodError> {
        let no_points = self.points.map_or(true, <[_]>::is_empty);
        let no_polygons = self.polygons.map_or(true, <[_]>::is_empty);
        if no_points && no_polygons {
            return Err(FloodError::NoInputFeatures);
        }

        let mask = match &self.mask_dir {
            Some(dir) => FloodMask::build_in(dir, self.dem, self.water_level)?,
            None => FloodMask::build(self.dem, self.water_level)?,
        };

        let mut classification = Classification::default();

        if let Some(points) = self.points {
            for feature in points {
                if cancel.is_cancelled() {
                    classification.interrupted = true;
                    break;
                }
                if is_flooded(&mask, feature.coord) {
                    classification.flooded_points.push(Flooded {
                        kind: FeatureKind::Point,
                        name: format!("Point_{}", feature.id),
                        id: feature.id,
                        x: feature.coord.x,
                        y: feature.coord.y,
                    });
                }
            }
        }

        if !classification.interrupted {
            if let Some(polygons) = self.polygons {
                for feature in polygons {
                    if cancel.is_cancelled() {
                        classification.interrupted = true;
                        break;
                    }
                    let Some(centroid) = feature.representative_point() else {
                        debug!("polygon {} has no centroid, skipping", feature.id);
                        continue;
                    };
                    if is_flooded(&mask, centroid.0) {
                        classification.flooded_polygons.push(Flooded {
                            kind: FeatureKind::Polygon,
                            name: format!("Polygon_{}", feature.id),
                            id: feature.id,
                            x: centroid.x(),
                            y: centroid.y(),
                        });
                    }
                }
            }
        }

        debug!(
            "classified {} flooded points, {} flooded polygons{}",
            classification.flooded_points.len(),
            classification.flooded_polygons.len(),
            if classification.interrupted {
                " (interrupted)"
            } else {
                ""
            }
        );

        Ok(classification)
        // `mask` drops here, removing its backing file.
    }
}

fn is_flooded(mask: &FloodMask, coord: Coord<f64>) -> bool {
    mask.sample(coord).map_or(false, |value| value > FLOODED_ABOVE)
}
