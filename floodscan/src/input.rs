//! GeoJSON village layers.

use anyhow::{Context, Result};
use geo::geometry::{Coord, LineString, Polygon};
use geojson::{feature::Id, Feature, FeatureCollection, GeoJson, Value};
use inundation::{FeatureId, PointFeature, PolygonFeature};
use log::warn;
use std::{fs::File, path::Path};

pub fn load_points(path: &Path) -> Result<Vec<PointFeature>> {
    let collection = read_collection(path)?;
    Ok(points_from(&collection))
}

pub fn load_polygons(path: &Path) -> Result<Vec<PolygonFeature>> {
    let collection = read_collection(path)?;
    Ok(polygons_from(&collection))
}

fn read_collection(path: &Path) -> Result<FeatureCollection> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let geojson = GeoJson::from_reader(file)
        .with_context(|| format!("parsing GeoJSON from {}", path.display()))?;
    match geojson {
        GeoJson::FeatureCollection(collection) => Ok(collection),
        _ => anyhow::bail!("{} is not a GeoJSON FeatureCollection", path.display()),
    }
}

/// Extracts point features in file order, skipping features whose
/// geometry is not a point.
fn points_from(collection: &FeatureCollection) -> Vec<PointFeature> {
    let mut points = Vec::new();
    for (index, feature) in collection.features.iter().enumerate() {
        let id = feature_id(feature, index);
        match feature.geometry.as_ref().map(|geometry| &geometry.value) {
            Some(Value::Point(position)) if position.len() >= 2 => points.push(PointFeature {
                id,
                coord: Coord {
                    x: position[0],
                    y: position[1],
                },
            }),
            _ => warn!("skipping feature {id}: not a point geometry"),
        }
    }
    points
}

/// Extracts polygon features in file order, skipping features whose
/// geometry is not a polygon.
fn polygons_from(collection: &FeatureCollection) -> Vec<PolygonFeature> {
    let mut polygons = Vec::new();
    for (index, feature) in collection.features.iter().enumerate() {
        let id = feature_id(feature, index);
        match feature.geometry.as_ref().map(|geometry| &geometry.value) {
            Some(Value::Polygon(rings)) => match polygon_from_rings(rings) {
                Some(polygon) => polygons.push(PolygonFeature { id, polygon }),
                None => warn!("skipping feature {id}: polygon has no exterior ring"),
            },
            _ => warn!("skipping feature {id}: not a polygon geometry"),
        }
    }
    polygons
}

/// The feature's numeric id when present, its file position otherwise.
fn feature_id(feature: &Feature, index: usize) -> FeatureId {
    match &feature.id {
        Some(Id::Number(n)) => n.as_i64().unwrap_or(index as i64),
        _ => index as i64,
    }
}

fn polygon_from_rings(rings: &[Vec<Vec<f64>>]) -> Option<Polygon<f64>> {
    let (exterior, interiors) = rings.split_first()?;
    Some(Polygon::new(
        ring_to_line_string(exterior),
        interiors.iter().map(|ring| ring_to_line_string(ring)).collect(),
    ))
}

fn ring_to_line_string(ring: &[Vec<f64>]) -> LineString<f64> {
    LineString::from(
        ring.iter()
            .filter(|position| position.len() >= 2)
            .map(|position| Coord {
                x: position[0],
                y: position[1],
            })
            .collect::<Vec<_>>(),
    )
}
