//! CSV export of flooded features.

use crate::{classify::Flooded, FloodError};
use serde::Serialize;
use std::path::Path;

const HEADER: [&str; 5] = ["Type", "Name", "Feature_ID", "X_Coordinate", "Y_Coordinate"];

#[derive(Serialize)]
struct Row<'a> {
    kind: &'a str,
    name: &'a str,
    id: i64,
    x: f64,
    y: f64,
}

impl<'a> From<&'a Flooded> for Row<'a> {
    fn from(flooded: &'a Flooded) -> Self {
        Self {
            kind: flooded.kind.as_str(),
            name: &flooded.name,
            id: flooded.id,
            x: flooded.x,
            y: flooded.y,
        }
    }
}

/// Writes the report to `path`, truncating any existing content.
///
/// The header row is always written. Point rows come first, then
/// polygon rows, each in the order the classifier produced them.
pub fn write_csv(
    path: &Path,
    flooded_points: &[Flooded],
    flooded_polygons: &[Flooded],
) -> Result<(), FloodError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(FloodError::Report)?;
    wtr.write_record(HEADER).map_err(FloodError::Report)?;
    for flooded in flooded_points.iter().chain(flooded_polygons) {
        wtr.serialize(Row::from(flooded)).map_err(FloodError::Report)?;
    }
    wtr.flush()?;
    Ok(())
}
