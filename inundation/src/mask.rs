//! Materialized flood-extent mask.
//!
//! The mask is a derived raster with the same grid geometry as the
//! source DEM, holding `1` where the elevation is at or below the
//! water level and `0` elsewhere. It is written to a uniquely named
//! backing file so concurrent runs never collide, memory-mapped for
//! random-access sampling, and the backing file is removed when the
//! mask is dropped.

use crate::{retry::with_retries, FloodError};
use demtile::{GridGeometry, Tile, VOID_ELEVATION};
use geo::geometry::Coord;
use log::warn;
use memmap2::Mmap;
use std::{
    fs::{self, File},
    io::{BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

const CLEANUP_ATTEMPTS: usize = 5;
const CLEANUP_DELAY: Duration = Duration::from_millis(500);

/// A binary flood mask over a DEM tile's grid.
pub struct FloodMask {
    // Declared before `store` so the mapping is dropped, and the file
    // unmapped, before removal is attempted.
    cells: Mmap,
    store: MaskStore,
    geometry: GridGeometry,
}

impl FloodMask {
    /// Builds a mask for `dem` at `water_level`, backed by a file in
    /// the system temp directory.
    pub fn build(dem: &Tile, water_level: f64) -> Result<Self, FloodError> {
        Self::build_in(&std::env::temp_dir(), dem, water_level)
    }

    /// Builds a mask for `dem` at `water_level`, backed by a file in
    /// `dir`.
    pub fn build_in(dir: &Path, dem: &Tile, water_level: f64) -> Result<Self, FloodError> {
        let store = MaskStore {
            path: unique_mask_path(dir),
        };

        write_cells(&store.path, dem, water_level).map_err(FloodError::MaskConstruction)?;

        let cells = {
            let file = File::open(&store.path).map_err(FloodError::MaskConstruction)?;
            unsafe { Mmap::map(&file) }.map_err(FloodError::MaskConstruction)?
        };
        if cells.len() != dem.len() {
            return Err(FloodError::MaskConstruction(std::io::Error::new(
                ErrorKind::InvalidData,
                "flood mask length does not match its source raster",
            )));
        }

        Ok(Self {
            cells,
            store,
            geometry: dem.geometry().clone(),
        })
    }

    /// Samples the mask at `coord` using nearest-pixel lookup.
    ///
    /// Returns `None` when `coord` lies outside the mask's extent.
    pub fn sample(&self, coord: Coord<f64>) -> Option<f64> {
        self.geometry
            .cell_index(coord)
            .and_then(|index| self.cells.get(index))
            .map(|cell| f64::from(*cell))
    }

    /// Returns the mask's backing file path.
    pub fn path(&self) -> &Path {
        &self.store.path
    }
}

/// Owns the mask's backing file; removes it on drop.
struct MaskStore {
    path: PathBuf,
}

impl Drop for MaskStore {
    fn drop(&mut self) {
        remove_mask_file(&self.path);
    }
}

/// Elementwise `elevation <= water_level` pass over the DEM, one byte
/// per cell in the DEM's sample order. Void cells are never flooded.
fn write_cells(path: &Path, dem: &Tile, water_level: f64) -> std::io::Result<()> {
    let mut wtr = BufWriter::new(File::create(path)?);
    let result = dem.samples().try_for_each(|elevation| {
        let flooded = elevation != VOID_ELEVATION && f64::from(elevation) <= water_level;
        wtr.write_all(&[u8::from(flooded)])
    });
    let result = result.and_then(|()| wtr.flush());
    if result.is_err() {
        // Don't leave a partial mask behind.
        drop(wtr);
        remove_mask_file(path);
    }
    result
}

/// Returns a mask file path that is unique across concurrent runs,
/// combining wall-clock seconds with a random component.
fn unique_mask_path(dir: &Path) -> PathBuf {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs());
    let nonce: u32 = rand::random();
    dir.join(format!("flood_mask_{timestamp}_{nonce:08x}.msk"))
}

/// Removes a mask backing file, retrying briefly in case another
/// reader still holds it. A missing file counts as success; exhausting
/// retries is logged and swallowed.
fn remove_mask_file(path: &Path) {
    let outcome = with_retries(CLEANUP_ATTEMPTS, CLEANUP_DELAY, || {
        match fs::remove_file(path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    });
    if let Err(e) = outcome {
        warn!("could not remove flood mask {}: {e}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::{unique_mask_path, FloodMask};
    use demtile::{Tile, VOID_ELEVATION};
    use geo::geometry::Coord;
    use std::{fs, path::PathBuf};

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("inundation_{}_{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// 3x3 grid of elevations 0..=80 by tens, 0.01 degree cells, SW
    /// sample center at (100, 20).
    fn dem() -> Tile {
        #[rustfmt::skip]
        let samples = vec![
            60, 70, 80,
            30, 40, 50,
             0, 10, 20,
        ];
        Tile::from_samples(Coord { x: 100.0, y: 20.0 }, 36, (3, 3), samples).unwrap()
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let dir = test_dir("threshold_is_inclusive");
        let mask = FloodMask::build_in(&dir, &dem(), 40.0).unwrap();
        // Elevation 40 sits at (100.01, 20.01) and equals the level.
        assert_eq!(mask.sample(Coord { x: 100.01, y: 20.01 }), Some(1.0));
        // Elevation 50 is just above the level.
        assert_eq!(mask.sample(Coord { x: 100.02, y: 20.01 }), Some(0.0));
        drop(mask);
        let _ = fs::remove_dir(&dir);
    }

    #[test]
    fn test_void_cells_are_dry() {
        let dir = test_dir("void_cells_are_dry");
        let samples = vec![VOID_ELEVATION; 4];
        let tile = Tile::from_samples(Coord { x: 0.0, y: 0.0 }, 36, (2, 2), samples).unwrap();
        let mask = FloodMask::build_in(&dir, &tile, 1000.0).unwrap();
        assert_eq!(mask.sample(Coord { x: 0.0, y: 0.0 }), Some(0.0));
        drop(mask);
        let _ = fs::remove_dir(&dir);
    }

    #[test]
    fn test_sample_outside_extent_returns_none() {
        let dir = test_dir("sample_outside_extent");
        let mask = FloodMask::build_in(&dir, &dem(), 40.0).unwrap();
        assert_eq!(mask.sample(Coord { x: 120.0, y: 20.0 }), None);
        assert_eq!(mask.sample(Coord { x: 100.01, y: -20.0 }), None);
        drop(mask);
        let _ = fs::remove_dir(&dir);
    }

    #[test]
    fn test_backing_file_removed_on_drop() {
        let dir = test_dir("backing_file_removed");
        let mask = FloodMask::build_in(&dir, &dem(), 40.0).unwrap();
        let path = mask.path().to_owned();
        assert!(path.exists());
        drop(mask);
        assert!(!path.exists());
        let _ = fs::remove_dir(&dir);
    }

    #[test]
    fn test_removal_is_idempotent() {
        let dir = test_dir("removal_is_idempotent");
        let mask = FloodMask::build_in(&dir, &dem(), 40.0).unwrap();
        // Delete out from under the mask; dropping must not retry for
        // long or panic.
        fs::remove_file(mask.path()).unwrap();
        drop(mask);
        let _ = fs::remove_dir(&dir);
    }

    #[test]
    fn test_unique_paths_within_one_tick() {
        let dir = std::env::temp_dir();
        let a = unique_mask_path(&dir);
        let b = unique_mask_path(&dir);
        assert_ne!(a, b);
    }
}
