//! SRTM elevation (`.hgt`) tile loading and coordinate lookup.
//!
//! A [`Tile`] is a regular grid of elevation samples with a known
//! geographic placement. Tiles can be read from `.hgt` files (fully
//! parsed or memory-mapped) or built from samples already in memory.
//!
//! # References
//!
//! 1. [HGT file layout](http://fileformats.archiveteam.org/index.php?title=HGT&oldid=17250)
//! 1. [SRTM Collection User Guide](https://lpdaac.usgs.gov/documents/179/SRTM_User_Guide_V3.pdf)

mod error;

pub use crate::error::DemError;
use byteorder::{BigEndian as BE, ReadBytesExt};
use geo::geometry::Coord;
use memmap2::Mmap;
use std::{fs::File, io::BufReader, mem::size_of, path::Path};

const ARCSEC_PER_DEG: f64 = 3600.0;

/// Elevation value marking an SRTM void (no measurement).
pub const VOID_ELEVATION: i16 = -32768;

/// Placement of a sample grid on the globe.
///
/// Corner coordinates refer to the _centers_ of the corner samples,
/// not their outer edges.
#[derive(Debug, Clone, PartialEq)]
pub struct GridGeometry {
    sw_corner_center: Coord<f64>,
    /// Arcseconds per sample.
    resolution: u8,
    /// (columns, rows)
    dimensions: (usize, usize),
}

impl GridGeometry {
    pub fn new(sw_corner_center: Coord<f64>, resolution: u8, dimensions: (usize, usize)) -> Self {
        Self {
            sw_corner_center,
            resolution,
            dimensions,
        }
    }

    /// Returns the number of samples covered by this geometry.
    pub fn len(&self) -> usize {
        let (cols, rows) = self.dimensions;
        cols * rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns (columns, rows).
    pub fn dimensions(&self) -> (usize, usize) {
        self.dimensions
    }

    /// Returns this grid's resolution in arcseconds per sample.
    pub fn resolution(&self) -> u8 {
        self.resolution
    }

    /// Returns the width of one cell in degrees.
    pub fn cell_width(&self) -> f64 {
        f64::from(self.resolution) / ARCSEC_PER_DEG
    }

    /// Returns the center of the southwest-most sample.
    pub fn sw_corner_center(&self) -> Coord<f64> {
        self.sw_corner_center
    }

    /// Returns the center of the northeast-most sample.
    pub fn ne_corner_center(&self) -> Coord<f64> {
        let (cols, rows) = self.dimensions;
        let cw = self.cell_width();
        #[allow(clippy::cast_precision_loss)]
        let ne_corner_center = Coord {
            x: self.sw_corner_center.x + (cols - 1) as f64 * cw,
            y: self.sw_corner_center.y + (rows - 1) as f64 * cw,
        };
        ne_corner_center
    }

    /// Returns the linear sample index for `coord` using
    /// nearest-pixel lookup, or `None` when `coord` lies outside the
    /// grid's extent.
    ///
    /// Linear indices follow `.hgt` file order: the northernmost row
    /// first, west to east within each row.
    pub fn cell_index(&self, coord: Coord<f64>) -> Option<usize> {
        let (cols, rows) = self.dimensions;
        let cw = self.cell_width();
        #[allow(clippy::cast_possible_truncation)]
        let col = ((coord.x - self.sw_corner_center.x) / cw + 0.5).floor() as isize;
        #[allow(clippy::cast_possible_truncation)]
        let row = ((coord.y - self.sw_corner_center.y) / cw + 0.5).floor() as isize;
        #[allow(clippy::cast_possible_wrap)]
        let in_bounds = 0 <= col && col < cols as isize && 0 <= row && row < rows as isize;
        if in_bounds {
            #[allow(clippy::cast_sign_loss)]
            let index = (rows - 1 - row as usize) * cols + col as usize;
            Some(index)
        } else {
            None
        }
    }

    /// Returns the center coordinate of the sample at linear `index`.
    pub fn cell_center(&self, index: usize) -> Coord<f64> {
        let (cols, rows) = self.dimensions;
        let cw = self.cell_width();
        let col = index % cols;
        let row = rows - 1 - index / cols;
        #[allow(clippy::cast_precision_loss)]
        let center = Coord {
            x: self.sw_corner_center.x + col as f64 * cw,
            y: self.sw_corner_center.y + row as f64 * cw,
        };
        center
    }
}

enum SampleStore {
    InMem(Box<[i16]>),
    MemMap(Mmap),
}

impl SampleStore {
    fn get(&self, index: usize) -> i16 {
        match self {
            Self::InMem(samples) => samples[index],
            Self::MemMap(raw) => {
                let start = index * size_of::<i16>();
                i16::from_be_bytes([raw[start], raw[start + 1]])
            }
        }
    }
}

/// A grid of elevation samples with a known geographic placement.
pub struct Tile {
    geometry: GridGeometry,
    samples: SampleStore,
}

impl Tile {
    /// Returns a Tile read into memory from the `.hgt` file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DemError> {
        let (resolution, dimensions @ (cols, rows)) = extract_resolution(&path)?;
        let sw_corner_center = {
            let Coord { x, y } = parse_sw_corner(&path)?;
            Coord {
                x: f64::from(x),
                y: f64::from(y),
            }
        };
        let geometry = GridGeometry::new(sw_corner_center, resolution, dimensions);

        let mut file = BufReader::new(File::open(path)?);
        let mut samples = Vec::with_capacity(cols * rows);
        for _ in 0..(cols * rows) {
            samples.push(file.read_i16::<BE>()?);
        }

        Ok(Self {
            geometry,
            samples: SampleStore::InMem(samples.into_boxed_slice()),
        })
    }

    /// Returns a Tile using the memory-mapped `.hgt` file as storage.
    pub fn memmap<P: AsRef<Path>>(path: P) -> Result<Self, DemError> {
        let (resolution, dimensions) = extract_resolution(&path)?;
        let sw_corner_center = {
            let Coord { x, y } = parse_sw_corner(&path)?;
            Coord {
                x: f64::from(x),
                y: f64::from(y),
            }
        };
        let geometry = GridGeometry::new(sw_corner_center, resolution, dimensions);

        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        Ok(Self {
            geometry,
            samples: SampleStore::MemMap(mmap),
        })
    }

    /// Returns a Tile over samples already in memory.
    ///
    /// `samples` are expected in `.hgt` file order (northernmost row
    /// first, west to east) and must match `dimensions`.
    pub fn from_samples(
        sw_corner_center: Coord<f64>,
        resolution: u8,
        dimensions: (usize, usize),
        samples: Vec<i16>,
    ) -> Result<Self, DemError> {
        let geometry = GridGeometry::new(sw_corner_center, resolution, dimensions);
        if geometry.is_empty() || samples.len() != geometry.len() {
            return Err(DemError::Dimensions {
                expected: geometry.len(),
                actual: samples.len(),
            });
        }
        Ok(Self {
            geometry,
            samples: SampleStore::InMem(samples.into_boxed_slice()),
        })
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Returns the number of samples in this tile.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.geometry.len()
    }

    /// Returns the sample at the given geo coordinates, or `None`
    /// when the coordinates fall outside this tile.
    pub fn get(&self, coord: Coord<f64>) -> Option<i16> {
        self.geometry
            .cell_index(coord)
            .map(|index| self.samples.get(index))
    }

    /// Returns an iterator over this tile's samples in file order.
    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        (0..self.len()).map(|index| self.samples.get(index))
    }
}

fn extract_resolution<P: AsRef<Path>>(path: P) -> Result<(u8, (usize, usize)), DemError> {
    const LEN_1_ARCSECOND: u64 = 3601 * 3601 * size_of::<i16>() as u64;
    const LEN_3_ARCSECOND: u64 = 1201 * 1201 * size_of::<i16>() as u64;
    match path.as_ref().metadata().map(|m| m.len())? {
        LEN_1_ARCSECOND => Ok((1, (3601, 3601))),
        LEN_3_ARCSECOND => Ok((3, (1201, 1201))),
        invalid_len => Err(DemError::HgtLen(invalid_len, path.as_ref().to_owned())),
    }
}

fn parse_sw_corner<P: AsRef<Path>>(path: P) -> Result<Coord<i16>, DemError> {
    let mk_err = || DemError::HgtName(path.as_ref().to_owned());
    let name = path
        .as_ref()
        .file_stem()
        .and_then(std::ffi::OsStr::to_str)
        .ok_or_else(mk_err)?;
    if name.len() != 7 {
        return Err(mk_err());
    }
    let lat_sign = match &name[0..1] {
        "N" => 1,
        "S" => -1,
        _ => return Err(mk_err()),
    };
    let lat = lat_sign * name[1..3].parse::<i16>().map_err(|_| mk_err())?;
    let lon_sign = match &name[3..4] {
        "E" => 1,
        "W" => -1,
        _ => return Err(mk_err()),
    };
    let lon = lon_sign * name[4..7].parse::<i16>().map_err(|_| mk_err())?;
    Ok(Coord { x: lon, y: lat })
}


#[cfg(test)]
mod hgt_tests {
    use super::{extract_resolution, parse_sw_corner, Coord, Tile};
    use byteorder::{BigEndian as BE, WriteBytesExt};
    use std::{fs, io::BufWriter, path::PathBuf};

    /// Writes a synthetic 3-arcsecond tile and returns its path.
    fn synthetic_hgt(test_name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("demtile_{}_{}", test_name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("N44W072.hgt");
        let file = fs::File::create(&path).unwrap();
        let mut wtr = BufWriter::new(file);
        for index in 0..(1201_u32 * 1201) {
            wtr.write_i16::<BE>((index % 1000) as i16).unwrap();
        }
        path
    }

    fn cleanup(path: &PathBuf) {
        let _ = fs::remove_file(path);
        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir(dir);
        }
    }

    #[test]
    fn test_parse_hgt_name() {
        let path = PathBuf::from("N44W072.hgt");
        let sw_corner = parse_sw_corner(&path).unwrap();
        assert_eq!(sw_corner, Coord { x: -72, y: 44 });

        let path = PathBuf::from("S01E120.hgt");
        let sw_corner = parse_sw_corner(&path).unwrap();
        assert_eq!(sw_corner, Coord { x: 120, y: -1 });

        assert!(parse_sw_corner(PathBuf::from("X44W072.hgt")).is_err());
        assert!(parse_sw_corner(PathBuf::from("N4W072.hgt")).is_err());
    }

    #[test]
    fn test_extract_resolution() {
        let path = synthetic_hgt("extract_resolution");
        assert_eq!(extract_resolution(&path).unwrap(), (3, (1201, 1201)));
        cleanup(&path);
    }

    #[test]
    fn test_load_and_memmap_agree() {
        let path = synthetic_hgt("load_and_memmap_agree");
        let loaded = Tile::load(&path).unwrap();
        let mapped = Tile::memmap(&path).unwrap();
        assert_eq!(loaded.len(), 1201 * 1201);
        for index in [0_usize, 1, 999, 1201, 720_599, 1_442_400] {
            let coord = loaded.geometry().cell_center(index);
            assert_eq!(loaded.get(coord), Some((index % 1000) as i16));
            assert_eq!(mapped.get(coord), Some((index % 1000) as i16));
        }
        cleanup(&path);
    }

    #[test]
    fn test_out_of_bounds_get_returns_none() {
        let path = synthetic_hgt("out_of_bounds");
        let tile = Tile::memmap(&path).unwrap();
        assert_eq!(tile.get(Coord { x: -71.5, y: 45.1 }), None);
        assert_eq!(tile.get(Coord { x: -70.9, y: 44.5 }), None);
        assert_eq!(tile.get(Coord { x: -71.5, y: 43.9 }), None);
        assert_eq!(tile.get(Coord { x: -72.1, y: 44.5 }), None);
        cleanup(&path);
    }
}
